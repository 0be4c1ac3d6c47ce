use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;
use ulid::Ulid;

use crate::dates::Stay;
use crate::model::RoomState;

use super::seasonal::price_for;
use super::validator::checked_stay;
use super::EngineError;

/// Applied when a room has no service fee configured. An explicit 0 is honoured as "no fee".
pub const DEFAULT_SERVICE_FEE_PERCENT: Decimal = Decimal::TEN;

/// A computed total above this multiple of `base_price * nights` is treated as a resolution bug.
const SANITY_MULTIPLIER: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NightlyPrice {
    pub date: NaiveDate,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingWarning {
    /// A night resolved to exactly zero; the base price was charged instead.
    ZeroNightlyPrice { date: NaiveDate },
    /// The computed total was non-positive or implausibly large; base pricing was used instead.
    FallbackTotal { computed: Decimal, fallback: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub room_id: Ulid,
    pub stay: Stay,
    pub nightly: Vec<NightlyPrice>,
    pub subtotal: Decimal,
    pub fee_percent: Decimal,
    pub service_fee: Decimal,
    pub total: Decimal,
    pub warnings: Vec<PricingWarning>,
}

impl Quote {
    pub fn night_count(&self) -> usize {
        self.nightly.len()
    }
}

pub fn effective_fee_percent(room: &RoomState) -> Decimal {
    room.service_fee_percent.unwrap_or(DEFAULT_SERVICE_FEE_PERCENT)
}

fn in_range(v: Option<Decimal>) -> Result<Decimal, EngineError> {
    v.ok_or(EngineError::LimitExceeded("stay amount too large"))
}

fn fee_on(subtotal: Decimal, percent: Decimal) -> Result<Decimal, EngineError> {
    in_range(subtotal.checked_mul(percent).and_then(|v| v.checked_div(Decimal::ONE_HUNDRED)))
}

fn sum_of(mut prices: impl Iterator<Item = Decimal>) -> Result<Decimal, EngineError> {
    prices.try_fold(Decimal::ZERO, |acc, p| in_range(acc.checked_add(p)))
}

/// Price every night of `[check_in, check_out)` and aggregate.
///
/// 1. Each night takes its seasonal price, else the base price.
/// 2. A night that resolves to exactly zero is charged the base price and flagged.
/// 3. Fee = subtotal × (fee percent or 10) / 100.
/// 4. A non-positive total, or one above 50× the naive base total, is replaced by
///    naive base pricing and flagged.
///
/// Amounts outside `Decimal` range fail with `LimitExceeded` instead of panicking.
pub fn quote(room: &RoomState, check_in: NaiveDate, check_out: NaiveDate) -> Result<Quote, EngineError> {
    let stay = checked_stay(check_in, check_out)?;
    let percent = effective_fee_percent(room);
    let mut warnings = Vec::new();

    let mut nightly: Vec<NightlyPrice> = stay
        .nights()
        .into_iter()
        .map(|date| {
            let mut price = price_for(room, date);
            if price.is_zero() {
                warn!(room = %room.id, %date, "nightly price resolved to zero, charging base price");
                warnings.push(PricingWarning::ZeroNightlyPrice { date });
                price = room.base_price;
            }
            NightlyPrice { date, price }
        })
        .collect();

    let mut subtotal = sum_of(nightly.iter().map(|n| n.price))?;
    let mut service_fee = fee_on(subtotal, percent)?;
    let mut total = in_range(subtotal.checked_add(service_fee))?;

    let nights = Decimal::from(stay.night_count());
    let naive_base = in_range(room.base_price.checked_mul(nights))?;
    let ceiling = naive_base.checked_mul(Decimal::from(SANITY_MULTIPLIER));
    if total <= Decimal::ZERO || ceiling.is_some_and(|c| total > c) {
        let computed = total;
        nightly = nightly
            .into_iter()
            .map(|n| NightlyPrice { date: n.date, price: room.base_price })
            .collect();
        subtotal = naive_base;
        service_fee = fee_on(subtotal, percent)?;
        total = in_range(subtotal.checked_add(service_fee))?;
        warn!(room = %room.id, %computed, fallback = %total, "implausible stay total, fell back to base pricing");
        metrics::counter!(crate::observability::PRICING_FALLBACKS_TOTAL).increment(1);
        warnings.push(PricingWarning::FallbackTotal { computed, fallback: total });
    }

    Ok(Quote {
        room_id: room.id,
        stay,
        nightly,
        subtotal,
        fee_percent: percent,
        service_fee,
        total,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::d;
    use crate::model::SeasonalPricePeriod;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn summer_room(fee: Option<Decimal>) -> RoomState {
        let mut rs = RoomState::new(Ulid::new(), Some("Sea View".into()), dec(80), fee);
        rs.seasonal_prices.push(SeasonalPricePeriod {
            id: Ulid::new(),
            name: "Summer".into(),
            start_date: d("2025-06-15"),
            end_date: d("2025-06-22"),
            price: dec(150),
            description: None,
        });
        rs
    }

    #[test]
    fn stay_inside_season() {
        let q = quote(&summer_room(None), d("2025-06-17"), d("2025-06-20")).unwrap();
        let prices: Vec<_> = q.nightly.iter().map(|n| n.price).collect();
        assert_eq!(prices, vec![dec(150), dec(150), dec(150)]);
        assert_eq!(q.subtotal, dec(450));
        assert_eq!(q.service_fee, dec(45));
        assert_eq!(q.total, dec(495));
        assert!(q.warnings.is_empty());
    }

    #[test]
    fn stay_crossing_season_start() {
        let q = quote(&summer_room(None), d("2025-06-14"), d("2025-06-16")).unwrap();
        let prices: Vec<_> = q.nightly.iter().map(|n| n.price).collect();
        assert_eq!(prices, vec![dec(80), dec(150)]);
        assert_eq!(q.subtotal, dec(230));
        assert_eq!(q.service_fee, dec(23));
        assert_eq!(q.total, dec(253));
    }

    #[test]
    fn checkout_day_not_charged() {
        // 2025-06-15 is the first summer day, but it is the departure day here
        let q = quote(&summer_room(None), d("2025-06-14"), d("2025-06-15")).unwrap();
        assert_eq!(q.night_count(), 1);
        assert_eq!(q.subtotal, dec(80));
    }

    #[test]
    fn nightly_sum_matches_subtotal() {
        let rs = summer_room(Some(Decimal::new(125, 1)));
        let cases = [
            ("2025-06-01", "2025-06-02"),
            ("2025-06-10", "2025-06-30"),
            ("2025-06-20", "2025-07-04"),
            ("2025-05-30", "2025-08-30"),
        ];
        for (a, b) in cases {
            let q = quote(&rs, d(a), d(b)).unwrap();
            let sum: Decimal = q.nightly.iter().map(|n| n.price).sum();
            assert_eq!(sum, q.subtotal);
            assert_eq!(q.nightly.len() as i64, (d(b) - d(a)).num_days());
            assert_eq!(q.total, q.subtotal + q.service_fee);
        }
    }

    #[test]
    fn explicit_zero_fee_is_no_fee() {
        let q = quote(&summer_room(Some(Decimal::ZERO)), d("2025-06-17"), d("2025-06-20")).unwrap();
        assert_eq!(q.service_fee, Decimal::ZERO);
        assert_eq!(q.total, dec(450));
        assert_eq!(q.fee_percent, Decimal::ZERO);
    }

    #[test]
    fn unset_fee_defaults_to_ten_percent() {
        let q = quote(&summer_room(None), d("2025-06-17"), d("2025-06-19")).unwrap();
        assert_eq!(q.fee_percent, dec(10));
        assert_eq!(q.service_fee, q.subtotal * Decimal::new(10, 2));
    }

    #[test]
    fn fractional_fee() {
        let rs = RoomState::new(Ulid::new(), None, Decimal::new(9999, 2), Some(Decimal::new(75, 1)));
        let q = quote(&rs, d("2025-03-01"), d("2025-03-03")).unwrap();
        assert_eq!(q.subtotal, Decimal::new(19998, 2));
        // 199.98 * 7.5% = 14.9985
        assert_eq!(q.service_fee, Decimal::new(149985, 4));
    }

    #[test]
    fn zero_nightly_price_falls_back_to_base() {
        let mut rs = summer_room(None);
        // Bypasses upsert validation, as a damaged record would
        rs.seasonal_prices[0].price = Decimal::ZERO;
        let q = quote(&rs, d("2025-06-14"), d("2025-06-17")).unwrap();
        let prices: Vec<_> = q.nightly.iter().map(|n| n.price).collect();
        assert_eq!(prices, vec![dec(80), dec(80), dec(80)]);
        assert_eq!(q.subtotal, dec(240));
        assert_eq!(
            q.warnings,
            vec![
                PricingWarning::ZeroNightlyPrice { date: d("2025-06-15") },
                PricingWarning::ZeroNightlyPrice { date: d("2025-06-16") },
            ]
        );
    }

    #[test]
    fn implausible_total_falls_back_to_naive() {
        let mut rs = summer_room(None);
        rs.seasonal_prices[0].price = dec(1_000_000);
        let q = quote(&rs, d("2025-06-17"), d("2025-06-19")).unwrap();
        assert_eq!(q.subtotal, dec(160));
        assert_eq!(q.service_fee, dec(16));
        assert_eq!(q.total, dec(176));
        assert!(q.nightly.iter().all(|n| n.price == dec(80)));
        assert!(matches!(q.warnings.last(), Some(PricingWarning::FallbackTotal { .. })));
    }

    #[test]
    fn negative_total_falls_back_to_naive() {
        let mut rs = summer_room(Some(Decimal::ZERO));
        rs.seasonal_prices[0].price = dec(-500);
        let q = quote(&rs, d("2025-06-17"), d("2025-06-18")).unwrap();
        assert_eq!(q.total, dec(80));
        assert!(matches!(q.warnings[0], PricingWarning::FallbackTotal { .. }));
    }

    #[test]
    fn huge_base_price_is_an_error_not_a_panic() {
        let rs = RoomState::new(Ulid::new(), None, Decimal::from_i128_with_scale(7 * 10i128.pow(28), 0), None);
        assert!(matches!(
            quote(&rs, d("2025-03-01"), d("2025-03-04")),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn huge_fee_percent_is_an_error_not_a_panic() {
        let fee = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        let rs = RoomState::new(Ulid::new(), None, dec(80), Some(fee));
        assert!(matches!(
            quote(&rs, d("2025-03-01"), d("2025-03-04")),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn largest_accepted_inputs_still_quote() {
        let rs = RoomState::new(
            Ulid::new(),
            None,
            crate::limits::max_price(),
            Some(crate::limits::max_fee_percent()),
        );
        let q = quote(&rs, d("2025-01-01"), d("2026-01-01")).unwrap();
        assert_eq!(q.night_count(), 365);
        assert_eq!(q.total, q.subtotal + q.service_fee);
    }

    #[test]
    fn invalid_stay_rejected() {
        let rs = summer_room(None);
        assert!(matches!(
            quote(&rs, d("2025-06-17"), d("2025-06-17")),
            Err(EngineError::InvalidRange { .. })
        ));
        assert!(matches!(
            quote(&rs, d("2025-06-17"), d("2025-06-10")),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn overly_long_stay_rejected() {
        let rs = summer_room(None);
        assert!(matches!(
            quote(&rs, d("2025-01-01"), d("2026-06-01")),
            Err(EngineError::LimitExceeded(_))
        ));
    }
}

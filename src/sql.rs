use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use ulid::Ulid;

use crate::dates::{day_of, midnight_ms, parse_date_key};
use crate::model::*;

/// Which bookings a `SELECT ... FROM bookings` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    Room(Ulid),
    Id(Ulid),
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom {
        id: Ulid,
        name: Option<String>,
        base_price: Decimal,
        service_fee_percent: Option<Decimal>,
    },
    DeleteRoom {
        id: Ulid,
    },
    UpsertSeasonalPrice {
        room_id: Ulid,
        period: SeasonalPricePeriod,
    },
    DeleteSeasonalPrice {
        id: Ulid,
    },
    /// One `(room_id, date, available)` per VALUES row.
    SetAvailability {
        entries: Vec<(Ulid, NaiveDate, bool)>,
    },
    ToggleDate {
        room_id: Ulid,
        date: NaiveDate,
    },
    InsertBooking(NewBooking),
    DeleteBooking {
        id: Ulid,
    },
    PaymentSucceeded {
        booking_id: Ulid,
        payment_ref: String,
    },
    PaymentFailed {
        booking_id: Ulid,
        reason: String,
    },
    CancelBooking {
        booking_id: Ulid,
    },
    CompleteBooking {
        booking_id: Ulid,
    },
    SelectRooms,
    SelectSeasonalPrices {
        room_id: Ulid,
    },
    SelectBookings {
        filter: BookingFilter,
    },
    SelectCalendar {
        room_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    },
    SelectQuote {
        room_id: Ulid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    SelectAvailability {
        room_id: Ulid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(first) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match first {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn require<'a>(table: &'static str, row: &'a [Expr], min: usize) -> Result<&'a [Expr], SqlError> {
    if row.len() < min {
        return Err(SqlError::WrongArity(table, min, row.len()));
    }
    Ok(row)
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let rows = extract_insert_rows(insert)?;
    let values = &rows[0];

    match table.as_str() {
        "rooms" => {
            let v = require("rooms", values, 3)?;
            Ok(Command::InsertRoom {
                id: parse_ulid(&v[0])?,
                name: parse_text_or_null(&v[1])?,
                base_price: parse_decimal(&v[2])?,
                service_fee_percent: match v.get(3) {
                    Some(e) => parse_decimal_or_null(e)?,
                    None => None,
                },
            })
        }
        "seasonal_prices" => {
            let v = require("seasonal_prices", values, 6)?;
            Ok(Command::UpsertSeasonalPrice {
                room_id: parse_ulid(&v[1])?,
                period: SeasonalPricePeriod {
                    id: parse_ulid(&v[0])?,
                    name: parse_text(&v[2])?,
                    start_date: parse_date(&v[3])?,
                    end_date: parse_date(&v[4])?,
                    price: parse_decimal(&v[5])?,
                    description: match v.get(6) {
                        Some(e) => parse_text_or_null(e)?,
                        None => None,
                    },
                },
            })
        }
        "availability" => {
            let mut entries = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                let entry = parse_availability_row(row).map_err(|e| SqlError::Parse(format!("row {i}: {e}")))?;
                entries.push(entry);
            }
            Ok(Command::SetAvailability { entries })
        }
        "toggles" => {
            let v = require("toggles", values, 2)?;
            Ok(Command::ToggleDate {
                room_id: parse_ulid(&v[0])?,
                date: parse_date(&v[1])?,
            })
        }
        "bookings" => {
            let v = require("bookings", values, 7)?;
            Ok(Command::InsertBooking(NewBooking {
                id: parse_ulid(&v[0])?,
                room_id: parse_ulid(&v[1])?,
                guest: Guest {
                    name: parse_text(&v[2])?,
                    email: parse_text_or_null(&v[3])?,
                    phone: parse_text_or_null(&v[4])?,
                },
                check_in: parse_instant(&v[5])?,
                check_out: parse_instant(&v[6])?,
                adults: v.get(7).map(parse_u32).transpose()?.unwrap_or(1),
                children: v.get(8).map(parse_u32).transpose()?.unwrap_or(0),
                special_requests: match v.get(9) {
                    Some(e) => parse_text_or_null(e)?,
                    None => None,
                },
            }))
        }
        "payments" => {
            let v = require("payments", values, 2)?;
            let booking_id = parse_ulid(&v[0])?;
            let outcome = parse_text(&v[1])?.to_lowercase();
            let detail = match v.get(2) {
                Some(e) => parse_text_or_null(e)?,
                None => None,
            };
            match outcome.as_str() {
                "succeeded" => Ok(Command::PaymentSucceeded {
                    booking_id,
                    payment_ref: detail.ok_or(SqlError::MissingValue("payment reference"))?,
                }),
                "failed" => Ok(Command::PaymentFailed {
                    booking_id,
                    reason: detail.unwrap_or_else(|| "payment failed".to_string()),
                }),
                _ => Err(SqlError::Parse(format!("unknown payment outcome: {outcome}"))),
            }
        }
        "booking_actions" => {
            let v = require("booking_actions", values, 2)?;
            let booking_id = parse_ulid(&v[0])?;
            match parse_text(&v[1])?.to_lowercase().as_str() {
                "cancel" => Ok(Command::CancelBooking { booking_id }),
                "complete" => Ok(Command::CompleteBooking { booking_id }),
                other => Err(SqlError::Parse(format!("unknown booking action: {other}"))),
            }
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_availability_row(row: &[Expr]) -> Result<(Ulid, NaiveDate, bool), SqlError> {
    let v = require("availability", row, 3)?;
    Ok((parse_ulid(&v[0])?, parse_date(&v[1])?, parse_bool(&v[2])?))
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom { id }),
        "seasonal_prices" => Ok(Command::DeleteSeasonalPrice { id }),
        "bookings" => Ok(Command::DeleteBooking { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Equality and range filters collected from a WHERE clause.
#[derive(Default)]
struct Filters {
    id: Option<Ulid>,
    room_id: Option<Ulid>,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut f = Filters::default();
    if let Some(selection) = &select.selection {
        collect_filters(selection, &mut f)?;
    }

    match table.as_str() {
        "rooms" => Ok(Command::SelectRooms),
        "seasonal_prices" => Ok(Command::SelectSeasonalPrices {
            room_id: f.room_id.ok_or(SqlError::MissingFilter("room_id"))?,
        }),
        "bookings" => {
            let filter = match (f.id, f.room_id) {
                (Some(id), _) => BookingFilter::Id(id),
                (None, Some(room)) => BookingFilter::Room(room),
                (None, None) => return Err(SqlError::MissingFilter("room_id")),
            };
            Ok(Command::SelectBookings { filter })
        }
        "calendar" => Ok(Command::SelectCalendar {
            room_id: f.room_id.ok_or(SqlError::MissingFilter("room_id"))?,
            from: f.date_from.ok_or(SqlError::MissingFilter("date >="))?,
            to: f.date_to.ok_or(SqlError::MissingFilter("date <"))?,
        }),
        "quote" => Ok(Command::SelectQuote {
            room_id: f.room_id.ok_or(SqlError::MissingFilter("room_id"))?,
            check_in: f.check_in.ok_or(SqlError::MissingFilter("check_in"))?,
            check_out: f.check_out.ok_or(SqlError::MissingFilter("check_out"))?,
        }),
        "availability" => Ok(Command::SelectAvailability {
            room_id: f.room_id.ok_or(SqlError::MissingFilter("room_id"))?,
            check_in: f.check_in.ok_or(SqlError::MissingFilter("check_in"))?,
            check_out: f.check_out.ok_or(SqlError::MissingFilter("check_out"))?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn collect_filters(expr: &Expr, f: &mut Filters) -> Result<(), SqlError> {
    let Expr::BinaryOp { left, op, right } = expr else {
        return Ok(());
    };
    let col = expr_column_name(left);
    match (op, col.as_deref()) {
        (ast::BinaryOperator::And, _) => {
            collect_filters(left, f)?;
            collect_filters(right, f)?;
        }
        (ast::BinaryOperator::Eq, Some("id")) => f.id = Some(parse_ulid(right)?),
        (ast::BinaryOperator::Eq, Some("room_id")) => f.room_id = Some(parse_ulid(right)?),
        (ast::BinaryOperator::Eq, Some("check_in")) => f.check_in = Some(parse_date(right)?),
        (ast::BinaryOperator::Eq, Some("check_out")) => f.check_out = Some(parse_date(right)?),
        (ast::BinaryOperator::GtEq, Some("date")) => f.date_from = Some(parse_date(right)?),
        (ast::BinaryOperator::Lt, Some("date")) => f.date_to = Some(parse_date(right)?),
        (ast::BinaryOperator::LtEq, Some("date")) => {
            let last = parse_date(right)?;
            f.date_to = Some(last.succ_opt().ok_or(SqlError::Parse("date out of range".into()))?);
        }
        _ => {}
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) if !values.rows.is_empty() => Ok(&values.rows),
        SetExpr::Values(_) => Err(SqlError::Parse("empty VALUES".into())),
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    match selection.as_ref() {
        Some(Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right })
            if expr_column_name(left).as_deref() == Some("id") =>
        {
            parse_ulid(right)
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

/// A literal's text, for strings and numbers alike.
fn literal_text(expr: &Expr) -> Result<String, SqlError> {
    match expr {
        Expr::Value(ValueWithSpan { value: Value::SingleQuotedString(s) | Value::Number(s, _), .. }) => {
            Ok(s.clone())
        }
        Expr::UnaryOp { op: ast::UnaryOperator::Minus, expr } => Ok(format!("-{}", literal_text(expr)?)),
        _ => Err(SqlError::Parse(format!("expected literal, got {expr}"))),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = literal_text(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID {s}: {e}")))
}

fn parse_text(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        _ => Err(SqlError::Parse(format!("expected string, got {expr}"))),
    }
}

fn parse_text_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_text(expr).map(Some)
}

fn parse_decimal(expr: &Expr) -> Result<Decimal, SqlError> {
    let s = literal_text(expr)?;
    Decimal::from_str(s.trim()).map_err(|e| SqlError::Parse(format!("bad amount {s}: {e}")))
}

fn parse_decimal_or_null(expr: &Expr) -> Result<Option<Decimal>, SqlError> {
    if is_null(expr) {
        return Ok(None);
    }
    parse_decimal(expr).map(Some)
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    let s = literal_text(expr)?;
    s.trim().parse().map_err(|e| SqlError::Parse(format!("bad integer {s}: {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

/// Calendar date from `'YYYY-MM-DD'` or Unix ms (UTC).
fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = literal_text(expr)?;
    if let Some(date) = parse_date_key(&s) {
        return Ok(date);
    }
    let ms: i64 = s
        .trim()
        .parse()
        .map_err(|_| SqlError::Parse(format!("bad date: {s}")))?;
    day_of(ms).ok_or_else(|| SqlError::Parse(format!("date out of range: {ms}")))
}

/// Unix ms from a number, or UTC midnight of a `'YYYY-MM-DD'` string.
fn parse_instant(expr: &Expr) -> Result<Ms, SqlError> {
    let s = literal_text(expr)?;
    if let Some(date) = parse_date_key(&s) {
        return Ok(midnight_ms(date));
    }
    parse_i64(expr)
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    match extract_value(expr) {
        Some(Value::Boolean(b)) => Ok(*b),
        Some(Value::SingleQuotedString(s)) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
        },
        Some(Value::Number(n, _)) => Ok(n != "0"),
        _ => Err(SqlError::Parse(format!("expected bool, got {expr}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("{0}: expected at least {1} values, got {2}")]
    WrongArity(&'static str, usize, usize),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::d;

    const ROOM: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const OTHER: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    #[test]
    fn parse_insert_room() {
        let sql = format!("INSERT INTO rooms (id, name, base_price, service_fee_percent) VALUES ('{ROOM}', 'Sea View', 80.50, 0)");
        match parse_sql(&sql).unwrap() {
            Command::InsertRoom { id, name, base_price, service_fee_percent } => {
                assert_eq!(id.to_string(), ROOM);
                assert_eq!(name.as_deref(), Some("Sea View"));
                assert_eq!(base_price, Decimal::new(8050, 2));
                assert_eq!(service_fee_percent, Some(Decimal::ZERO));
            }
            other => panic!("expected InsertRoom, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_room_fee_unset() {
        let sql = format!("INSERT INTO rooms (id, name, base_price) VALUES ('{ROOM}', NULL, '80')");
        match parse_sql(&sql).unwrap() {
            Command::InsertRoom { name, service_fee_percent, .. } => {
                assert_eq!(name, None);
                assert_eq!(service_fee_percent, None);
            }
            other => panic!("expected InsertRoom, got {other:?}"),
        }
        let sql = format!("INSERT INTO rooms (id, name, base_price, service_fee_percent) VALUES ('{ROOM}', NULL, 80, NULL)");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::InsertRoom { service_fee_percent: None, .. }
        ));
    }

    #[test]
    fn parse_negative_price_kept_for_engine_to_reject() {
        let sql = format!("INSERT INTO rooms (id, name, base_price) VALUES ('{ROOM}', NULL, -5)");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::InsertRoom { base_price, .. } if base_price == Decimal::new(-5, 0)
        ));
    }

    #[test]
    fn parse_seasonal_price() {
        let sql = format!(
            "INSERT INTO seasonal_prices (id, room_id, name, start_date, end_date, price, description) \
             VALUES ('{OTHER}', '{ROOM}', 'Summer', '2025-06-15', '2025-06-22', 150, NULL)"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpsertSeasonalPrice { room_id, period } => {
                assert_eq!(room_id.to_string(), ROOM);
                assert_eq!(period.id.to_string(), OTHER);
                assert_eq!(period.start_date, d("2025-06-15"));
                assert_eq!(period.end_date, d("2025-06-22"));
                assert_eq!(period.price, Decimal::new(150, 0));
                assert_eq!(period.description, None);
            }
            other => panic!("expected UpsertSeasonalPrice, got {other:?}"),
        }
    }

    #[test]
    fn parse_multi_row_availability() {
        let sql = format!(
            "INSERT INTO availability (room_id, date, available) VALUES ('{ROOM}', '2025-07-10', false), ('{ROOM}', '2025-07-11', true)"
        );
        match parse_sql(&sql).unwrap() {
            Command::SetAvailability { entries } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].1, d("2025-07-10"));
                assert!(!entries[0].2);
                assert!(entries[1].2);
            }
            other => panic!("expected SetAvailability, got {other:?}"),
        }
    }

    #[test]
    fn parse_toggle() {
        let sql = format!("INSERT INTO toggles (room_id, date) VALUES ('{ROOM}', '2025-07-10')");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::ToggleDate { date, .. } if date == d("2025-07-10")));
    }

    #[test]
    fn parse_insert_booking_with_dates() {
        let sql = format!(
            "INSERT INTO bookings (id, room_id, guest_name, guest_email, guest_phone, check_in, check_out, adults, children, special_requests) \
             VALUES ('{OTHER}', '{ROOM}', 'Ada', 'ada@example.com', NULL, '2025-06-17', '2025-06-20', 2, 1, 'late arrival')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking(b) => {
                assert_eq!(b.guest.name, "Ada");
                assert_eq!(b.guest.phone, None);
                assert_eq!(b.check_in, midnight_ms(d("2025-06-17")));
                assert_eq!(b.check_out, midnight_ms(d("2025-06-20")));
                assert_eq!((b.adults, b.children), (2, 1));
                assert_eq!(b.special_requests.as_deref(), Some("late arrival"));
            }
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_with_ms_and_defaults() {
        let sql = format!(
            "INSERT INTO bookings (id, room_id, guest_name, guest_email, guest_phone, check_in, check_out) \
             VALUES ('{OTHER}', '{ROOM}', 'Ada', NULL, NULL, 1750118400000, 1750377600000)"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking(b) => {
                assert_eq!(b.check_in, 1_750_118_400_000);
                assert_eq!(b.adults, 1);
                assert_eq!(b.children, 0);
            }
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn parse_payments() {
        let ok = format!("INSERT INTO payments (booking_id, outcome, detail) VALUES ('{OTHER}', 'succeeded', 'pi_123')");
        assert!(matches!(
            parse_sql(&ok).unwrap(),
            Command::PaymentSucceeded { payment_ref, .. } if payment_ref == "pi_123"
        ));
        let failed = format!("INSERT INTO payments (booking_id, outcome, detail) VALUES ('{OTHER}', 'failed', 'card declined')");
        assert!(matches!(
            parse_sql(&failed).unwrap(),
            Command::PaymentFailed { reason, .. } if reason == "card declined"
        ));
        let no_ref = format!("INSERT INTO payments (booking_id, outcome, detail) VALUES ('{OTHER}', 'succeeded', NULL)");
        assert!(matches!(parse_sql(&no_ref), Err(SqlError::MissingValue(_))));
        let bogus = format!("INSERT INTO payments (booking_id, outcome) VALUES ('{OTHER}', 'maybe')");
        assert!(parse_sql(&bogus).is_err());
    }

    #[test]
    fn parse_booking_actions() {
        let cancel = format!("INSERT INTO booking_actions (booking_id, action) VALUES ('{OTHER}', 'cancel')");
        assert!(matches!(parse_sql(&cancel).unwrap(), Command::CancelBooking { .. }));
        let complete = format!("INSERT INTO booking_actions (booking_id, action) VALUES ('{OTHER}', 'COMPLETE')");
        assert!(matches!(parse_sql(&complete).unwrap(), Command::CompleteBooking { .. }));
    }

    #[test]
    fn parse_deletes() {
        for (table, expect) in [("rooms", "room"), ("seasonal_prices", "season"), ("bookings", "booking")] {
            let cmd = parse_sql(&format!("DELETE FROM {table} WHERE id = '{ROOM}'")).unwrap();
            let ok = match cmd {
                Command::DeleteRoom { .. } => expect == "room",
                Command::DeleteSeasonalPrice { .. } => expect == "season",
                Command::DeleteBooking { .. } => expect == "booking",
                _ => false,
            };
            assert!(ok, "{table}");
        }
        assert!(matches!(parse_sql("DELETE FROM rooms"), Err(SqlError::MissingFilter("id"))));
    }

    #[test]
    fn parse_select_calendar() {
        let sql = format!("SELECT * FROM calendar WHERE room_id = '{ROOM}' AND date >= '2025-07-01' AND date < '2025-08-01'");
        match parse_sql(&sql).unwrap() {
            Command::SelectCalendar { from, to, .. } => {
                assert_eq!(from, d("2025-07-01"));
                assert_eq!(to, d("2025-08-01"));
            }
            other => panic!("expected SelectCalendar, got {other:?}"),
        }
    }

    #[test]
    fn parse_select_quote_and_availability() {
        let q = format!("SELECT * FROM quote WHERE room_id = '{ROOM}' AND check_in = '2025-06-17' AND check_out = '2025-06-20'");
        assert!(matches!(
            parse_sql(&q).unwrap(),
            Command::SelectQuote { check_in, check_out, .. }
                if check_in == d("2025-06-17") && check_out == d("2025-06-20")
        ));
        let a = format!("SELECT * FROM availability WHERE room_id = '{ROOM}' AND check_in = '2025-07-09' AND check_out = '2025-07-10'");
        assert!(matches!(parse_sql(&a).unwrap(), Command::SelectAvailability { .. }));
        let missing = format!("SELECT * FROM quote WHERE room_id = '{ROOM}' AND check_in = '2025-06-17'");
        assert!(matches!(parse_sql(&missing), Err(SqlError::MissingFilter("check_out"))));
    }

    #[test]
    fn parse_select_bookings_filters() {
        let by_room = format!("SELECT * FROM bookings WHERE room_id = '{ROOM}'");
        assert!(matches!(
            parse_sql(&by_room).unwrap(),
            Command::SelectBookings { filter: BookingFilter::Room(_) }
        ));
        let by_id = format!("SELECT * FROM bookings WHERE id = '{OTHER}'");
        assert!(matches!(
            parse_sql(&by_id).unwrap(),
            Command::SelectBookings { filter: BookingFilter::Id(_) }
        ));
        assert!(matches!(parse_sql("SELECT * FROM rooms").unwrap(), Command::SelectRooms));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
        assert!(matches!(
            parse_sql(&format!("INSERT INTO foobar (id) VALUES ('{ROOM}')")),
            Err(SqlError::UnknownTable(_))
        ));
        assert!(matches!(
            parse_sql(&format!("INSERT INTO rooms (id) VALUES ('{ROOM}')")),
            Err(SqlError::WrongArity("rooms", 3, 1))
        ));
        assert!(matches!(
            parse_sql(&format!("INSERT INTO toggles (room_id, date) VALUES ('{ROOM}', 'next tuesday')")),
            Err(SqlError::Parse(_))
        ));
    }
}

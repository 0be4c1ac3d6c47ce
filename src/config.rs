use std::path::PathBuf;
use std::str::FromStr;

use crate::model::Ms;

/// Server settings, read once from `INNKEEP_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    /// Unpaid bookings older than this are failed by the sweeper.
    pub payment_ttl_ms: Ms,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "innkeep".into(),
            max_connections: 256,
            compact_threshold: 1000,
            payment_ttl_ms: 30 * 60 * 1000,
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "INNKEEP_PORT").unwrap_or(defaults.port),
            bind: lookup("INNKEEP_BIND").unwrap_or(defaults.bind),
            data_dir: lookup("INNKEEP_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            password: lookup("INNKEEP_PASSWORD").unwrap_or(defaults.password),
            max_connections: parsed(&lookup, "INNKEEP_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            compact_threshold: parsed(&lookup, "INNKEEP_COMPACT_THRESHOLD").unwrap_or(defaults.compact_threshold),
            payment_ttl_ms: parsed(&lookup, "INNKEEP_PAYMENT_TTL_MS").unwrap_or(defaults.payment_ttl_ms),
            metrics_port: parsed(&lookup, "INNKEEP_METRICS_PORT"),
            tls_cert: lookup("INNKEEP_TLS_CERT"),
            tls_key: lookup("INNKEEP_TLS_KEY"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = from_pairs(&[]);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:5433");
        assert_eq!(cfg.password, "innkeep");
        assert_eq!(cfg.payment_ttl_ms, 1_800_000);
        assert_eq!(cfg.metrics_port, None);
        assert!(cfg.tls_cert.is_none());
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = from_pairs(&[
            ("INNKEEP_PORT", "6000"),
            ("INNKEEP_MAX_CONNECTIONS", "lots"),
            ("INNKEEP_PAYMENT_TTL_MS", "60000"),
            ("INNKEEP_METRICS_PORT", "9100"),
            ("INNKEEP_DATA_DIR", "/var/lib/innkeep"),
        ]);
        assert_eq!(cfg.port, 6000);
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.payment_ttl_ms, 60_000);
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/innkeep"));
    }

    #[test]
    fn every_numeric_key_overridable() {
        let cfg = from_pairs(&[
            ("INNKEEP_PORT", "7000"),
            ("INNKEEP_MAX_CONNECTIONS", "12"),
            ("INNKEEP_COMPACT_THRESHOLD", "50"),
            ("INNKEEP_PAYMENT_TTL_MS", "120000"),
            ("INNKEEP_METRICS_PORT", "9200"),
        ]);
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.max_connections, 12);
        assert_eq!(cfg.compact_threshold, 50);
        assert_eq!(cfg.payment_ttl_ms, 120_000);
        assert_eq!(cfg.metrics_port, Some(9200));
    }
}

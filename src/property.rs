use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::engine::Engine;
use crate::limits::*;
use crate::model::Ms;
use crate::notify::NotifyHub;
use crate::reaper;

/// One engine per property. A property is the database name a client connects to,
/// so a chain of hotels shares one server with fully separate data and logs.
pub struct PropertyManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    payment_ttl_ms: Ms,
}

impl PropertyManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, payment_ttl_ms: Ms) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            payment_ttl_ms,
        }
    }

    /// Get or lazily open the engine for `property`, replaying its WAL on first use.
    pub fn get_or_create(&self, property: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(property) {
            return Ok(engine.value().clone());
        }
        if property.len() > MAX_PROPERTY_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "property name too long",
            ));
        }
        if self.engines.len() >= MAX_PROPERTIES {
            return Err(std::io::Error::other("too many properties"));
        }

        // The name becomes a file name; keep it inside data_dir.
        let safe_name: String = property
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty property name",
            ));
        }

        let engine = match self.engines.entry(property.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => return Ok(e.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let engine = Arc::new(Engine::new(wal_path, Arc::new(NotifyHub::new()))?);
                slot.insert(engine.clone());
                engine
            }
        };

        tokio::spawn(reaper::run_expiry_sweeper(engine.clone(), self.payment_ttl_ms));
        tokio::spawn(reaper::run_compactor(engine.clone(), self.compact_threshold));

        tracing::info!(property, "property opened");
        metrics::gauge!(crate::observability::PROPERTIES_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}

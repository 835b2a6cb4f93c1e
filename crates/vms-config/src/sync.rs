//! Sync run tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const fn default_batch_size() -> usize {
    50
}

const fn default_workers() -> usize {
    4
}

const fn default_fetch_timeout_secs() -> u64 {
    30
}

const fn default_map_timeout_secs() -> u64 {
    10
}

fn default_custom_attribute() -> String {
    "cloud_instance_name".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Identifiers per worker batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batches processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound for a single item fetch.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound for mapping a single item.
    #[serde(default = "default_map_timeout_secs")]
    pub map_timeout_secs: u64,

    /// Scope tag for stored rows. Empty means "use the vCenter host".
    #[serde(default)]
    pub scope: String,

    /// Skip deletes when `discovered / stored` falls below this ratio.
    /// `0.0` disables the check; an empty discovery is always guarded.
    #[serde(default)]
    pub min_discovery_ratio: f64,

    /// Custom field whose value is copied into `cloud_name`.
    #[serde(default = "default_custom_attribute")]
    pub custom_attribute: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            map_timeout_secs: default_map_timeout_secs(),
            scope: String::new(),
            min_discovery_ratio: 0.0,
            custom_attribute: default_custom_attribute(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub const fn map_timeout(&self) -> Duration {
        Duration::from_secs(self.map_timeout_secs)
    }

    /// Check the tuning values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| ConfigError::InvalidValue {
            field: format!("sync.{field}"),
            reason: reason.to_string(),
        };
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(invalid("fetch_timeout_secs", "must be at least 1"));
        }
        if self.map_timeout_secs == 0 {
            return Err(invalid("map_timeout_secs", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_discovery_ratio) {
            return Err(invalid("min_discovery_ratio", "must be between 0.0 and 1.0"));
        }
        Ok(())
    }
}

//! # vms-config
//!
//! Layered configuration loading for vmsync using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`VMSYNC_*` prefix, `__` as separator)
//! 2. Legacy collector variables (`VCENTER`, `VSPHERE_USER`, `VSPHERE_PASSWORD`, `LOGLEVEL`)
//! 3. An explicit config file, or `./vmsync.toml`
//! 4. User-level `~/.config/vmsync/config.toml`
//! 5. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `VMSYNC_VCENTER__HOST` -> `vcenter.host`, `VMSYNC_SYNC__BATCH_SIZE`
//! -> `sync.batch_size`, etc. The `__` (double underscore) separates nested sections.
//!
//! # Usage
//!
//! ```no_run
//! use vms_config::VmsConfig;
//!
//! let config = VmsConfig::load_with_dotenv(None).expect("config");
//! config.validate().expect("valid config");
//! println!("syncing scope {}", config.scope());
//! ```

mod database;
mod error;
mod log;
mod sync;
mod vcenter;

pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use log::LogConfig;
pub use sync::SyncConfig;
pub use vcenter::VcenterConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Flat variables read by earlier deployments, and where they land.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("VCENTER", "vcenter.host"),
    ("VSPHERE_USER", "vcenter.username"),
    ("VSPHERE_PASSWORD", "vcenter.password"),
    ("LOGLEVEL", "log.level"),
];

/// The single configuration value built at startup and passed down explicitly.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VmsConfig {
    #[serde(default)]
    pub vcenter: VcenterConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl VmsConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need
    /// `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be read or a value
    /// has the wrong type.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(config_file).extract().map_err(ConfigError::from)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn load_with_dotenv(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        // A missing .env is normal in production.
        let _ = dotenvy::dotenv();
        Self::load(config_file)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        // Layer 2: Explicit file, else ./vmsync.toml
        let local_path = config_file.map_or_else(|| PathBuf::from("vmsync.toml"), Path::to_path_buf);
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Legacy flat variables
        figment = figment.merge(Self::legacy_env());

        // Layer 4: Environment variables (highest priority)
        figment.merge(Env::prefixed("VMSYNC_").split("__"))
    }

    /// Check every section needed for a sync run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when the vCenter host or
    /// credentials are missing, `ConfigError::InvalidValue` for bad tuning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.vcenter.is_configured() {
            return Err(ConfigError::NotConfigured {
                section: "vcenter".to_string(),
            });
        }
        if self.vcenter.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "vcenter.request_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.database.url.is_empty() {
            return Err(ConfigError::NotConfigured {
                section: "database".to_string(),
            });
        }
        self.sync.validate()
    }

    /// Scope tag for this run: `sync.scope`, falling back to the vCenter host.
    #[must_use]
    pub fn scope(&self) -> String {
        if self.sync.scope.is_empty() {
            self.vcenter.host_name().to_string()
        } else {
            self.sync.scope.clone()
        }
    }

    /// A copy safe to print: secrets replaced with `***`.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| if s.is_empty() { String::new() } else { "***".to_string() };
        let mut copy = self.clone();
        copy.vcenter.password = mask(&self.vcenter.password);
        copy.database.auth_token = mask(&self.database.auth_token);
        copy
    }

    fn legacy_env() -> Env {
        let keys: Vec<&str> = LEGACY_ENV.iter().map(|(key, _)| *key).collect();
        Env::raw().only(&keys).map(|key| {
            LEGACY_ENV
                .iter()
                .find(|(legacy, _)| key.as_str().eq_ignore_ascii_case(legacy))
                .map_or_else(|| key.as_str().to_string(), |(_, target)| (*target).to_string())
                .into()
        })
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vmsync").join("config.toml"))
    }
}

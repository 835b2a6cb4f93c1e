//! Persistence configuration.

use serde::{Deserialize, Serialize};

fn default_url() -> String {
    "vmsync.db".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Local database file, `:memory:`, or a remote `libsql://` / `https://` URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Auth token for remote databases. Unused for local files.
    #[serde(default)]
    pub auth_token: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            auth_token: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// Whether `url` points at a remote libSQL server.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        ["libsql://", "https://", "http://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_local_file() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "vmsync.db");
        assert!(!config.is_remote());
    }

    #[test]
    fn remote_schemes_detected() {
        let config = DatabaseConfig {
            url: "libsql://inventory-acme.turso.io".into(),
            auth_token: "token".into(),
        };
        assert!(config.is_remote());
    }
}

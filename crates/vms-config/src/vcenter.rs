//! Remote inventory endpoint configuration.

use serde::{Deserialize, Serialize};

/// Default per-request timeout in seconds.
const fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VcenterConfig {
    /// Host name or base URL of the management endpoint (e.g. `vc01.example.com`).
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Skip TLS certificate verification (self-signed appliance certificates).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for VcenterConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            accept_invalid_certs: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl VcenterConfig {
    /// Check if host and credentials are all present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }

    /// Base URL for API calls. A bare host is assumed to speak HTTPS.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }

    /// Host without scheme or trailing slash, used as the default scope tag.
    #[must_use]
    pub fn host_name(&self) -> &str {
        let host = self.host.trim_end_matches('/');
        host.strip_prefix("https://")
            .or_else(|| host.strip_prefix("http://"))
            .unwrap_or(host)
    }
}

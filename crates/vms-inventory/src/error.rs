//! Inventory provider error types.

use thiserror::Error;
use vms_core::ProviderError;

/// Errors that can occur when talking to the inventory API.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The session could not be created.
    #[error("login to {host} failed: {reason}")]
    Login { host: String, reason: String },

    /// Failed to parse an API response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<InventoryError> for ProviderError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::Http(e) => Self::Transport(e.to_string()),
            InventoryError::Api { status, message } => Self::Api { status, message },
            e @ InventoryError::Login { .. } => Self::Unavailable(e.to_string()),
            InventoryError::Parse(msg) => Self::Parse(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failure_is_unavailable() {
        let err: ProviderError = InventoryError::Login {
            host: "vc01".into(),
            reason: "401".into(),
        }
        .into();
        assert!(matches!(err, ProviderError::Unavailable(msg) if msg.contains("vc01")));
    }

    #[test]
    fn api_status_is_kept() {
        let err: ProviderError = InventoryError::Api {
            status: 503,
            message: "busy".into(),
        }
        .into();
        assert_eq!(
            err,
            ProviderError::Api {
                status: 503,
                message: "busy".into()
            }
        );
    }
}

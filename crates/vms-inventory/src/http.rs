//! Shared HTTP response helpers for the inventory client.

use crate::error::InventoryError;

/// Header carrying the session token on every call after login.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// Return the response unchanged on success, else [`InventoryError::Api`]
/// with the status code and response body.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, InventoryError> {
    if !resp.status().is_success() {
        return Err(InventoryError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

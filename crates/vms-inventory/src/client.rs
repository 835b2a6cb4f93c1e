//! REST client: login, discovery, per-item fetch, logout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vms_config::{SyncConfig, VcenterConfig};
use vms_core::provider::{InventoryProvider, InventorySession, RawItem};
use vms_core::{MapError, ProviderError, VmRecord};

use crate::error::InventoryError;
use crate::http::{SESSION_HEADER, check_response};
use crate::mapper::VsphereMapper;
use crate::model::{CustomFieldDef, VmListEntry};

/// Opens authenticated sessions against one vCenter.
pub struct VsphereProvider {
    http: reqwest::Client,
    base_url: String,
    host: String,
    username: String,
    password: String,
    scope: String,
    custom_attribute: String,
}

impl VsphereProvider {
    /// Build a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Http`] if the HTTP client cannot be built.
    pub fn new(
        vcenter: &VcenterConfig,
        sync: &SyncConfig,
        scope: impl Into<String>,
    ) -> Result<Self, InventoryError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vmsync/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(vcenter.request_timeout_secs))
            .danger_accept_invalid_certs(vcenter.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            base_url: vcenter.base_url(),
            host: vcenter.host_name().to_string(),
            username: vcenter.username.clone(),
            password: vcenter.password.clone(),
            scope: scope.into(),
            custom_attribute: sync.custom_attribute.clone(),
        })
    }

    async fn login(&self) -> Result<String, InventoryError> {
        let url = format!("{}/api/session", self.base_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| self.login_error(e))?;
        let resp = check_response(resp).await.map_err(|e| self.login_error(e))?;
        let token: String = resp.json().await.map_err(|e| self.login_error(e))?;
        if token.is_empty() {
            return Err(self.login_error("empty session token"));
        }
        Ok(token)
    }

    /// Custom field definitions, fetched once per session.
    async fn custom_fields(&self, token: &str) -> Result<Vec<CustomFieldDef>, InventoryError> {
        let url = format!("{}/api/inventory/custom-fields", self.base_url);
        let resp = self.http.get(&url).header(SESSION_HEADER, token).send().await?;
        check_response(resp)
            .await?
            .json()
            .await
            .map_err(|e| InventoryError::Parse(format!("custom fields: {e}")))
    }

    fn login_error(&self, reason: impl ToString) -> InventoryError {
        InventoryError::Login {
            host: self.host.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl InventoryProvider for VsphereProvider {
    type Session = VsphereSession;

    async fn open_session(&self) -> Result<Self::Session, ProviderError> {
        let token = self.login().await?;
        tracing::debug!(host = %self.host, "connected to vCenter");

        let fields = match self.custom_fields(&token).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(host = %self.host, error = %e, "custom field definitions unavailable");
                Vec::new()
            }
        };

        Ok(VsphereSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            host: self.host.clone(),
            token,
            mapper: VsphereMapper::new(&self.scope, &self.host, &self.custom_attribute, fields),
            closed: AtomicBool::new(false),
        })
    }
}

/// One authenticated conversation with a vCenter.
pub struct VsphereSession {
    http: reqwest::Client,
    base_url: String,
    host: String,
    token: String,
    mapper: VsphereMapper,
    closed: AtomicBool,
}

impl VsphereSession {
    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).header(SESSION_HEADER, &self.token)
    }

    async fn list(&self) -> Result<Vec<String>, InventoryError> {
        let url = format!("{}/api/inventory/vms", self.base_url);
        let resp = check_response(self.get(&url).send().await?).await?;
        let entries: Vec<VmListEntry> = resp
            .json()
            .await
            .map_err(|e| InventoryError::Parse(format!("vm list: {e}")))?;

        let total = entries.len();
        let uuids: Vec<String> = entries
            .into_iter()
            .filter_map(|entry| entry.uuid)
            .filter(|uuid| !uuid.trim().is_empty())
            .collect();
        if uuids.len() < total {
            tracing::debug!(
                host = %self.host,
                skipped = total - uuids.len(),
                "skipped VMs without a uuid"
            );
        }
        Ok(uuids)
    }

    async fn fetch(&self, identifier: &str) -> Result<Option<RawItem>, InventoryError> {
        let url = format!(
            "{}/api/inventory/vms/{}",
            self.base_url,
            urlencoding::encode(identifier)
        );
        let resp = self.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_response(resp).await?;
        let properties: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| InventoryError::Parse(format!("vm {identifier}: {e}")))?;
        Ok(Some(RawItem::new(identifier, properties)))
    }
}

#[async_trait]
impl InventorySession for VsphereSession {
    async fn list_identifiers(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.list().await?)
    }

    async fn fetch_item(&self, identifier: &str) -> Result<Option<RawItem>, ProviderError> {
        Ok(self.fetch(identifier).await?)
    }

    fn map_to_record(&self, raw: &RawItem) -> Result<VmRecord, MapError> {
        self.mapper.map(raw)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let url = format!("{}/api/session", self.base_url);
        let result = self
            .http
            .delete(&url)
            .header(SESSION_HEADER, &self.token)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(host = %self.host, "disconnected from vCenter");
            }
            Ok(resp) => {
                tracing::debug!(host = %self.host, status = resp.status().as_u16(), "logout refused");
            }
            Err(e) => tracing::debug!(host = %self.host, error = %e, "logout failed"),
        }
    }
}

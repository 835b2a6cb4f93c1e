//! End-to-end run: discover, dispatch batches, commit, delete orphans.
//!
//! ```text
//! Discovering -> Dispatching -> Committing -> ReconcilingDeletes -> Done
//!      \-> Failed
//! ```
//!
//! Deletion always waits for every batch to settle and is always driven by
//! the full discovery set, never by the subset that made it into the store.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use vms_config::SyncConfig;
use vms_core::provider::{InventoryProvider, InventorySession};
use vms_core::store::{InventoryStore, StoreSession};
use vms_core::{
    BatchReport, BatchStage, DeleteSkipReason, FailureReason, IdentifierSet, ItemFailure,
    ProviderError, RunReport, RunState,
};

use crate::chunker::chunk;
use crate::error::SyncError;
use crate::worker::{BatchOutcome, BatchWorker, ItemLimits};

/// Tuning for one run, checked once up front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    pub batch_size: usize,
    pub workers: usize,
    pub limits: ItemLimits,
    /// Minimum discovered/stored ratio before orphans are deleted. 0 disables.
    pub min_discovery_ratio: f64,
}

impl RunSettings {
    /// Take the sync section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfiguration`] for any value the run
    /// cannot work with.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let settings = Self {
            batch_size: config.batch_size,
            workers: config.workers,
            limits: ItemLimits {
                fetch_timeout: config.fetch_timeout(),
                map_timeout: config.map_timeout(),
            },
            min_discovery_ratio: config.min_discovery_ratio,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfiguration`] naming the offending value.
    pub fn validate(&self) -> Result<(), SyncError> {
        let invalid = |msg: &str| Err(SyncError::InvalidConfiguration(msg.to_string()));
        if self.batch_size == 0 {
            return invalid("batch size must be at least 1");
        }
        if self.workers == 0 {
            return invalid("worker count must be at least 1");
        }
        if self.limits.fetch_timeout.is_zero() || self.limits.map_timeout.is_zero() {
            return invalid("item timeouts must be non-zero");
        }
        if !(0.0..=1.0).contains(&self.min_discovery_ratio) {
            return invalid("min discovery ratio must be within 0..=1");
        }
        Ok(())
    }
}

/// Drives one sync run for one scope.
pub struct Reconciler<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
    settings: RunSettings,
    scope: String,
}

impl<P, S> Reconciler<P, S>
where
    P: InventoryProvider,
    S: InventoryStore,
{
    /// Build a reconciler from the sync configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfiguration`] for bad tuning or an
    /// empty scope.
    pub fn new(
        provider: Arc<P>,
        store: Arc<S>,
        config: &SyncConfig,
        scope: impl Into<String>,
    ) -> Result<Self, SyncError> {
        Self::with_settings(provider, store, RunSettings::from_config(config)?, scope)
    }

    /// Build a reconciler from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfiguration`] for bad tuning or an
    /// empty scope.
    pub fn with_settings(
        provider: Arc<P>,
        store: Arc<S>,
        settings: RunSettings,
        scope: impl Into<String>,
    ) -> Result<Self, SyncError> {
        settings.validate()?;
        let scope = scope.into();
        if scope.trim().is_empty() {
            return Err(SyncError::InvalidConfiguration(
                "scope must not be empty".to_string(),
            ));
        }
        Ok(Self {
            provider,
            store,
            settings,
            scope,
        })
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Run once.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ProviderUnavailable`] if discovery fails; nothing is
    ///   written or deleted.
    /// - [`SyncError::PersistenceUnavailable`] if the store rejected every
    ///   batch that had records to write; the finished report is attached.
    ///   Batches lost to provider session failures do not count.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let started = Instant::now();
        let mut report = RunReport::new(&self.scope);
        tracing::info!(
            scope = %self.scope,
            batch_size = self.settings.batch_size,
            workers = self.settings.workers,
            "sync run started"
        );

        let identifiers = match self.discover().await {
            Ok(identifiers) => identifiers,
            Err(e) => {
                report.advance(RunState::Failed)?;
                tracing::error!(scope = %self.scope, error = %e, "discovery failed");
                return Err(SyncError::ProviderUnavailable(e));
            }
        };
        report.discovered = identifiers.len();
        tracing::info!(scope = %self.scope, discovered = identifiers.len(), "found identifiers");

        report.advance(RunState::Dispatching)?;
        let batches = chunk(identifiers.as_slice(), self.settings.batch_size)?;
        tracing::info!(scope = %self.scope, batches = batches.len(), "split identifiers into batches");

        let worker = Arc::new(BatchWorker::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.store),
            self.settings.limits,
            self.scope.clone(),
        ));
        let permits = Arc::new(Semaphore::new(self.settings.workers));
        let mut tasks = JoinSet::new();
        let mut pending = std::collections::HashMap::new();
        for batch in batches {
            let worker = Arc::clone(&worker);
            let permits = Arc::clone(&permits);
            let key = (batch.index, batch.identifiers.clone());
            let handle = tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return None;
                };
                Some(worker.process(batch).await)
            });
            pending.insert(handle.id(), key);
        }

        report.advance(RunState::Committing)?;
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (e.id(), None),
            };
            let Some((index, batch_ids)) = pending.remove(&id) else {
                continue;
            };
            let BatchOutcome { report: batch, failures } =
                outcome.unwrap_or_else(|| aborted_batch(index, &batch_ids));
            report.record_batch(batch, failures);
        }

        report.advance(RunState::ReconcilingDeletes)?;
        self.reconcile_deletes(&identifiers, &mut report).await;

        report.advance(RunState::Done)?;
        report.finish(started.elapsed());
        self.log_summary(&report);

        if report.persistence_unavailable() {
            tracing::error!(scope = %self.scope, "store rejected every batch");
            return Err(SyncError::PersistenceUnavailable(Box::new(report)));
        }
        Ok(report)
    }

    async fn discover(&self) -> Result<IdentifierSet, ProviderError> {
        let session = self.provider.open_session().await?;
        let listed = session.list_identifiers().await;
        session.close().await;

        let (identifiers, discarded) = IdentifierSet::from_discovered(listed?);
        if discarded > 0 {
            tracing::debug!(scope = %self.scope, discarded, "dropped blank or duplicate identifiers");
        }
        Ok(identifiers)
    }

    async fn reconcile_deletes(&self, identifiers: &IdentifierSet, report: &mut RunReport) {
        if let Some(reason) = skip_before_store(identifiers, report) {
            self.skip_delete(reason, report);
            return;
        }

        let session = match self.store.open_session().await {
            Ok(session) => session,
            Err(e) => {
                report.delete_error = Some(e.to_string());
                tracing::error!(scope = %self.scope, error = %e, "cannot open store for deletes");
                return;
            }
        };

        if self.settings.min_discovery_ratio > 0.0 {
            match session.count_scope(&self.scope).await {
                Ok(existing) => {
                    if let Some(reason) = below_ratio(
                        identifiers.len(),
                        existing,
                        self.settings.min_discovery_ratio,
                    ) {
                        self.skip_delete(reason, report);
                        return;
                    }
                }
                Err(e) => {
                    report.delete_error = Some(e.to_string());
                    tracing::error!(scope = %self.scope, error = %e, "cannot count stored rows");
                    return;
                }
            }
        }

        match session.delete_except(&self.scope, &identifiers.to_key_set()).await {
            Ok(deleted) => {
                report.deleted = deleted;
                tracing::info!(scope = %self.scope, deleted, "deleted VMs no longer present");
            }
            Err(e) => {
                report.delete_error = Some(e.to_string());
                tracing::error!(scope = %self.scope, error = %e, "delete of orphaned rows failed");
            }
        }
    }

    fn skip_delete(&self, reason: DeleteSkipReason, report: &mut RunReport) {
        tracing::warn!(scope = %self.scope, reason = %reason, "skipping delete of orphaned rows");
        report.delete_skipped = Some(reason);
    }

    fn log_summary(&self, report: &RunReport) {
        tracing::info!(
            scope = %self.scope,
            discovered = report.discovered,
            transformed = report.transformed,
            upserted = report.upserted,
            deleted = report.deleted,
            failures = report.failure_count(),
            failed_batches = report.failed_batches(),
            elapsed = %report.elapsed_hms(),
            "sync run complete"
        );
        tracing::info!(
            scope = %self.scope,
            seconds_per_vm = %format!("{:.2}", report.seconds_per_item()),
            "average time per VM"
        );
    }
}

/// Guards that need no store access.
fn skip_before_store(identifiers: &IdentifierSet, report: &RunReport) -> Option<DeleteSkipReason> {
    if identifiers.is_empty() {
        return Some(DeleteSkipReason::EmptyDiscovery);
    }
    if report.every_batch_failed() {
        return Some(DeleteSkipReason::NoBatchCommitted);
    }
    None
}

/// `Some` when `discovered` is suspiciously small next to what is stored.
fn below_ratio(discovered: usize, existing: usize, min_ratio: f64) -> Option<DeleteSkipReason> {
    if existing == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = discovered as f64 / existing as f64;
    (ratio < min_ratio).then_some(DeleteSkipReason::BelowSanityThreshold {
        discovered,
        existing,
        min_ratio,
    })
}

/// Outcome for a batch whose task never returned.
fn aborted_batch(index: usize, identifiers: &[String]) -> BatchOutcome {
    let message = "batch worker aborted".to_string();
    let failures: Vec<ItemFailure> = identifiers
        .iter()
        .map(|id| ItemFailure::new(id, FailureReason::FetchFailed(message.clone())))
        .collect();
    BatchOutcome {
        report: BatchReport {
            index,
            size: identifiers.len(),
            records: 0,
            failures: failures.len(),
            committed: 0,
            elapsed_secs: 0.0,
            error: Some(message),
            failed_at: Some(BatchStage::Aborted),
        },
        failures,
    }
}

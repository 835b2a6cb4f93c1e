//! One batch, start to finish: fetch, map, upsert.
//!
//! Each batch opens its own provider session and its own store session and
//! releases both before returning, whatever happened in between. Inside the
//! batch, every identifier is fetched concurrently; once all fetches have
//! settled, every fetched item is mapped concurrently on the blocking pool.
//! A failure for one identifier never stops the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use vms_core::provider::{InventoryProvider, InventorySession, RawItem};
use vms_core::store::{InventoryStore, StoreSession};
use vms_core::{
    Batch, BatchReport, BatchStage, FailureReason, ItemFailure, ProviderError, VmRecord,
};

/// Per-item time limits for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemLimits {
    pub fetch_timeout: Duration,
    pub map_timeout: Duration,
}

/// What one batch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub report: BatchReport,
    pub failures: Vec<ItemFailure>,
}

/// Runs batches against one provider and one store for one scope.
pub struct BatchWorker<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
    limits: ItemLimits,
    scope: String,
}

impl<P, S> BatchWorker<P, S>
where
    P: InventoryProvider,
    S: InventoryStore,
{
    pub fn new(provider: Arc<P>, store: Arc<S>, limits: ItemLimits, scope: impl Into<String>) -> Self {
        Self {
            provider,
            store,
            limits,
            scope: scope.into(),
        }
    }

    /// Fetch, map, and upsert one batch.
    ///
    /// Never fails: a batch that cannot open its provider session or cannot
    /// commit comes back with `report.error` set and one failure per
    /// identifier or record it could not handle.
    pub async fn process(&self, batch: Batch) -> BatchOutcome {
        let started = Instant::now();

        let (records, mut failures) = match self.transform(&batch).await {
            Ok(result) => result,
            Err(e) => {
                let reason = FailureReason::SessionUnavailable(e.to_string());
                let failures = batch
                    .identifiers
                    .iter()
                    .map(|id| ItemFailure::new(id, reason.clone()))
                    .collect();
                return self.finish(
                    &batch,
                    0,
                    0,
                    Some((BatchStage::Session, e.to_string())),
                    failures,
                    started,
                );
            }
        };

        let produced = records.len();
        match self.commit(&records).await {
            Ok(committed) => self.finish(&batch, produced, committed, None, failures, started),
            Err(e) => {
                let reason = FailureReason::PersistenceFailed(e.clone());
                failures.extend(records.iter().map(|r| ItemFailure::new(&r.vm_uuid, reason.clone())));
                self.finish(
                    &batch,
                    produced,
                    0,
                    Some((BatchStage::Persistence, e)),
                    failures,
                    started,
                )
            }
        }
    }

    /// Resolve every identifier in `batch` to a record.
    ///
    /// Returns the records in batch order plus one failure per identifier
    /// that was not found, failed, or timed out at either step.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` only if the provider session cannot be opened.
    pub async fn transform(
        &self,
        batch: &Batch,
    ) -> Result<(Vec<VmRecord>, Vec<ItemFailure>), ProviderError> {
        let session = Arc::new(self.provider.open_session().await?);

        let (fetched, mut failures) = self.fetch_all(&session, batch).await;
        let (mut records, map_failures) = self.map_all(&session, fetched).await;
        failures.extend(map_failures);

        session.close().await;

        for record in &mut records {
            record.scope.clone_from(&self.scope);
        }
        Ok((records, failures))
    }

    async fn fetch_all(
        &self,
        session: &Arc<P::Session>,
        batch: &Batch,
    ) -> (Vec<(usize, RawItem)>, Vec<ItemFailure>) {
        let mut tasks = JoinSet::new();
        let mut identifiers = HashMap::new();
        for (position, identifier) in batch.identifiers.iter().enumerate() {
            let session = Arc::clone(session);
            let id = identifier.clone();
            let limit = self.limits.fetch_timeout;
            let handle = tasks.spawn(async move {
                (position, tokio::time::timeout(limit, session.fetch_item(&id)).await)
            });
            identifiers.insert(handle.id(), identifier.clone());
        }

        let mut fetched = Vec::with_capacity(batch.len());
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task, (position, outcome))) => {
                    let id = identifiers.remove(&task).unwrap_or_default();
                    match outcome {
                        Ok(Ok(Some(raw))) => fetched.push((position, raw)),
                        Ok(Ok(None)) => failures.push(ItemFailure::new(id, FailureReason::NotFound)),
                        Ok(Err(e)) => failures.push(ItemFailure::new(
                            id,
                            FailureReason::FetchFailed(e.to_string()),
                        )),
                        Err(_) => failures.push(ItemFailure::new(id, FailureReason::FetchTimeout)),
                    }
                }
                Err(e) => {
                    let id = identifiers.remove(&e.id()).unwrap_or_default();
                    failures.push(ItemFailure::new(
                        id,
                        FailureReason::FetchFailed(format!("fetch task aborted: {e}")),
                    ));
                }
            }
        }
        (fetched, failures)
    }

    async fn map_all(
        &self,
        session: &Arc<P::Session>,
        fetched: Vec<(usize, RawItem)>,
    ) -> (Vec<VmRecord>, Vec<ItemFailure>) {
        let mut tasks = JoinSet::new();
        let mut identifiers = HashMap::new();
        for (position, raw) in fetched {
            let session = Arc::clone(session);
            let id = raw.identifier.clone();
            let limit = self.limits.map_timeout;
            // A timed-out map keeps its blocking thread until it returns; the
            // batch moves on without it.
            let handle = tasks.spawn(async move {
                let mapping = tokio::task::spawn_blocking(move || session.map_to_record(&raw));
                (position, tokio::time::timeout(limit, mapping).await)
            });
            identifiers.insert(handle.id(), id);
        }

        let mut records = Vec::with_capacity(identifiers.len());
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task, (position, outcome))) => {
                    let id = identifiers.remove(&task).unwrap_or_default();
                    match outcome {
                        Ok(Ok(Ok(record))) => records.push((position, record)),
                        Ok(Ok(Err(e))) => failures.push(ItemFailure::new(
                            id,
                            FailureReason::MapFailed(e.reason),
                        )),
                        Ok(Err(e)) => failures.push(ItemFailure::new(
                            id,
                            FailureReason::MapFailed(format!("map task aborted: {e}")),
                        )),
                        Err(_) => failures.push(ItemFailure::new(id, FailureReason::MapTimeout)),
                    }
                }
                Err(e) => {
                    let id = identifiers.remove(&e.id()).unwrap_or_default();
                    failures.push(ItemFailure::new(
                        id,
                        FailureReason::MapFailed(format!("map task aborted: {e}")),
                    ));
                }
            }
        }
        records.sort_by_key(|(position, _)| *position);
        (records.into_iter().map(|(_, record)| record).collect(), failures)
    }

    async fn commit(&self, records: &[VmRecord]) -> Result<usize, String> {
        if records.is_empty() {
            return Ok(0);
        }
        let session = self.store.open_session().await.map_err(|e| e.to_string())?;
        session.upsert(records).await.map_err(|e| e.to_string())
    }

    fn finish(
        &self,
        batch: &Batch,
        records: usize,
        committed: usize,
        batch_failure: Option<(BatchStage, String)>,
        failures: Vec<ItemFailure>,
        started: Instant,
    ) -> BatchOutcome {
        let elapsed_secs = started.elapsed().as_secs_f64();
        for failure in &failures {
            tracing::warn!(
                scope = %self.scope,
                batch = batch.index,
                identifier = %failure.identifier,
                reason = %failure.reason,
                "item not synced"
            );
        }
        let (failed_at, error) = batch_failure.unzip();
        match &error {
            None => tracing::info!(
                scope = %self.scope,
                batch = batch.index,
                records,
                failures = failures.len(),
                committed,
                elapsed_secs,
                "batch complete"
            ),
            Some(e) => tracing::error!(
                scope = %self.scope,
                batch = batch.index,
                stage = ?failed_at,
                error = %e,
                elapsed_secs,
                "batch failed"
            ),
        }
        BatchOutcome {
            report: BatchReport {
                index: batch.index,
                size: batch.len(),
                records,
                failures: failures.len(),
                committed,
                elapsed_secs,
                error,
                failed_at,
            },
            failures,
        }
    }
}

//! Run report: counters, timings, and failures for one sync run.
//!
//! A report is created when the run starts, filled in as batches complete,
//! and handed back to the caller when the run reaches `done`. It is never
//! persisted by the pipeline itself.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Lifecycle of a single reconciliation run.
///
/// ```text
/// discovering → dispatching → committing → reconciling_deletes → done
///             → failed
/// ```
///
/// Only discovery can fail the run. Later stages degrade it but still reach
/// `done` with non-zero failure counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Discovering,
    Dispatching,
    Committing,
    ReconcilingDeletes,
    Done,
    Failed,
}

impl RunState {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Discovering => &[Self::Dispatching, Self::Failed],
            Self::Dispatching => &[Self::Committing],
            Self::Committing => &[Self::ReconcilingDeletes],
            Self::ReconcilingDeletes => &[Self::Done],
            Self::Done | Self::Failed => &[],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Dispatching => "dispatching",
            Self::Committing => "committing",
            Self::ReconcilingDeletes => "reconciling_deletes",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Why an identifier did not make it into this run's upsert set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The item vanished between discovery and fetch.
    NotFound,
    /// The fetch did not answer within the configured timeout.
    FetchTimeout,
    FetchFailed(String),
    /// Mapping did not finish within the configured timeout.
    MapTimeout,
    MapFailed(String),
    /// The worker could not open a provider session for its batch.
    SessionUnavailable(String),
    /// The item was mapped but its batch could not be committed.
    PersistenceFailed(String),
}

impl FailureReason {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::FetchTimeout => "fetch_timeout",
            Self::FetchFailed(_) => "fetch_failed",
            Self::MapTimeout => "map_timeout",
            Self::MapFailed(_) => "map_failed",
            Self::SessionUnavailable(_) => "session_unavailable",
            Self::PersistenceFailed(_) => "persistence_failed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound | Self::FetchTimeout | Self::MapTimeout => f.write_str(self.kind()),
            Self::FetchFailed(detail)
            | Self::MapFailed(detail)
            | Self::SessionUnavailable(detail)
            | Self::PersistenceFailed(detail) => write!(f, "{}: {detail}", self.kind()),
        }
    }
}

/// One identifier that was left untouched in the store this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub identifier: String,
    pub reason: FailureReason,
}

impl ItemFailure {
    pub fn new(identifier: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            identifier: identifier.into(),
            reason,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchReport
// ---------------------------------------------------------------------------

/// Outcome of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub index: usize,
    /// Identifiers assigned to the batch.
    pub size: usize,
    /// Records produced by fetch + map.
    pub records: usize,
    /// Identifiers that failed fetch or map.
    pub failures: usize,
    /// Rows written by the upsert.
    pub committed: usize,
    pub elapsed_secs: f64,
    /// Set when the batch as a whole failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where the batch failed, alongside `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<BatchStage>,
}

impl BatchReport {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// True when the batch had records to write.
    #[must_use]
    pub const fn reached_commit(&self) -> bool {
        self.records > 0
    }

    #[must_use]
    pub fn failed_to_persist(&self) -> bool {
        self.failed_at == Some(BatchStage::Persistence)
    }
}

/// The step at which a whole batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    /// The provider session could not be opened.
    Session,
    /// The store could not be opened or the upsert failed.
    Persistence,
    /// The batch task never returned.
    Aborted,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::Persistence => "persistence",
            Self::Aborted => "aborted",
        })
    }
}

// ---------------------------------------------------------------------------
// DeleteSkipReason
// ---------------------------------------------------------------------------

/// Why the delete-orphans step was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeleteSkipReason {
    /// Discovery returned nothing; deleting would wipe the scope.
    EmptyDiscovery,
    /// Discovery found far fewer items than the store holds for the scope.
    BelowSanityThreshold {
        discovered: usize,
        existing: usize,
        min_ratio: f64,
    },
    /// No batch committed, so the store is most likely unreachable.
    NoBatchCommitted,
}

impl fmt::Display for DeleteSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDiscovery => f.write_str("discovery returned no identifiers"),
            Self::BelowSanityThreshold {
                discovered,
                existing,
                min_ratio,
            } => write!(
                f,
                "discovered {discovered} of {existing} stored items, below ratio {min_ratio}"
            ),
            Self::NoBatchCommitted => f.write_str("no batch committed"),
        }
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Counters and timings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub scope: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub discovered: usize,
    pub transformed: usize,
    pub upserted: usize,
    pub deleted: usize,
    pub elapsed_secs: f64,
    pub batches: Vec<BatchReport>,
    pub failed_items: Vec<ItemFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_skipped: Option<DeleteSkipReason>,
    /// Set when the delete step ran and failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_error: Option<String>,
}

impl RunReport {
    /// Start an empty report in the `discovering` state.
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            state: RunState::Discovering,
            started_at: Utc::now(),
            finished_at: None,
            discovered: 0,
            transformed: 0,
            upserted: 0,
            deleted: 0,
            elapsed_secs: 0.0,
            batches: Vec::new(),
            failed_items: Vec::new(),
            delete_skipped: None,
            delete_error: None,
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for a disallowed transition.
    pub fn advance(&mut self, next: RunState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::Validation(format!(
                "run state cannot move from {} to {next}",
                self.state
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Fold a completed batch into the totals.
    pub fn record_batch(&mut self, batch: BatchReport, failures: Vec<ItemFailure>) {
        self.transformed += batch.records;
        self.upserted += batch.committed;
        self.failed_items.extend(failures);
        self.batches.push(batch);
    }

    /// Stamp the finish time and elapsed duration.
    pub fn finish(&mut self, elapsed: Duration) {
        self.finished_at = Some(Utc::now());
        self.elapsed_secs = elapsed.as_secs_f64();
        self.batches.sort_by_key(|b| b.index);
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed_items.len()
    }

    #[must_use]
    pub fn failed_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.is_failed()).count()
    }

    /// True when batches ran and every one of them failed, for any reason.
    #[must_use]
    pub fn every_batch_failed(&self) -> bool {
        !self.batches.is_empty() && self.batches.iter().all(BatchReport::is_failed)
    }

    /// True when at least one batch had records to write and every such
    /// batch failed to persist them. Provider-side batch failures never count.
    #[must_use]
    pub fn persistence_unavailable(&self) -> bool {
        let mut attempted = self.batches.iter().filter(|b| b.reached_commit()).peekable();
        attempted.peek().is_some() && attempted.all(BatchReport::failed_to_persist)
    }

    /// Average wall-clock seconds per discovered item.
    #[must_use]
    pub fn seconds_per_item(&self) -> f64 {
        if self.discovered == 0 {
            0.0
        } else {
            self.elapsed_secs / self.discovered as f64
        }
    }

    /// Elapsed time as `HH:MM:SS`.
    #[must_use]
    pub fn elapsed_hms(&self) -> String {
        let total = self.elapsed_secs.max(0.0) as u64;
        format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        )
    }

    /// Process exit code for this report: 0 for a completed run, 2 when the
    /// store rejected every batch that had records to write.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.persistence_unavailable() { 2 } else { 0 }
    }
}

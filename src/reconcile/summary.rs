//! Per-item outcomes and the end-of-run summary

use super::plan::{PlannedUpdate, UpdateKind};
use crate::matcher::MatchWarning;
use catalog_types::SyncFlow;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    /// Planned but not sent (dry run)
    Skipped,
}

/// Result of one update call
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub kind: UpdateKind,
    pub key: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateOutcome {
    pub fn succeeded(update: &PlannedUpdate) -> Self {
        Self::new(update, OutcomeStatus::Succeeded, None)
    }

    pub fn failed(update: &PlannedUpdate, error: impl ToString) -> Self {
        Self::new(update, OutcomeStatus::Failed, Some(error.to_string()))
    }

    pub fn skipped(update: &PlannedUpdate) -> Self {
        Self::new(update, OutcomeStatus::Skipped, None)
    }

    fn new(update: &PlannedUpdate, status: OutcomeStatus, error: Option<String>) -> Self {
        Self {
            kind: update.kind(),
            key: update.key(),
            status,
            error,
        }
    }
}

/// Where a non-fatal failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// A per-table listing call; the table contributed no columns
    Fetch,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub stage: FailureStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<UpdateKind>,
    pub key: String,
    pub cause: String,
}

/// Counts and failures for one run
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub flow: SyncFlow,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tables_matched: usize,
    pub tables_unmatched: usize,
    pub columns_matched: usize,
    pub columns_unmatched: usize,
    pub updates_succeeded: usize,
    pub updates_failed: usize,
    pub updates_skipped: usize,
    pub warnings: Vec<MatchWarning>,
    pub failures: Vec<FailureRecord>,
    /// Every update outcome, in application order
    pub outcomes: Vec<UpdateOutcome>,
}

impl SyncSummary {
    pub fn new(flow: SyncFlow, dry_run: bool) -> Self {
        Self {
            flow,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            tables_matched: 0,
            tables_unmatched: 0,
            columns_matched: 0,
            columns_unmatched: 0,
            updates_succeeded: 0,
            updates_failed: 0,
            updates_skipped: 0,
            warnings: Vec::new(),
            failures: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn record_outcome(&mut self, outcome: UpdateOutcome) {
        match outcome.status {
            OutcomeStatus::Succeeded => self.updates_succeeded += 1,
            OutcomeStatus::Skipped => self.updates_skipped += 1,
            OutcomeStatus::Failed => {
                self.updates_failed += 1;
                self.failures.push(FailureRecord {
                    stage: FailureStage::Update,
                    kind: Some(outcome.kind),
                    key: outcome.key.clone(),
                    cause: outcome.error.clone().unwrap_or_default(),
                });
            }
        }
        self.outcomes.push(outcome);
    }

    pub fn record_fetch_failure(&mut self, key: impl Into<String>, cause: impl ToString) {
        self.failures.push(FailureRecord {
            stage: FailureStage::Fetch,
            kind: None,
            key: key.into(),
            cause: cause.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// 0 when nothing failed, 1 when any update or per-table fetch failed
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

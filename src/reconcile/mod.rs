//! Reconciliation
//!
//! Sequences fetch → match → apply for one flow and reports what happened.
//! Planning ([`plan`]) is pure; only [`ReconciliationDriver`] talks to the
//! catalogs.

pub mod driver;
pub mod plan;
pub mod summary;

pub use driver::ReconciliationDriver;
pub use plan::{build_description, PlannedUpdate, UpdateKind};
pub use summary::{FailureRecord, FailureStage, OutcomeStatus, SyncSummary, UpdateOutcome};

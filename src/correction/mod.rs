//! Debt correction workers
//!
//! The reconciliation worker and the strict correction service behind the
//! high-difficulty strategy.

pub mod collector;
pub mod strict;

pub use collector::{pick_candidate, InspectJob, ReconciliationWorker};
pub use strict::{
    ScoreComparator, StrictComparator, StrictCorrectionService, StrictOutcome, StrictRequest,
    StrictResult,
};

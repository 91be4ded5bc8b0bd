//! Backfill plumbing: the shared provider call budget and bulk progress

pub mod progress;
pub mod rate_limiter;

pub use progress::{
    BackfillStatus, BulkBackfillHandle, BulkBackfillProgress, BulkBackfillSummary, BulkSnapshot,
    ProgressTracker, SymbolError,
};
pub use rate_limiter::{CallBudget, CallPermit};

//! Bulk backfill progress tracking
//!
//! Each bulk run publishes a [`BulkSnapshot`] through a `watch` channel.
//! Callers hold a [`BulkBackfillHandle`] and may poll, subscribe, await the
//! final summary or simply drop the handle; the run continues either way.

use crate::coverage::{QualityMap, SymbolCoverage};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Status of one symbol in a bulk run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BackfillStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// pending -> processing -> {completed | error}
    pub fn can_transition_to(self, next: BackfillStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// One row per symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkBackfillProgress {
    pub symbol: String,
    pub status: BackfillStatus,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub prices_added: usize,
}

impl BulkBackfillProgress {
    fn pending(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: BackfillStatus::Pending,
            error: None,
            error_code: None,
            prices_added: 0,
        }
    }
}

/// Observable state of a bulk run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSnapshot {
    pub rows: Vec<BulkBackfillProgress>,
    /// Refreshed coverage per processed symbol
    pub coverage: BTreeMap<String, SymbolCoverage>,
    /// Refreshed quality map of the selected symbol, once it has been processed
    pub selected_quality_map: Option<QualityMap>,
    pub finished: bool,
}

impl BulkSnapshot {
    pub fn row(&self, symbol: &str) -> Option<&BulkBackfillProgress> {
        self.rows.iter().find(|r| r.symbol == symbol)
    }

    pub fn count(&self, status: BackfillStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// Every row has reached a terminal status
    pub fn all_terminal(&self) -> bool {
        self.rows.iter().all(|r| r.status.is_terminal())
    }
}

/// A failed symbol in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolError {
    pub symbol: String,
    pub code: String,
    pub message: String,
}

/// Final report of a bulk run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkBackfillSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub prices_added: usize,
    pub errors: Vec<SymbolError>,
}

impl BulkBackfillSummary {
    pub fn from_rows(rows: &[BulkBackfillProgress]) -> Self {
        let errors: Vec<SymbolError> = rows
            .iter()
            .filter(|r| r.status == BackfillStatus::Error)
            .map(|r| SymbolError {
                symbol: r.symbol.clone(),
                code: r.error_code.clone().unwrap_or_else(|| "INTERNAL_ERROR".to_string()),
                message: r.error.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            total: rows.len(),
            completed: rows.iter().filter(|r| r.status == BackfillStatus::Completed).count(),
            failed: errors.len(),
            prices_added: rows.iter().map(|r| r.prices_added).sum(),
            errors,
        }
    }

    /// e.g. "3 of 5 symbols failed: RATE_LIMIT for XYZ, PROVIDER_ERROR for ABC"
    pub fn message(&self) -> String {
        if self.failed == 0 {
            return format!(
                "{} of {} symbols backfilled, {} prices added",
                self.completed, self.total, self.prices_added
            );
        }

        let details = self
            .errors
            .iter()
            .map(|e| format!("{} for {}", e.code, e.symbol))
            .collect::<Vec<_>>()
            .join(", ");

        format!("{} of {} symbols failed: {}", self.failed, self.total, details)
    }
}

/// Writer side of a bulk run's progress
///
/// Dropping the tracker (normally or while unwinding) moves every
/// non-terminal row to `error`, so no row can stay stuck.
pub struct ProgressTracker {
    tx: watch::Sender<BulkSnapshot>,
}

impl ProgressTracker {
    pub fn new(symbols: &[String]) -> (Self, watch::Receiver<BulkSnapshot>) {
        let snapshot = BulkSnapshot {
            rows: symbols.iter().map(|s| BulkBackfillProgress::pending(s)).collect(),
            ..Default::default()
        };
        let (tx, rx) = watch::channel(snapshot);
        (Self { tx }, rx)
    }

    fn transition<F>(&self, symbol: &str, next: BackfillStatus, apply: F) -> bool
    where
        F: FnOnce(&mut BulkBackfillProgress),
    {
        let mut applied = false;
        self.tx.send_modify(|snapshot| {
            if let Some(row) = snapshot.rows.iter_mut().find(|r| r.symbol == symbol) {
                if row.status.can_transition_to(next) {
                    row.status = next;
                    apply(row);
                    applied = true;
                }
            }
        });

        if applied {
            tracing::debug!("Bulk row {} -> {}", symbol, next.as_str());
        } else {
            tracing::warn!("Rejected bulk row transition {} -> {}", symbol, next.as_str());
        }
        applied
    }

    pub fn start(&self, symbol: &str) -> bool {
        self.transition(symbol, BackfillStatus::Processing, |_| {})
    }

    pub fn complete(&self, symbol: &str, prices_added: usize) -> bool {
        self.transition(symbol, BackfillStatus::Completed, |row| {
            row.prices_added = prices_added;
        })
    }

    pub fn fail(&self, symbol: &str, error: &AppError) -> bool {
        let message = error.to_string();
        let code = error.code().to_string();
        self.transition(symbol, BackfillStatus::Error, |row| {
            row.error = Some(message);
            row.error_code = Some(code);
        })
    }

    pub fn set_coverage(&self, coverage: SymbolCoverage) {
        self.tx.send_modify(|snapshot| {
            snapshot.coverage.insert(coverage.symbol.clone(), coverage);
        });
    }

    pub fn set_selected_quality_map(&self, map: QualityMap) {
        self.tx.send_modify(|snapshot| snapshot.selected_quality_map = Some(map));
    }

    pub fn snapshot(&self) -> BulkSnapshot {
        self.tx.borrow().clone()
    }

    /// Mark the run finished and build its summary
    pub fn finish(self) -> BulkBackfillSummary {
        self.seal();
        let rows = self.tx.borrow().rows.clone();
        BulkBackfillSummary::from_rows(&rows)
    }

    fn seal(&self) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.finished {
                return false;
            }
            for row in snapshot.rows.iter_mut().filter(|r| !r.status.is_terminal()) {
                tracing::warn!("Bulk row {} aborted while {}", row.symbol, row.status.as_str());
                row.status = BackfillStatus::Error;
                row.error = Some("backfill aborted".to_string());
                row.error_code = Some("INTERNAL_ERROR".to_string());
            }
            snapshot.finished = true;
            true
        });
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.seal();
    }
}

/// Caller side of a spawned bulk run
pub struct BulkBackfillHandle {
    id: Uuid,
    progress: watch::Receiver<BulkSnapshot>,
    task: JoinHandle<BulkBackfillSummary>,
}

impl BulkBackfillHandle {
    pub fn new(
        progress: watch::Receiver<BulkSnapshot>,
        task: JoinHandle<BulkBackfillSummary>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            progress,
            task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current progress
    pub fn snapshot(&self) -> BulkSnapshot {
        self.progress.borrow().clone()
    }

    /// An independent progress receiver
    pub fn subscribe(&self) -> watch::Receiver<BulkSnapshot> {
        self.progress.clone()
    }

    /// Wait for the next progress update; false once the run has ended
    pub async fn changed(&mut self) -> bool {
        self.progress.changed().await.is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end
    pub async fn finish(self) -> Result<BulkBackfillSummary> {
        match self.task.await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::error!("Bulk backfill {} ended abnormally: {}", self.id, e);
                let snapshot = self.progress.borrow().clone();
                if snapshot.finished {
                    Ok(BulkBackfillSummary::from_rows(&snapshot.rows))
                } else {
                    Err(AppError::Internal(format!("bulk backfill task failed: {}", e)))
                }
            }
        }
    }
}

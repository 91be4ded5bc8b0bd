//! Services Layer
//!
//! Business logic shared by the command layer and the CLI.
//!
//! # Architecture
//!
//! ```text
//! Presentation --> Commands ──┐
//!                             ├──> Services --> Provider / Stores
//! CLI ────────────────────────┘
//! ```
//!
//! # Services
//!
//! - `HistoryService` - Fetch daily closes and persist them
//! - `CoverageService` - Quality maps, coverage listings, source filtering
//! - `BackfillService` - Single date, range, gap and bulk backfill

pub mod backfill_service;
pub mod coverage_service;
pub mod history_service;

use crate::error::{AppError, Result};

pub use backfill_service::{BackfillOutcome, BackfillService, BulkBackfillRequest};
pub use coverage_service::CoverageService;
pub use history_service::{FetchOutcome, FetchReport, HistoryService};

/// Canonical ticker form: trimmed, upper case
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::Validation("Symbol must not be empty".to_string()));
    }
    Ok(symbol)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::calendar::is_business_day;
    use crate::db::sqlite::UpdateBackfillSettings;
    use crate::error::{AppError, Result};
    use crate::providers::{DailyClose, PriceProvider, ProviderRegistry};
    use crate::state::AppState;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Start and end of one provider call
    #[derive(Debug, Clone)]
    pub struct CallSpan {
        pub symbol: String,
        pub started: Instant,
        pub finished: Instant,
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Provider returning a close for every business day of the request
    #[derive(Default)]
    pub struct FakeProvider {
        failing: HashSet<String>,
        rate_limited: HashSet<String>,
        skipped: HashSet<NaiveDate>,
        padding_days: i64,
        latency: Duration,
        calls: Arc<Mutex<Vec<String>>>,
        spans: Arc<Mutex<Vec<CallSpan>>>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(mut self, symbol: &str) -> Self {
            self.failing.insert(symbol.to_string());
            self
        }

        pub fn rate_limited(mut self, symbol: &str) -> Self {
            self.rate_limited.insert(symbol.to_string());
            self
        }

        /// Never return a close for `date`
        pub fn skipping(mut self, date: NaiveDate) -> Self {
            self.skipped.insert(date);
            self
        }

        /// Also return closes this many days outside the request
        pub fn with_padding(mut self, days: i64) -> Self {
            self.padding_days = days;
            self
        }

        /// Each call takes this long
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Symbols requested so far, in call order
        pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
            self.calls.clone()
        }

        /// Timing of every call, in call order
        pub fn span_log(&self) -> Arc<Mutex<Vec<CallSpan>>> {
            self.spans.clone()
        }
    }

    #[async_trait]
    impl PriceProvider for FakeProvider {
        fn id(&self) -> &'static str {
            "fake"
        }

        fn name(&self) -> &'static str {
            "Fake Provider"
        }

        async fn fetch_daily_closes(
            &self,
            symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyClose>> {
            self.calls.lock().push(symbol.to_string());
            let started = Instant::now();
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.spans.lock().push(CallSpan {
                symbol: symbol.to_string(),
                started,
                finished: Instant::now(),
            });

            if self.failing.contains(symbol) {
                return Err(AppError::Provider(format!("unknown symbol {}", symbol)));
            }
            if self.rate_limited.contains(symbol) {
                return Err(AppError::RateLimit("provider quota reached".to_string()));
            }

            let from = start - chrono::Duration::days(self.padding_days);
            let to = end + chrono::Duration::days(self.padding_days);
            Ok(from
                .iter_days()
                .take_while(|d| *d <= to)
                .filter(|d| is_business_day(*d) && !self.skipped.contains(d))
                .enumerate()
                .map(|(i, date)| DailyClose {
                    date,
                    close: 100.0 + i as f64,
                })
                .collect())
        }
    }

    /// In-memory state with `provider` as the default and no call spacing
    pub fn test_state(provider: FakeProvider) -> Arc<AppState> {
        test_state_with_delay(provider, 0)
    }

    pub fn test_state_with_delay(provider: FakeProvider, inter_call_delay_ms: u64) -> Arc<AppState> {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(provider));

        let state = AppState::in_memory(registry).unwrap();
        let settings = state
            .sqlite
            .update_backfill_settings(&UpdateBackfillSettings {
                default_provider: Some("fake".to_string()),
                inter_call_delay_ms: Some(inter_call_delay_ms),
                ..Default::default()
            })
            .unwrap();
        state.apply_settings(settings).unwrap();

        Arc::new(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" brk.b ").unwrap(), "BRK.B");
        assert!(normalize_symbol("   ").is_err());
    }
}

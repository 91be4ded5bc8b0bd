//! History Service
//!
//! Fetches daily closes from the configured provider and persists them in
//! the observation store. Every provider call goes through the shared call
//! budget.

use crate::db::Observation;
use crate::error::{ensure_range, AppError, Result};
use crate::services::normalize_symbol;
use crate::state::AppState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Result of fetching one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub symbol: String,
    pub provider: String,
    /// Closes the provider returned inside the range
    pub prices_received: usize,
    pub prices_added: usize,
    pub prices_updated: usize,
    /// Business days in the range still without an observation
    pub still_missing: Vec<NaiveDate>,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        !self.still_missing.is_empty()
    }

    /// Human-readable note for a partially filled range
    pub fn partial_error(&self) -> Option<String> {
        let first = self.still_missing.first()?;
        Some(format!(
            "{}: {} business day(s) still missing after fetch (first {})",
            self.symbol,
            self.still_missing.len(),
            first
        ))
    }
}

/// Result of fetching a list of symbols
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Every provider call succeeded (gaps may remain, see `errors`)
    pub success: bool,
    pub prices_added: usize,
    pub prices_updated: usize,
    /// Failed symbols and partially filled ranges
    pub errors: Vec<String>,
    pub outcomes: Vec<FetchOutcome>,
}

/// History service for business logic
pub struct HistoryService;

impl HistoryService {
    /// Fetch `[start, end]` for each symbol in order
    ///
    /// Provider failures are recorded per symbol and never abort the list.
    /// Only an invalid range fails the whole call.
    pub async fn fetch_range(
        state: &AppState,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchReport> {
        ensure_range(start, end)?;
        info!(
            "HistoryService::fetch_range - {} symbol(s) {} to {}",
            symbols.len(),
            start,
            end
        );

        let mut report = FetchReport {
            success: true,
            ..Default::default()
        };

        for symbol in symbols {
            match Self::fetch_symbol(state, symbol, start, end).await {
                Ok(outcome) => {
                    report.prices_added += outcome.prices_added;
                    report.prices_updated += outcome.prices_updated;
                    if let Some(note) = outcome.partial_error() {
                        report.errors.push(note);
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    warn!("Fetch failed for {}: {}", symbol, e);
                    report.success = false;
                    report.errors.push(format!("{}: {}", symbol, e));
                }
            }
        }

        Ok(report)
    }

    /// Fetch and store `[start, end]` for one symbol
    pub async fn fetch_symbol(
        state: &AppState,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome> {
        ensure_range(start, end)?;
        let provider = state.default_provider()?;

        // Held through the write so one symbol is never written concurrently
        let permit = state.budget.acquire().await?;
        info!(
            "Fetching {} from {} ({} to {}, {} calls left today)",
            symbol,
            provider.name(),
            start,
            end,
            state.budget.remaining()
        );

        let closes = provider.fetch_daily_closes(symbol, start, end).await?;

        // Last value wins for duplicate dates
        let in_range: BTreeMap<NaiveDate, f64> = closes
            .into_iter()
            .filter(|c| c.date >= start && c.date <= end)
            .filter(|c| c.close.is_finite())
            .map(|c| (c.date, c.close))
            .collect();

        let observations: Vec<Observation> = in_range
            .into_iter()
            .map(|(date, close)| Observation {
                date,
                close,
                source: Some(provider.id().to_string()),
            })
            .collect();

        let summary = state.store.upsert(symbol, &observations).await?;
        drop(permit);

        // Re-read rather than trusting what was written
        let stored = state.store.query(symbol, start, end).await?;
        let stored_dates: HashSet<NaiveDate> = stored.iter().map(|o| o.date).collect();
        let calendar = state.calendar();
        let still_missing: Vec<NaiveDate> = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| calendar.is_business_day(*d) && !stored_dates.contains(d))
            .collect();

        if observations.is_empty() && !still_missing.is_empty() {
            warn!("{} returned no closes for {} ({} to {})", provider.name(), symbol, start, end);
        }

        info!(
            "Stored {} for {}: {} added, {} updated, {} still missing",
            symbol,
            provider.id(),
            summary.inserted,
            summary.updated,
            still_missing.len()
        );

        Ok(FetchOutcome {
            symbol: symbol.to_string(),
            provider: provider.id().to_string(),
            prices_received: observations.len(),
            prices_added: summary.inserted,
            prices_updated: summary.updated,
            still_missing,
        })
    }

    /// Record a manual close (e.g. a price typed in from a statement)
    pub async fn record_manual_close(
        state: &AppState,
        symbol: &str,
        date: NaiveDate,
        close: f64,
    ) -> Result<bool> {
        if !close.is_finite() || close < 0.0 {
            return Err(AppError::Validation(format!("Invalid close price: {}", close)));
        }
        let symbol = normalize_symbol(symbol)?;

        let summary = state
            .store
            .upsert(
                &symbol,
                &[Observation {
                    date,
                    close,
                    source: Some("manual".to_string()),
                }],
            )
            .await?;

        info!("Manual close for {} on {}: {}", symbol, date, close);
        Ok(summary.inserted == 1)
    }
}

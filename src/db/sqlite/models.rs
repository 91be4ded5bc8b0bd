//! SQLite database models

use serde::{Deserialize, Serialize};

/// Backfill policy (single settings row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillSettings {
    /// Provider calls allowed per UTC day
    pub daily_call_budget: u32,
    /// Minimum spacing between two provider calls
    pub inter_call_delay_ms: u64,
    /// Analysis window length for symbols without a first trade date
    pub fallback_window_days: u32,
    pub include_good_friday: bool,
    pub keep_expected_gaps_when_filtering: bool,
    pub default_provider: String,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            daily_call_budget: 25,
            inter_call_delay_ms: 1000,
            fallback_window_days: 90,
            include_good_friday: false,
            keep_expected_gaps_when_filtering: false,
            default_provider: "alpha_vantage".to_string(),
        }
    }
}

/// Partial update of [`BackfillSettings`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBackfillSettings {
    pub daily_call_budget: Option<u32>,
    pub inter_call_delay_ms: Option<u64>,
    pub fallback_window_days: Option<u32>,
    pub include_good_friday: Option<bool>,
    pub keep_expected_gaps_when_filtering: Option<bool>,
    pub default_provider: Option<String>,
}

/// Ad-hoc market closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketClosure {
    pub id: i64,
    pub date: String,
    pub description: Option<String>,
    pub year: i32,
}

/// Create request for a market closure
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClosureRequest {
    pub date: String,
    pub description: Option<String>,
}

/// Symbol selected for coverage tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSymbol {
    pub symbol: String,
    pub name: String,
    /// First transaction date, start of the analysis window
    pub first_trade_date: Option<String>,
}

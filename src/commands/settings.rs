//! Settings management commands

use crate::db::sqlite::{BackfillSettings, UpdateBackfillSettings};
use crate::error::Result;
use crate::state::AppState;
use serde::Serialize;

/// Get current backfill settings
pub async fn get_backfill_settings(state: &AppState) -> Result<BackfillSettings> {
    Ok(state.settings())
}

/// Update backfill settings and apply them to the running budget and calendar
pub async fn update_backfill_settings(
    state: &AppState,
    request: UpdateBackfillSettings,
) -> Result<BackfillSettings> {
    let settings = state.sqlite.update_backfill_settings(&request)?;
    state.apply_settings(settings.clone())?;
    tracing::info!(
        "Backfill settings applied: {} calls/day, {}ms spacing",
        settings.daily_call_budget,
        settings.inter_call_delay_ms
    );
    Ok(settings)
}

#[derive(Debug, Serialize)]
pub struct BudgetStatus {
    pub daily_limit: u32,
    pub remaining_today: u32,
    pub inter_call_delay_ms: u64,
    pub default_provider: String,
    pub providers: Vec<String>,
}

/// Provider call budget status
pub async fn get_budget_status(state: &AppState) -> Result<BudgetStatus> {
    let settings = state.settings();
    Ok(BudgetStatus {
        daily_limit: state.budget.daily_limit(),
        remaining_today: state.budget.remaining(),
        inter_call_delay_ms: settings.inter_call_delay_ms,
        default_provider: settings.default_provider,
        providers: state.providers.ids(),
    })
}

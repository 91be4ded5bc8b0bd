//! Market calendar and closure commands

use crate::calendar::Closure;
use crate::commands::parse_date;
use crate::db::sqlite::{CreateClosureRequest, MarketClosure};
use crate::error::{AppError, Result};
use crate::state::AppState;
use serde::Serialize;

// ============================================================================
// Closure Commands
// ============================================================================

/// Record an ad-hoc market closure
pub async fn create_market_closure(
    state: &AppState,
    request: CreateClosureRequest,
) -> Result<MarketClosure> {
    tracing::info!("Creating market closure: {}", request.date);
    let closure = state.sqlite.create_market_closure(&request)?;
    state.refresh_calendar()?;
    Ok(closure)
}

/// List market closures, optionally for one year
pub async fn get_market_closures(state: &AppState, year: Option<i32>) -> Result<Vec<MarketClosure>> {
    state.sqlite.get_market_closures(year)
}

#[derive(Debug, Serialize)]
pub struct DeleteClosureResponse {
    pub success: bool,
    pub id: i64,
}

/// Delete a market closure
pub async fn delete_market_closure(state: &AppState, id: i64) -> Result<DeleteClosureResponse> {
    if !state.sqlite.delete_market_closure(id)? {
        return Err(AppError::NotFound(format!("Market closure {} not found", id)));
    }
    state.refresh_calendar()?;
    Ok(DeleteClosureResponse { success: true, id })
}

// ============================================================================
// Calendar Commands
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HolidayEntry {
    pub date: String,
    pub weekday: String,
    pub closure: Closure,
}

/// Weekday closures of a year under the current calendar policy
pub async fn get_holidays(state: &AppState, year: i32) -> Result<Vec<HolidayEntry>> {
    Ok(state
        .calendar()
        .closures_in_year(year)
        .into_iter()
        .map(|(date, closure)| HolidayEntry {
            date: date.to_string(),
            weekday: date.format("%A").to_string(),
            closure,
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct TradingDayResponse {
    pub date: String,
    pub is_business_day: bool,
    pub closure: Option<Closure>,
}

/// Check whether the market trades on a date
pub async fn check_trading_day(state: &AppState, date: String) -> Result<TradingDayResponse> {
    let day = parse_date(&date)?;
    let closure = state.calendar().closure(day);
    Ok(TradingDayResponse {
        date: day.to_string(),
        is_business_day: closure.is_none(),
        closure,
    })
}

//! Tracked symbol commands

use crate::commands::parse_optional_date;
use crate::db::sqlite::TrackedSymbol;
use crate::db::CatalogEntry;
use crate::error::{AppError, Result};
use crate::services::normalize_symbol;
use crate::state::AppState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TrackSymbolRequest {
    pub symbol: String,
    pub name: Option<String>,
    /// First transaction date, start of the analysis window
    pub first_trade_date: Option<String>,
}

/// Track a symbol (or update its name / first trade date)
pub async fn track_symbol(state: &AppState, request: TrackSymbolRequest) -> Result<TrackedSymbol> {
    let symbol = normalize_symbol(&request.symbol)?;
    let first_trade_date = parse_optional_date(request.first_trade_date.as_deref())?;

    let tracked = TrackedSymbol {
        name: request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.clone()),
        symbol,
        first_trade_date: first_trade_date.map(|d| d.to_string()),
    };

    state.sqlite.upsert_tracked_symbol(&tracked)?;
    Ok(tracked)
}

/// All tracked symbols
pub async fn list_tracked_symbols(state: &AppState) -> Result<Vec<TrackedSymbol>> {
    state.sqlite.list_tracked_symbols()
}

/// Extent of stored history per symbol, tracked or not
pub async fn get_history_catalog(state: &AppState) -> Result<Vec<CatalogEntry>> {
    state.store.catalog().await
}

#[derive(Debug, Serialize)]
pub struct UntrackSymbolResponse {
    pub success: bool,
    pub symbol: String,
}

/// Stop tracking a symbol; stored prices are kept
pub async fn untrack_symbol(state: &AppState, symbol: String) -> Result<UntrackSymbolResponse> {
    let symbol = normalize_symbol(&symbol)?;
    if !state.sqlite.remove_tracked_symbol(&symbol)? {
        return Err(AppError::NotFound(format!("Symbol {} is not tracked", symbol)));
    }
    Ok(UntrackSymbolResponse {
        success: true,
        symbol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{test_state, FakeProvider};

    #[tokio::test]
    async fn test_track_and_untrack() {
        let state = test_state(FakeProvider::new());

        let tracked = track_symbol(
            &state,
            TrackSymbolRequest {
                symbol: " vti ".to_string(),
                name: None,
                first_trade_date: Some("2023-05-02".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(tracked.symbol, "VTI");
        assert_eq!(tracked.name, "VTI");

        assert_eq!(list_tracked_symbols(&state).await.unwrap().len(), 1);
        assert!(get_history_catalog(&state).await.unwrap().is_empty());
        assert!(untrack_symbol(&state, "VTI".to_string()).await.unwrap().success);

        let err = untrack_symbol(&state, "VTI".to_string()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_bad_first_trade_date() {
        let state = test_state(FakeProvider::new());
        let err = track_symbol(
            &state,
            TrackSymbolRequest {
                symbol: "VTI".to_string(),
                name: None,
                first_trade_date: Some("2023-02-30".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}

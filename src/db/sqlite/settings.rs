//! Backfill settings management

use crate::db::sqlite::models::{BackfillSettings, UpdateBackfillSettings};
use crate::error::{AppError, Result};
use rusqlite::Connection;

/// Longest fallback analysis window, about a century
pub const MAX_FALLBACK_WINDOW_DAYS: u32 = 36_500;

/// Get backfill settings
pub fn get_settings(conn: &Connection) -> Result<BackfillSettings> {
    let settings = conn.query_row(
        "SELECT daily_call_budget, inter_call_delay_ms, fallback_window_days,
                include_good_friday, keep_expected_gaps_when_filtering, default_provider
         FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(BackfillSettings {
                daily_call_budget: row.get(0)?,
                inter_call_delay_ms: row.get::<_, i64>(1)?.max(0) as u64,
                fallback_window_days: row.get(2)?,
                include_good_friday: row.get::<_, i32>(3)? == 1,
                keep_expected_gaps_when_filtering: row.get::<_, i32>(4)? == 1,
                default_provider: row.get(5)?,
            })
        },
    )?;

    Ok(settings)
}

/// Update backfill settings (only the provided fields)
pub fn update_settings(conn: &Connection, req: &UpdateBackfillSettings) -> Result<BackfillSettings> {
    validate(req)?;

    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(b) = req.daily_call_budget {
        updates.push("daily_call_budget = ?");
        params.push(Box::new(b));
    }
    if let Some(d) = req.inter_call_delay_ms {
        updates.push("inter_call_delay_ms = ?");
        params.push(Box::new(i64::try_from(d).unwrap_or(i64::MAX)));
    }
    if let Some(w) = req.fallback_window_days {
        updates.push("fallback_window_days = ?");
        params.push(Box::new(w));
    }
    if let Some(g) = req.include_good_friday {
        updates.push("include_good_friday = ?");
        params.push(Box::new(g as i32));
    }
    if let Some(k) = req.keep_expected_gaps_when_filtering {
        updates.push("keep_expected_gaps_when_filtering = ?");
        params.push(Box::new(k as i32));
    }
    if let Some(ref p) = req.default_provider {
        updates.push("default_provider = ?");
        params.push(Box::new(p.clone()));
    }

    if !updates.is_empty() {
        updates.push("updated_at = datetime('now')");

        let sql = format!("UPDATE settings SET {} WHERE id = 1", updates.join(", "));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;
        tracing::info!("Updated backfill settings");
    }

    get_settings(conn)
}

fn validate(req: &UpdateBackfillSettings) -> Result<()> {
    if req.daily_call_budget == Some(0) {
        return Err(AppError::Validation(
            "daily_call_budget must be at least 1".to_string(),
        ));
    }
    if let Some(days) = req.fallback_window_days {
        if days == 0 || days > MAX_FALLBACK_WINDOW_DAYS {
            return Err(AppError::Validation(format!(
                "fallback_window_days must be between 1 and {}",
                MAX_FALLBACK_WINDOW_DAYS
            )));
        }
    }
    if matches!(req.default_provider.as_deref(), Some(p) if p.trim().is_empty()) {
        return Err(AppError::Validation(
            "default_provider must not be empty".to_string(),
        ));
    }
    Ok(())
}

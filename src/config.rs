//! Process configuration from the environment
//!
//! Runtime policy (call budget, delays, calendar options) lives in the
//! SQLite settings table instead; see [`crate::db::sqlite::BackfillSettings`].

use crate::error::{AppError, Result};
use std::env;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "./historify-data";

/// Environment-derived configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding `historify.db` and `historify.duckdb`
    pub data_dir: PathBuf,
    /// Alpha Vantage key; the provider is not registered without one
    pub alpha_vantage_api_key: Option<String>,
    pub alpha_vantage_base_url: Option<String>,
}

impl AppConfig {
    /// Load from environment variables, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = non_empty("HISTORIFY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let alpha_vantage_base_url = non_empty("ALPHA_VANTAGE_BASE_URL");
        if let Some(url) = &alpha_vantage_base_url {
            url::Url::parse(url).map_err(|e| {
                AppError::Config(format!("ALPHA_VANTAGE_BASE_URL is not a valid URL: {}", e))
            })?;
        }

        Ok(Self {
            data_dir,
            alpha_vantage_api_key: non_empty("ALPHA_VANTAGE_API_KEY"),
            alpha_vantage_base_url,
        })
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("historify.db")
    }

    pub fn duckdb_path(&self) -> PathBuf {
        self.data_dir.join("historify.duckdb")
    }
}

//! Application state management

use crate::backfill::CallBudget;
use crate::calendar::MarketCalendar;
use crate::config::AppConfig;
use crate::db::duckdb::DuckDb;
use crate::db::memory::MemoryStore;
use crate::db::sqlite::{BackfillSettings, SqliteDb};
use crate::db::ObservationStore;
use crate::error::{AppError, Result};
use crate::providers::alpha_vantage::AlphaVantageProvider;
use crate::providers::{PriceProvider, ProviderRegistry};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all services
pub struct AppState {
    /// SQLite database connection (settings, closures, tracked symbols)
    pub sqlite: Arc<SqliteDb>,

    /// Observation store for price history
    pub store: Arc<dyn ObservationStore>,

    /// Provider registry
    pub providers: Arc<ProviderRegistry>,

    /// Process-wide provider call budget
    pub budget: Arc<CallBudget>,

    /// Calendar built from settings and recorded closures
    calendar: RwLock<MarketCalendar>,

    /// Cached copy of the persisted settings
    settings: RwLock<BackfillSettings>,

    /// Application data directory (None for in-memory state)
    pub data_dir: Option<PathBuf>,
}

impl AppState {
    /// Create application state backed by files under the configured data directory
    pub fn new(config: &AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        tracing::info!("Data directory: {:?}", config.data_dir);

        let sqlite = Arc::new(SqliteDb::new(&config.sqlite_path())?);
        let store: Arc<dyn ObservationStore> = Arc::new(DuckDb::new(&config.duckdb_path())?);

        let mut providers = ProviderRegistry::new();
        match &config.alpha_vantage_api_key {
            Some(key) => {
                let provider = match &config.alpha_vantage_base_url {
                    Some(url) => AlphaVantageProvider::with_base_url(key.clone(), url.clone())?,
                    None => AlphaVantageProvider::new(key.clone())?,
                };
                providers.register(Arc::new(provider));
            }
            None => tracing::warn!("ALPHA_VANTAGE_API_KEY not set, backfill is unavailable"),
        }

        let mut state = Self::from_parts(sqlite, store, providers)?;
        state.data_dir = Some(config.data_dir.clone());
        Ok(state)
    }

    /// Transient state: in-memory SQLite and observation store
    pub fn in_memory(providers: ProviderRegistry) -> Result<Self> {
        let sqlite = Arc::new(SqliteDb::open_in_memory()?);
        Self::from_parts(sqlite, Arc::new(MemoryStore::new()), providers)
    }

    /// Assemble state from already-open stores
    pub fn from_parts(
        sqlite: Arc<SqliteDb>,
        store: Arc<dyn ObservationStore>,
        providers: ProviderRegistry,
    ) -> Result<Self> {
        let settings = sqlite.get_backfill_settings()?;
        let calendar = MarketCalendar::new()
            .with_good_friday(settings.include_good_friday)
            .with_closures(sqlite.get_market_closure_dates()?);
        let budget = CallBudget::new(
            settings.daily_call_budget,
            Duration::from_millis(settings.inter_call_delay_ms),
        );

        tracing::info!(
            "Providers: [{}], budget {} calls/day",
            providers.ids().join(", "),
            settings.daily_call_budget
        );

        Ok(Self {
            sqlite,
            store,
            providers: Arc::new(providers),
            budget: Arc::new(budget),
            calendar: RwLock::new(calendar),
            settings: RwLock::new(settings),
            data_dir: None,
        })
    }

    /// Current backfill settings
    pub fn settings(&self) -> BackfillSettings {
        self.settings.read().clone()
    }

    /// Current market calendar
    pub fn calendar(&self) -> MarketCalendar {
        self.calendar.read().clone()
    }

    /// Apply freshly persisted settings to the budget and calendar
    pub fn apply_settings(&self, settings: BackfillSettings) -> Result<()> {
        self.budget.update_config(
            settings.daily_call_budget,
            Duration::from_millis(settings.inter_call_delay_ms),
        );
        *self.settings.write() = settings;
        self.refresh_calendar()
    }

    /// Rebuild the calendar after closures or settings change
    pub fn refresh_calendar(&self) -> Result<()> {
        let include_good_friday = self.settings.read().include_good_friday;
        let calendar = MarketCalendar::new()
            .with_good_friday(include_good_friday)
            .with_closures(self.sqlite.get_market_closure_dates()?);
        *self.calendar.write() = calendar;
        Ok(())
    }

    /// Provider named by the `default_provider` setting
    pub fn default_provider(&self) -> Result<Arc<dyn PriceProvider>> {
        let id = self.settings.read().default_provider.clone();
        self.providers.get(&id).ok_or_else(|| {
            AppError::Config(format!(
                "Provider '{}' is not available (registered: [{}])",
                id,
                self.providers.ids().join(", ")
            ))
        })
    }
}

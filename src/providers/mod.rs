//! Historical price provider adapters

pub mod alpha_vantage;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One daily close returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Provider trait that all price sources must implement
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider ID, also stored as the observation source tag
    fn id(&self) -> &'static str;

    /// Provider display name
    fn name(&self) -> &'static str;

    /// Daily closes of `symbol`
    ///
    /// May return dates outside `[start, end]`; callers trim.
    async fn fetch_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyClose>>;
}

/// Provider registry keyed by provider ID
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn PriceProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any with the same ID
    pub fn register(&mut self, provider: Arc<dyn PriceProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Get provider by ID
    pub fn get(&self, id: &str) -> Option<Arc<dyn PriceProvider>> {
        self.providers.get(id).cloned()
    }

    /// IDs of all registered providers, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}

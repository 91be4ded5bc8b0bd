//! In-process observation store

use super::{CatalogEntry, Observation, ObservationStore, UpsertSummary};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Observation store kept in memory (symbol -> date -> observation)
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: DashMap<String, BTreeMap<NaiveDate, Observation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored observations for a symbol
    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.is_empty())
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn query(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Observation>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .series
            .get(symbol)
            .map(|s| s.range(start..=end).map(|(_, o)| o.clone()).collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, symbol: &str, observations: &[Observation]) -> Result<UpsertSummary> {
        let mut series = self.series.entry(symbol.to_string()).or_default();
        let mut summary = UpsertSummary::default();
        for obs in observations {
            if series.insert(obs.date, obs.clone()).is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }
        Ok(summary)
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries: Vec<CatalogEntry> = self
            .series
            .iter()
            .filter_map(|entry| {
                let first = entry.value().keys().next().copied()?;
                let last = entry.value().keys().next_back().copied()?;
                Some(CatalogEntry {
                    symbol: entry.key().clone(),
                    first_date: first,
                    last_date: last,
                    row_count: entry.value().len(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(entries)
    }
}

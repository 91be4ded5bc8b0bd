//! Per-date quality classification
//!
//! Reconciles every calendar date of a window against the stored daily
//! closes of one symbol.

use crate::calendar::MarketCalendar;
use crate::db::Observation;
use crate::error::{ensure_range, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Quality score of a real stored observation
pub const OBSERVED: f64 = 1.0;
/// Quality score of a weekend or holiday with no observation
pub const EXPECTED_GAP: f64 = 0.7;
/// Quality score of a business day with no observation
pub const MISSING: f64 = 0.0;

/// Source tag used for observations stored without provenance
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Verdict for one (symbol, date) pair
///
/// Only constructible through [`DateQuality::observed`],
/// [`DateQuality::expected_gap`] and [`DateQuality::missing`], so a price
/// or source can only be present on an observed date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateQuality {
    has_data: bool,
    quality: f64,
    price: Option<f64>,
    source: Option<String>,
    business_day: bool,
}

impl DateQuality {
    pub fn observed(price: f64, source: Option<String>, business_day: bool) -> Self {
        Self {
            has_data: true,
            quality: OBSERVED,
            price: Some(price),
            source,
            business_day,
        }
    }

    pub fn expected_gap() -> Self {
        Self {
            has_data: true,
            quality: EXPECTED_GAP,
            price: None,
            source: None,
            business_day: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            has_data: false,
            quality: MISSING,
            price: None,
            source: None,
            business_day: true,
        }
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the market was expected to trade on this date
    pub fn is_business_day(&self) -> bool {
        self.business_day
    }

    pub fn is_observed(&self) -> bool {
        self.price.is_some()
    }

    pub fn is_expected_gap(&self) -> bool {
        self.has_data && self.price.is_none()
    }

    pub fn is_missing(&self) -> bool {
        !self.has_data
    }

    /// Source used for filtering: the recorded tag or [`UNKNOWN_SOURCE`]
    pub fn source_tag(&self) -> Option<&str> {
        if self.is_observed() {
            Some(self.source().unwrap_or(UNKNOWN_SOURCE))
        } else {
            None
        }
    }
}

/// Date-ordered quality verdicts of one symbol over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMap {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: BTreeMap<NaiveDate, DateQuality>,
}

impl QualityMap {
    pub fn get(&self, date: NaiveDate) -> Option<&DateQuality> {
        self.days.get(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DateQuality)> {
        self.days.iter()
    }

    /// Business days without an observation, ascending
    pub fn missing_dates(&self) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|(_, q)| q.is_missing())
            .map(|(d, _)| *d)
            .collect()
    }

    /// Contiguous runs of missing business days
    ///
    /// Weekends and holidays between two missing days do not break a run;
    /// an observed date does.
    pub fn missing_ranges(&self) -> Vec<(NaiveDate, NaiveDate)> {
        let mut ranges = Vec::new();
        let mut current: Option<(NaiveDate, NaiveDate)> = None;

        for (date, q) in &self.days {
            if q.is_missing() {
                current = match current {
                    Some((start, _)) => Some((start, *date)),
                    None => Some((*date, *date)),
                };
            } else if q.is_observed() {
                if let Some(run) = current.take() {
                    ranges.push(run);
                }
            }
        }
        if let Some(run) = current {
            ranges.push(run);
        }
        ranges
    }

    /// Observed day count per source tag
    pub fn source_breakdown(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for q in self.days.values() {
            if let Some(tag) = q.source_tag() {
                *counts.entry(tag.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Classify every date of `[start, end]` for `symbol`
///
/// Observations outside the window are ignored. When two observations
/// share a date the last one wins.
pub fn build_quality_map(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    observations: &[Observation],
    calendar: &MarketCalendar,
) -> Result<QualityMap> {
    ensure_range(start, end)?;

    let by_date: HashMap<NaiveDate, &Observation> = observations
        .iter()
        .filter(|o| o.date >= start && o.date <= end)
        .map(|o| (o.date, o))
        .collect();

    let mut days = BTreeMap::new();
    for date in start.iter_days().take_while(|d| *d <= end) {
        let business_day = calendar.is_business_day(date);
        let verdict = match by_date.get(&date) {
            Some(obs) => DateQuality::observed(obs.close, obs.source.clone(), business_day),
            None if !business_day => DateQuality::expected_gap(),
            None => DateQuality::missing(),
        };
        days.insert(date, verdict);
    }

    tracing::debug!(
        "Classified {} dates for {} ({} to {})",
        days.len(),
        symbol,
        start,
        end
    );

    Ok(QualityMap {
        symbol: symbol.to_string(),
        start,
        end,
        days,
    })
}

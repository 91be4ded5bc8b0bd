//! Source filtering of quality maps

use super::quality::QualityMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What happens to dates without a source while a filter is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapVisibility {
    /// Keep only observed dates whose source is selected
    #[default]
    Hide,
    /// Also keep weekend/holiday gaps so the calendar stays readable
    KeepExpected,
}

/// Narrow `map` to observations whose source tag is in `selected`
///
/// An empty selection means no filtering and returns the map unchanged.
/// Observations without a recorded source match the tag `"Unknown"`.
pub fn filter_by_source(
    map: &QualityMap,
    selected: &BTreeSet<String>,
    gaps: GapVisibility,
) -> QualityMap {
    if selected.is_empty() {
        return map.clone();
    }

    let days = map
        .days
        .iter()
        .filter(|(_, q)| match q.source_tag() {
            Some(tag) => selected.contains(tag),
            None => gaps == GapVisibility::KeepExpected && q.is_expected_gap(),
        })
        .map(|(d, q)| (*d, q.clone()))
        .collect();

    QualityMap {
        symbol: map.symbol.clone(),
        start: map.start,
        end: map.end,
        days,
    }
}

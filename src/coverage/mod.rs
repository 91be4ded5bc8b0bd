//! Coverage analysis (classification, aggregation, source filtering)

pub mod filter;
pub mod quality;
pub mod summary;

pub use filter::{filter_by_source, GapVisibility};
pub use quality::{build_quality_map, DateQuality, QualityMap, UNKNOWN_SOURCE};
pub use summary::{
    coverage_percent, sort_coverage, summarize, CoverageDiagnostics, CoverageSort, SymbolCoverage,
};

//! Historify - price history coverage analysis and backfill
//!
//! Tracks, per symbol, whether a daily close exists for every expected U.S.
//! trading day, classifies each date's data quality, and backfills gaps from
//! a rate-limited price provider.

pub mod backfill;
pub mod calendar;
pub mod commands;
pub mod config;
pub mod coverage;
pub mod db;
pub mod error;
pub mod providers;
pub mod services;
pub mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for a binary
///
/// `RUST_LOG` wins when set; otherwise this crate logs at info.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "historify=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

//! Historify CLI
//!
//! Provides commands for:
//! - `coverage`: Coverage listing of tracked or selected symbols
//! - `quality`: Per-date quality map of one symbol
//! - `backfill` / `gaps` / `bulk`: Remediation under the provider call budget
//! - `fetch`: Store closes for several symbols without rebuilding views
//! - `manual`: Record a close entered by hand
//! - `track`, `closure`, `settings`, `calendar`: State management

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use historify::commands::{backfill, coverage, market, settings, symbols};
use historify::config::AppConfig;
use historify::coverage::CoverageSort;
use historify::db::sqlite::{CreateClosureRequest, UpdateBackfillSettings};
use historify::state::AppState;
use serde::Serialize;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "historify")]
#[command(about = "Price history coverage analysis and rate-limited backfill", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    /// Worst-covered first
    Coverage,
    /// Alphabetical
    Symbol,
}

impl From<SortArg> for CoverageSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Coverage => CoverageSort::Coverage,
            SortArg::Symbol => CoverageSort::Symbol,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Coverage summary per symbol
    Coverage {
        /// Symbols (comma-separated); all tracked symbols when omitted
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        #[arg(long, value_enum, default_value = "coverage")]
        sort: SortArg,
    },

    /// Per-date quality map of one symbol
    Quality {
        symbol: String,

        /// Start date (YYYY-MM-DD), defaults to the analysis window start
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,

        /// Only show observations from these sources (comma-separated)
        #[arg(long, value_delimiter = ',')]
        source: Vec<String>,
    },

    /// Backfill one date or a date range of one symbol
    Backfill {
        symbol: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD), a single date when omitted
        #[arg(long)]
        to: Option<String>,
    },

    /// Backfill every missing date in a symbol's analysis window
    Gaps { symbol: String },

    /// Backfill several symbols, one at a time
    Bulk {
        /// Symbols (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Also refresh this symbol's quality map as it completes
        #[arg(long)]
        selected: Option<String>,
    },

    /// Fetch and store closes for several symbols
    Fetch {
        /// Symbols (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: String,
    },

    /// Record a close entered by hand
    Manual {
        symbol: String,

        /// Date (YYYY-MM-DD)
        date: String,

        close: f64,
    },

    /// Tracked symbol management
    #[command(subcommand)]
    Track(TrackCommands),

    /// Ad-hoc market closures
    #[command(subcommand)]
    Closure(ClosureCommands),

    /// Backfill settings and call budget
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Trading calendar queries
    #[command(subcommand)]
    Calendar(CalendarCommands),
}

#[derive(Subcommand)]
enum TrackCommands {
    /// Track a symbol
    Add {
        symbol: String,
        #[arg(long)]
        name: Option<String>,
        /// First trade date (YYYY-MM-DD)
        #[arg(long)]
        first_trade: Option<String>,
    },
    /// List tracked symbols
    List,
    /// Stop tracking a symbol
    Remove { symbol: String },
    /// Stored history extent per symbol
    Stored,
}

#[derive(Subcommand)]
enum ClosureCommands {
    /// Record a closure date
    Add {
        /// Date (YYYY-MM-DD)
        date: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List closures
    List {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Delete a closure by id
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show settings
    Show,
    /// Update settings (only the given fields)
    Set {
        #[arg(long)]
        daily_call_budget: Option<u32>,
        #[arg(long)]
        inter_call_delay_ms: Option<u64>,
        #[arg(long)]
        fallback_window_days: Option<u32>,
        #[arg(long)]
        include_good_friday: Option<bool>,
        #[arg(long)]
        keep_expected_gaps: Option<bool>,
        #[arg(long)]
        provider: Option<String>,
    },
    /// Show the provider call budget
    Budget,
}

#[derive(Subcommand)]
enum CalendarCommands {
    /// Weekday closures of a year
    Holidays { year: i32 },
    /// Whether the market trades on a date
    Check { date: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    historify::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let state = Arc::new(AppState::new(&config)?);

    match cli.command {
        Commands::Coverage { symbols, sort } => {
            let rows = coverage::list_symbol_coverage(
                &state,
                coverage::CoverageListRequest {
                    symbols,
                    sort: sort.into(),
                },
            )
            .await?;
            print_json(&rows)?;
        }
        Commands::Quality {
            symbol,
            from,
            to,
            source,
        } => {
            let response = coverage::get_quality_map(
                &state,
                coverage::QualityMapRequest {
                    symbol,
                    from_date: from,
                    to_date: to,
                    sources: source,
                },
            )
            .await?;
            print_json(&response)?;
        }
        Commands::Backfill { symbol, from, to } => {
            let response = match to {
                Some(to) => {
                    backfill::backfill_range(
                        &state,
                        backfill::BackfillRangeRequest {
                            symbol,
                            from_date: from,
                            to_date: to,
                        },
                    )
                    .await?
                }
                None => {
                    backfill::backfill_date(&state, backfill::BackfillDateRequest { symbol, date: from })
                        .await?
                }
            };
            print_json(&response)?;
        }
        Commands::Gaps { symbol } => {
            print_json(&backfill::backfill_gaps(&state, symbol).await?)?;
        }
        Commands::Bulk {
            symbols,
            from,
            to,
            selected,
        } => {
            let mut handle = backfill::start_bulk_backfill(
                state.clone(),
                backfill::BulkBackfillCommand {
                    symbols,
                    from_date: from,
                    to_date: to,
                    selected,
                },
            )?;
            tracing::info!("Bulk backfill {} started", handle.id());

            while handle.changed().await {
                let snapshot = handle.snapshot();
                for row in &snapshot.rows {
                    eprintln!("  {:<10} {}", row.symbol, row.status.as_str());
                }
                if snapshot.finished {
                    break;
                }
            }

            let summary = handle.finish().await?;
            eprintln!("{}", summary.message());
            print_json(&summary)?;
        }
        Commands::Fetch { symbols, from, to } => {
            let report = backfill::fetch_history(
                &state,
                backfill::FetchHistoryRequest {
                    symbols,
                    from_date: from,
                    to_date: to,
                },
            )
            .await?;
            print_json(&report)?;
        }
        Commands::Manual {
            symbol,
            date,
            close,
        } => {
            let response = backfill::record_manual_close(
                &state,
                backfill::ManualCloseRequest { symbol, date, close },
            )
            .await?;
            print_json(&response)?;
        }
        Commands::Track(cmd) => match cmd {
            TrackCommands::Add {
                symbol,
                name,
                first_trade,
            } => {
                let tracked = symbols::track_symbol(
                    &state,
                    symbols::TrackSymbolRequest {
                        symbol,
                        name,
                        first_trade_date: first_trade,
                    },
                )
                .await?;
                print_json(&tracked)?;
            }
            TrackCommands::List => print_json(&symbols::list_tracked_symbols(&state).await?)?,
            TrackCommands::Remove { symbol } => {
                print_json(&symbols::untrack_symbol(&state, symbol).await?)?
            }
            TrackCommands::Stored => print_json(&symbols::get_history_catalog(&state).await?)?,
        },
        Commands::Closure(cmd) => match cmd {
            ClosureCommands::Add { date, description } => {
                let closure = market::create_market_closure(
                    &state,
                    CreateClosureRequest { date, description },
                )
                .await?;
                print_json(&closure)?;
            }
            ClosureCommands::List { year } => {
                print_json(&market::get_market_closures(&state, year).await?)?
            }
            ClosureCommands::Remove { id } => {
                print_json(&market::delete_market_closure(&state, id).await?)?
            }
        },
        Commands::Settings(cmd) => match cmd {
            SettingsCommands::Show => print_json(&settings::get_backfill_settings(&state).await?)?,
            SettingsCommands::Set {
                daily_call_budget,
                inter_call_delay_ms,
                fallback_window_days,
                include_good_friday,
                keep_expected_gaps,
                provider,
            } => {
                let updated = settings::update_backfill_settings(
                    &state,
                    UpdateBackfillSettings {
                        daily_call_budget,
                        inter_call_delay_ms,
                        fallback_window_days,
                        include_good_friday,
                        keep_expected_gaps_when_filtering: keep_expected_gaps,
                        default_provider: provider,
                    },
                )
                .await?;
                print_json(&updated)?;
            }
            SettingsCommands::Budget => print_json(&settings::get_budget_status(&state).await?)?,
        },
        Commands::Calendar(cmd) => match cmd {
            CalendarCommands::Holidays { year } => {
                print_json(&market::get_holidays(&state, year).await?)?
            }
            CalendarCommands::Check { date } => {
                print_json(&market::check_trading_day(&state, date).await?)?
            }
        },
    }

    Ok(())
}

//! Folio CLI - holdings, recommendations and risk from the command line.
//!
//! Every command prints an `ApiResponse` JSON document on stdout; logs go
//! to stderr (filter with `RUST_LOG`).

use anyhow::Context;
use chrono::{Days, Utc};
use clap::{Parser, Subcommand};
use folio_core::indicators::{crossover_events, FAST_PERIOD, SLOW_PERIOD};
use folio_core::ledger::{EventSink, HoldingsLedger, JsonFileStore, JsonLinesSink, NullSink};
use folio_core::market::{FinnhubGateway, MarketDataGateway};
use folio_core::types::normalize_ticker;
use folio_core::{
    ApiResponse, Error, FolioConfig, PortfolioSnapshot, RecommendationRanker, RiskSummarizer,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio portfolio CLI - holdings ledger, recommendations and risk")]
#[command(version)]
struct Cli {
    /// Owner identifier (e.g. an email address)
    #[arg(short, long, global = true)]
    owner: Option<String>,

    /// Config file (defaults to ~/.folio/config.toml or $FOLIO_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a purchase
    Buy {
        /// Stock ticker
        ticker: String,
        /// Number of shares
        #[arg(short = 'n', long)]
        shares: u64,
        /// Price per share
        #[arg(short, long)]
        price: Decimal,
    },
    /// Record a sale
    Sell {
        /// Stock ticker
        ticker: String,
        /// Number of shares
        #[arg(short = 'n', long)]
        shares: u64,
        /// Price per share
        #[arg(short, long)]
        price: Decimal,
    },
    /// Watch a ticker without holding it
    Pin {
        /// Stock ticker
        ticker: String,
    },
    /// Stop watching a ticker
    Unpin {
        /// Stock ticker
        ticker: String,
    },
    /// List holdings
    Holdings {
        /// Attach last close, total return and portfolio totals
        #[arg(long)]
        quotes: bool,
    },
    /// Rank analyst recommendations over the universe and your pins
    Recs,
    /// Volatility and balance-sheet ratios for a ticker
    Risk {
        /// Stock ticker
        ticker: String,
    },
    /// Moving-average crossover signals for a ticker
    Signals {
        /// Stock ticker
        ticker: String,
        /// Fast window in days
        #[arg(long, default_value_t = FAST_PERIOD)]
        fast: usize,
        /// Slow window in days
        #[arg(long, default_value_t = SLOW_PERIOD)]
        slow: usize,
    },
    /// Recent company news
    News {
        /// Stock ticker
        ticker: String,
        /// Look-back window in days
        #[arg(long, default_value_t = 7)]
        days: u64,
        /// Maximum headlines
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FolioConfig::load_from_path(path).map(|mut config| {
            config.apply_env();
            config
        }),
        None => FolioConfig::load(),
    }
    .context("failed to load configuration")?;

    let response = match run(cli, &config).await {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "command failed");
            ApiResponse::from_error(&e)
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn ledger(config: &FolioConfig) -> HoldingsLedger<JsonFileStore, Box<dyn EventSink>> {
    let sink: Box<dyn EventSink> = match &config.audit_log {
        Some(path) => Box::new(JsonLinesSink::new(path)),
        None => Box::new(NullSink),
    };

    HoldingsLedger::new(JsonFileStore::new(&config.store_path), sink)
        .with_max_attempts(config.ledger.max_commit_attempts)
        .with_fetch_policy(config.fetch.policy())
}

fn owner(cli_owner: &Option<String>) -> folio_core::Result<&str> {
    cli_owner
        .as_deref()
        .ok_or_else(|| Error::InvalidOperation("--owner is required".to_string()))
}

fn signed(shares: u64) -> folio_core::Result<i64> {
    i64::try_from(shares)
        .map_err(|_| Error::InvalidOperation(format!("share count too large: {}", shares)))
}

async fn run(cli: Cli, config: &FolioConfig) -> folio_core::Result<Value> {
    let gateway = Arc::new(FinnhubGateway::from_config(&config.market)?);

    match cli.command {
        Commands::Buy {
            ticker,
            shares,
            price,
        } => {
            let outcome = ledger(config)
                .apply_trade(owner(&cli.owner)?, &ticker, price, signed(shares)?)
                .await?;
            Ok(serde_json::to_value(outcome)?)
        }
        Commands::Sell {
            ticker,
            shares,
            price,
        } => {
            let outcome = ledger(config)
                .apply_trade(owner(&cli.owner)?, &ticker, price, -signed(shares)?)
                .await?;
            Ok(serde_json::to_value(outcome)?)
        }
        Commands::Pin { ticker } => {
            let holding = ledger(config).pin(owner(&cli.owner)?, &ticker).await?;
            Ok(serde_json::to_value(holding)?)
        }
        Commands::Unpin { ticker } => {
            let holding = ledger(config).unpin(owner(&cli.owner)?, &ticker).await?;
            Ok(json!({ "removed": holding.ticker }))
        }
        Commands::Holdings { quotes: false } => {
            let holdings = ledger(config).list_holdings(owner(&cli.owner)?).await?;
            Ok(json!({ "holdings": holdings }))
        }
        Commands::Holdings { quotes: true } => {
            let holdings = ledger(config)
                .list_holdings_with_quotes(owner(&cli.owner)?, gateway.as_ref())
                .await?;
            let snapshot = PortfolioSnapshot::from_holdings(&holdings);
            Ok(json!({ "holdings": holdings, "snapshot": snapshot }))
        }
        Commands::Recs => {
            let pins = match &cli.owner {
                Some(owner) => ledger(config).pinned_tickers(owner).await?,
                None => Vec::new(),
            };
            let ranking = RecommendationRanker::from_config(gateway, config)
                .rank(&pins)
                .await?;
            Ok(serde_json::to_value(ranking)?)
        }
        Commands::Risk { ticker } => {
            let summary = RiskSummarizer::from_config(gateway, config)
                .summarize(&ticker)
                .await?;
            Ok(serde_json::to_value(summary)?)
        }
        Commands::Signals { ticker, fast, slow } => {
            if fast == 0 || fast >= slow {
                return Err(Error::InvalidOperation(format!(
                    "fast window ({}) must be positive and shorter than slow window ({})",
                    fast, slow
                )));
            }
            let today = Utc::now().date_naive();
            let closes = gateway
                .daily_closes(&ticker, config.risk.history_start, today)
                .await?;
            if closes.is_empty() {
                return Err(Error::NoData(format!("no price history for {}", ticker)));
            }
            Ok(json!({
                "ticker": normalize_ticker(&ticker),
                "signals": crossover_events(&closes, fast, slow),
            }))
        }
        Commands::News {
            ticker,
            days,
            limit,
        } => {
            let today = Utc::now().date_naive();
            let from = today.checked_sub_days(Days::new(days)).unwrap_or(today);
            let mut news = gateway.company_news(&ticker, from, today).await?;
            news.truncate(limit);
            Ok(json!({ "ticker": normalize_ticker(&ticker), "news": news }))
        }
    }
}

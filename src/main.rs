mod app;
mod config;
mod countdown;
mod cycle;
mod dashboard;
mod error;
mod indicator;
mod model;
mod provider;
mod report;
mod ui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, DashboardConfig};
use cycle::CycleParams;
use error::ConfigError;
use model::{Interval, Period, RefreshRate, normalize_ticker};
use provider::MarketData;
use provider::yahoo::YahooFinance;
use report::terminal::TerminalReporter;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("logging setup failed")]
    Logging,
    #[display("market data provider error")]
    Provider,
    #[display("terminal ui error")]
    Ui,
}

#[derive(Parser)]
#[command(
    name = "ticker-dashboard",
    about = "Real-time stock market dashboard for the terminal"
)]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stock symbol, e.g. AAPL, TSLA, INFY.NS
    #[arg(short, long)]
    ticker: Option<String>,

    /// Seconds between refreshes (5-60)
    #[arg(short, long)]
    refresh_rate: Option<u64>,

    /// Lookback window, e.g. 1d, 5d, 1mo
    #[arg(long)]
    period: Option<String>,

    /// Sampling interval, e.g. 1m, 5m, 1d
    #[arg(long)]
    interval: Option<String>,

    /// Log each cycle instead of drawing the terminal dashboard
    #[arg(long)]
    headless: bool,

    /// Run a single cycle, log it and exit (implies --headless)
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn headless(&self) -> bool {
        self.headless || self.once
    }

    /// Command-line values win over the config file.
    fn apply_overrides(&self, dashboard: &mut DashboardConfig) {
        if let Some(ticker) = &self.ticker {
            dashboard.ticker = ticker.clone();
        }
        if let Some(secs) = self.refresh_rate {
            dashboard.refresh_secs = secs;
        }
        if let Some(period) = &self.period {
            dashboard.period = period.clone();
        }
        if let Some(interval) = &self.interval {
            dashboard.interval = interval.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let mut config = config::load_or_default(cli.config.as_deref()).change_context(AppError::Config)?;
    cli.apply_overrides(&mut config.dashboard);
    config::validate(&config).change_context(AppError::Config)?;

    init_tracing(&config, cli.headless())?;

    let params = cycle_params(&config.dashboard).change_context(AppError::Config)?;
    let provider: Arc<dyn MarketData> =
        Arc::new(YahooFinance::new(&config.provider).change_context(AppError::Provider)?);

    info!(
        ticker = %params.ticker,
        period = %params.period,
        interval = %params.interval,
        refresh = %params.refresh,
        provider = provider.name(),
        "starting dashboard"
    );

    if cli.headless() {
        let cancel = CancellationToken::new();
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl+c received, shutting down");
                ctrl_c.cancel();
            }
        });
        app::run_headless(
            provider.as_ref(),
            &params,
            &TerminalReporter,
            &cancel,
            cli.once,
        )
        .await;
        return Ok(());
    }

    app::run_tui(provider, params)
        .await
        .change_context(AppError::Ui)
}

fn cycle_params(dashboard: &DashboardConfig) -> Result<CycleParams, Report<ConfigError>> {
    let invalid = |field: &str| {
        Report::new(ConfigError::Validation {
            field: field.to_owned(),
        })
    };
    Ok(CycleParams {
        ticker: normalize_ticker(&dashboard.ticker).ok_or_else(|| invalid("dashboard.ticker"))?,
        period: Period::from_str(&dashboard.period).ok_or_else(|| invalid("dashboard.period"))?,
        interval: Interval::from_str(&dashboard.interval)
            .ok_or_else(|| invalid("dashboard.interval"))?,
        refresh: RefreshRate::new(dashboard.refresh_secs)
            .ok_or_else(|| invalid("dashboard.refresh_secs"))?,
        tail_rows: dashboard.tail_rows,
    })
}

/// Headless runs log to stdout; the terminal UI owns stdout, so it logs to
/// `general.log_file` instead.
fn init_tracing(config: &AppConfig, headless: bool) -> Result<(), Report<AppError>> {
    let filter = EnvFilter::new(&config.general.log_level);

    if headless {
        match config.general.log_format.as_str() {
            "json" => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        }
        return Ok(());
    }

    let path = &config.general.log_file;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .change_context(AppError::Logging)
        .attach_with(|| format!("log_file: {path}"))?;
    let writer = Mutex::new(file);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
        }
    }
    Ok(())
}

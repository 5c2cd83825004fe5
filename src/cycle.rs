use std::fmt;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dashboard::Dashboard;
use crate::indicator::add_indicators;
use crate::model::{Interval, Period, RefreshRate, Series};
use crate::provider::MarketData;

pub const EMPTY_WARNING: &str = "No data available. Try a different ticker or interval.";

/// Inputs for one refresh cycle. Nothing else carries over between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleParams {
    /// Already normalized (trimmed, upper-case).
    pub ticker: String,
    pub period: Period,
    pub interval: Interval,
    pub refresh: RefreshRate,
    pub tail_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Empty,
    Computing,
    Rendering,
    CountingDown,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Empty => "empty",
            Self::Computing => "computing",
            Self::Rendering => "rendering",
            Self::CountingDown => "counting down",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub series: Series,
    pub dashboard: Dashboard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Rendered(Box<Rendered>),
    /// The provider returned no rows; nothing is drawn.
    Empty { warning: String },
    /// The provider call failed; `message` is shown verbatim.
    Failed { message: String },
}

impl CycleOutcome {
    /// Phase the cycle ended in before any countdown starts.
    pub fn phase(&self) -> CyclePhase {
        match self {
            Self::Rendered(_) => CyclePhase::Rendering,
            Self::Empty { .. } | Self::Failed { .. } => CyclePhase::Empty,
        }
    }
}

/// Fetch, enrich and lay out one snapshot of `params.ticker`.
///
/// Never fails: provider errors become `CycleOutcome::Failed` so the
/// refresh loop keeps going.
pub async fn run_cycle(provider: &dyn MarketData, params: &CycleParams) -> CycleOutcome {
    let cycle_id = Uuid::new_v4();
    let ticker = &params.ticker;

    debug!(%cycle_id, %ticker, provider = provider.name(), phase = %CyclePhase::Fetching);
    let mut series = match provider
        .fetch_series(ticker, params.period, params.interval)
        .await
    {
        Ok(series) => series,
        Err(report) => {
            warn!(%cycle_id, %ticker, error = ?report, "market data fetch failed");
            return CycleOutcome::Failed {
                message: format!("Error: {report:#}"),
            };
        }
    };

    if series.is_empty() {
        warn!(
            %cycle_id,
            %ticker,
            period = %params.period,
            interval = %params.interval,
            "no rows returned"
        );
        return CycleOutcome::Empty {
            warning: EMPTY_WARNING.to_owned(),
        };
    }

    debug!(%cycle_id, phase = %CyclePhase::Computing, rows = series.len());
    add_indicators(&mut series);

    debug!(%cycle_id, phase = %CyclePhase::Rendering);
    match Dashboard::build(&series, ticker, params.tail_rows) {
        Some(dashboard) => {
            info!(
                %cycle_id,
                %ticker,
                rows = series.len(),
                latest = dashboard.metrics.latest_close,
                traces = dashboard.chart.trace_count(),
                "cycle rendered"
            );
            CycleOutcome::Rendered(Box::new(Rendered { series, dashboard }))
        }
        None => CycleOutcome::Empty {
            warning: EMPTY_WARNING.to_owned(),
        },
    }
}

use tracing::{error, info, warn};

use crate::countdown;
use crate::cycle::{CycleOutcome, CycleParams};
use crate::dashboard::{Dashboard, PAGE_TITLE, TABLE_TITLE};
use crate::report::Reporter;

/// Writes each cycle as structured log lines.
pub struct TerminalReporter;

impl TerminalReporter {
    fn dashboard(&self, params: &CycleParams, dashboard: &Dashboard) {
        info!(ticker = %params.ticker, "{PAGE_TITLE}");
        for tile in dashboard.metrics.tiles() {
            info!(
                ticker = %params.ticker,
                delta = tile.delta.as_deref().unwrap_or(""),
                "{}: {}",
                tile.label,
                tile.value,
            );
        }

        let overlays: Vec<&str> = dashboard
            .chart
            .overlays
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        info!(
            candles = dashboard.chart.candles.len(),
            traces = dashboard.chart.trace_count(),
            overlays = ?overlays,
            "{}",
            dashboard.chart.title,
        );

        info!("{TABLE_TITLE}: {}", dashboard.table.headers.join(" | "));
        for row in &dashboard.table.rows {
            info!("{TABLE_TITLE}: {}", row.join(" | "));
        }
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, params: &CycleParams, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Rendered(rendered) => self.dashboard(params, &rendered.dashboard),
            CycleOutcome::Empty { warning } => warn!(ticker = %params.ticker, "{warning}"),
            CycleOutcome::Failed { message } => error!(ticker = %params.ticker, "{message}"),
        }
    }

    fn countdown(&self, remaining: u64) {
        info!("{}", countdown::label(remaining));
    }
}

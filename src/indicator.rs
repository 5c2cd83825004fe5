pub mod ma;

use std::num::NonZeroUsize;

use nonzero_ext::nonzero;
use tracing::debug;

use crate::model::Series;
use ma::{Ema, Sma};

/// Window shared by both overlays drawn on the dashboard chart.
pub const OVERLAY_WINDOW: NonZeroUsize = nonzero!(20usize);

/// A technical analysis indicator computed over a close-price series.
///
/// Prices must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Short lowercase name of this indicator (e.g., "sma").
    fn name(&self) -> &str;

    /// Column label the values are stored under, e.g. `SMA20`.
    fn column(&self) -> String;

    /// Calculate one value per input price.
    ///
    /// Rows where the indicator has not yet warmed up are `None`; the output
    /// length always equals the input length.
    fn calculate(&self, prices: &[f64]) -> Vec<Option<f64>>;
}

/// The overlays computed on every refresh: `SMA20` then `EMA20`.
pub fn default_overlays() -> Vec<Box<dyn Indicator>> {
    vec![
        Box::new(Sma::new(OVERLAY_WINDOW)),
        Box::new(Ema::new(OVERLAY_WINDOW)),
    ]
}

/// Append the default overlay columns to `series`, recomputing from the
/// close column so repeated calls give identical values.
pub fn add_indicators(series: &mut Series) {
    apply(series, &default_overlays());
}

/// Compute each indicator from the close column and store it on `series`.
pub fn apply(series: &mut Series, indicators: &[Box<dyn Indicator>]) {
    let closes = series.closes();
    for indicator in indicators {
        let values = indicator.calculate(&closes);
        let defined = values.iter().filter(|v| v.is_some()).count();
        debug!(
            symbol = %series.symbol,
            indicator = indicator.name(),
            rows = closes.len(),
            defined,
            "indicator computed"
        );
        series.set_column(indicator.column(), values);
    }
}

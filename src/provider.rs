pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::ProviderError;
use crate::model::{Interval, Period, Series};

/// Abstraction over a market-data backend that serves OHLCV history.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketData`).
pub trait MarketData: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the OHLCV series for `ticker` over `period`, sampled every `interval`.
    ///
    /// An unknown or silent symbol yields an empty `Series`, not an error.
    fn fetch_series(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'_, Result<Series, Report<ProviderError>>>;
}

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::{Interval, Observation, Period, Series};
use crate::provider::MarketData;

const PROVIDER: &str = "yahoo";
/// The chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const NOT_FOUND_CODE: &str = "Not Found";
const FALLBACK_REQUESTS_PER_MINUTE: NonZeroU32 = nonzero!(30u32);

pub struct YahooFinance {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooFinance {
    pub fn new(config: &ProviderConfig) -> Result<Self, Report<ProviderError>> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .change_context(ProviderError::Connection {
                provider: PROVIDER.into(),
            })?;
        let per_minute =
            NonZeroU32::new(config.requests_per_minute).unwrap_or(FALLBACK_REQUESTS_PER_MINUTE);
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    fn chart_url(&self, ticker: &str) -> Result<Url, Report<ProviderError>> {
        let mut url = Url::parse(&self.base_url)
            .change_context(ProviderError::Request {
                provider: PROVIDER.into(),
            })
            .attach_with(|| format!("base_url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|()| {
                Report::new(ProviderError::Request {
                    provider: PROVIDER.into(),
                })
                .attach(format!("base_url cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);
        Ok(url)
    }
}

impl MarketData for YahooFinance {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn fetch_series(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'_, Result<Series, Report<ProviderError>>> {
        let ticker = ticker.to_owned();
        Box::pin(async move {
            if ticker.trim().is_empty() {
                return Err(Report::new(ProviderError::InvalidTicker { ticker }));
            }

            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = self.chart_url(&ticker)?;
            debug!(%url, %period, %interval, "requesting chart");

            let response = self
                .client
                .get(url)
                .query(&[("range", period.as_str()), ("interval", interval.as_str())])
                .send()
                .await
                .change_context(ProviderError::Connection {
                    provider: PROVIDER.into(),
                })
                .attach_with(|| format!("ticker: {ticker}"))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .change_context(ProviderError::Request {
                    provider: PROVIDER.into(),
                })?;

            let series = series_from_response(status, &body, &ticker, period, interval)?;

            info!(
                ticker = %ticker,
                period = %period,
                interval = %interval,
                fetched = series.len(),
                "yahoo chart fetch complete"
            );

            Ok(series)
        })
    }
}

/// Turn a chart endpoint response into a `Series`.
///
/// The provider reports unknown symbols as `404` with a `"Not Found"` error
/// body; those become an empty series so the caller can show a warning.
fn series_from_response(
    status: StatusCode,
    body: &str,
    ticker: &str,
    period: Period,
    interval: Interval,
) -> Result<Series, Report<ProviderError>> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Report::new(ProviderError::RateLimit {
            provider: PROVIDER.into(),
        }));
    }

    let envelope = match serde_json::from_str::<ChartEnvelope>(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(Report::new(e).change_context(ProviderError::ResponseParse {
                provider: PROVIDER.into(),
            }));
        }
        Err(_) => {
            return Err(Report::new(ProviderError::Request {
                provider: PROVIDER.into(),
            })
            .attach(format!("HTTP status: {status}")));
        }
    };

    if let Some(error) = envelope.chart.error {
        if error.code == NOT_FOUND_CODE {
            warn!(ticker, description = %error.description, "no chart data for symbol");
            return Ok(Series::empty(ticker, period, interval));
        }
        return Err(Report::new(ProviderError::Provider {
            provider: PROVIDER.into(),
            code: error.code,
            description: error.description,
        })
        .attach(format!("HTTP status: {status}")));
    }

    if !status.is_success() {
        return Err(Report::new(ProviderError::Request {
            provider: PROVIDER.into(),
        })
        .attach(format!("HTTP status: {status}")));
    }

    match envelope.chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result.into_series(ticker, period, interval),
        None => Ok(Series::empty(ticker, period, interval)),
    }
}

// ── Response types ────────────────────────────────────────────────────────────

/// `{ "chart": { "result": [ ... ], "error": null } }`
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    /// Absent when the window holds no trading activity.
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i32,
    #[serde(rename = "exchangeTimezoneName")]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

/// Column-oriented OHLCV; any cell may be `null` for a bucket without trades.
#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn cell(column: &[Option<f64>], index: usize) -> Option<f64> {
    column.get(index).copied().flatten()
}

impl ChartResult {
    fn into_series(
        self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Series, Report<ProviderError>> {
        let offset = FixedOffset::east_opt(self.meta.gmtoffset).ok_or_else(|| {
            Report::new(ProviderError::ResponseParse {
                provider: PROVIDER.into(),
            })
            .attach(format!("gmtoffset out of range: {}", self.meta.gmtoffset))
        })?;
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();

        let mut rows = Vec::with_capacity(self.timestamp.len());
        let mut skipped = 0usize;
        for (i, &secs) in self.timestamp.iter().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close)) = (
                cell(&quote.open, i),
                cell(&quote.high, i),
                cell(&quote.low, i),
                cell(&quote.close, i),
            ) else {
                skipped += 1;
                continue;
            };
            let timestamp = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                Report::new(ProviderError::ResponseParse {
                    provider: PROVIDER.into(),
                })
                .attach(format!("timestamp out of range: {secs}"))
            })?;
            rows.push(Observation {
                timestamp: timestamp.with_timezone(&offset),
                open,
                high,
                low,
                close,
                volume: cell(&quote.volume, i).unwrap_or(0.0),
            });
        }

        debug!(
            ticker,
            timezone = self.meta.timezone.as_deref().unwrap_or("UTC"),
            rows = rows.len(),
            skipped,
            "chart rows decoded"
        );

        Ok(Series::new(ticker, period, interval, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ROWS_AND_A_GAP: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "gmtoffset": -14400,
                    "exchangeTimezoneName": "America/New_York"
                },
                "timestamp": [1709299800, 1709299860, 1709299920],
                "indicators": {
                    "quote": [{
                        "open":   [100.0, null, 102.0],
                        "high":   [105.0, null, 103.0],
                        "low":    [99.0,  null, 100.0],
                        "close":  [102.0, null, 101.0],
                        "volume": [1200,  null, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    fn parse(status: StatusCode, body: &str) -> Result<Series, Report<ProviderError>> {
        series_from_response(status, body, "AAPL", Period::Day1, Interval::Min1)
    }

    #[test]
    fn chart_rows_parse_into_series() {
        let series = parse(StatusCode::OK, TWO_ROWS_AND_A_GAP).unwrap();
        assert_eq!(series.symbol, "AAPL");
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![102.0, 101.0]);
        let first = &series.rows()[0];
        assert_eq!(first.open, 100.0);
        assert_eq!(first.high, 105.0);
        assert_eq!(first.low, 99.0);
        assert_eq!(first.volume, 1200.0);
        assert_eq!(series.rows()[1].volume, 0.0);
    }

    #[test]
    fn timestamps_carry_exchange_offset() {
        let series = parse(StatusCode::OK, TWO_ROWS_AND_A_GAP).unwrap();
        let ts = series.rows()[0].timestamp;
        assert_eq!(ts.offset().local_minus_utc(), -14400);
        assert_eq!(ts.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 09:30");
    }

    #[test]
    fn unknown_symbol_is_empty_series() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let series = parse(StatusCode::NOT_FOUND, body).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn window_without_trades_is_empty_series() {
        let body = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let series = parse(StatusCode::OK, body).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn provider_error_surfaces() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input - interval=7m is not supported"}}}"#;
        let err = parse(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ProviderError::Provider { code, .. } if code == "Bad Request"
        ));
    }

    #[test]
    fn rate_limit_status_surfaces() {
        let err = parse(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").unwrap_err();
        assert!(matches!(err.current_context(), ProviderError::RateLimit { .. }));
    }

    #[test]
    fn garbage_body_is_parse_error() {
        let err = parse(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(
            err.current_context(),
            ProviderError::ResponseParse { .. }
        ));
    }

    #[test]
    fn garbage_body_on_failure_status_is_request_error() {
        let err = parse(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err.current_context(), ProviderError::Request { .. }));
    }

    #[test]
    fn chart_url_escapes_ticker() {
        let provider = YahooFinance::new(&ProviderConfig::default()).unwrap();
        let url = provider.chart_url("BRK/B").unwrap();
        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/BRK%2FB"
        );
    }

    #[tokio::test]
    async fn blank_ticker_rejected_before_request() {
        let provider = YahooFinance::new(&ProviderConfig::default()).unwrap();
        let err = provider
            .fetch_series(" ", Period::Day1, Interval::Min1)
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            ProviderError::InvalidTicker { .. }
        ));
    }

    /// Integration test: requires network access. Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_series() {
        let provider = YahooFinance::new(&ProviderConfig::default()).unwrap();
        let series = provider
            .fetch_series("AAPL", Period::Day5, Interval::Min5)
            .await
            .unwrap();
        assert!(
            series
                .rows()
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
        );
    }
}

//! Renderer-agnostic view of one refresh cycle: metric tiles, chart traces
//! and the tail table. The terminal UI and the log reporter both draw from
//! these types.

use chrono::{DateTime, FixedOffset};

use crate::model::Series;

pub const PAGE_TITLE: &str = "Real-Time Stock Market Dashboard";
pub const TABLE_TITLE: &str = "Latest Data";
pub const DEFAULT_TAIL_ROWS: usize = 5;

/// Change of the latest close against the one before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    pub previous_close: f64,
    pub change: f64,
    /// `None` when the previous close is exactly zero.
    pub pct_change: Option<f64>,
}

/// Snapshot figures derived from the last two rows of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub latest_close: f64,
    /// `None` when the series has a single row.
    pub change: Option<PriceChange>,
    /// High of the last row, not of the whole window.
    pub day_high: f64,
    /// Low of the last row, not of the whole window.
    pub day_low: f64,
}

impl Metrics {
    /// Returns `None` for an empty series.
    pub fn from_series(series: &Series) -> Option<Self> {
        let rows = series.rows();
        let latest = rows.last()?;
        let change = rows.len().checked_sub(2).map(|i| {
            let previous_close = rows[i].close;
            let change = latest.close - previous_close;
            let pct_change = (previous_close != 0.0).then(|| change / previous_close * 100.0);
            PriceChange {
                previous_close,
                change,
                pct_change,
            }
        });
        Some(Self {
            latest_close: latest.close,
            change,
            day_high: latest.high,
            day_low: latest.low,
        })
    }

    /// Delta caption under the latest price, e.g. `-1.00 (-0.98%)`.
    pub fn delta_label(&self) -> String {
        match self.change {
            None => "insufficient data".to_owned(),
            Some(PriceChange {
                change,
                pct_change: Some(pct),
                ..
            }) => format!("{change:.2} ({pct:.2}%)"),
            Some(PriceChange {
                change,
                pct_change: None,
                ..
            }) => format!("{change:.2} (n/a)"),
        }
    }

    pub fn tiles(&self) -> [MetricTile; 3] {
        let trend = match self.change {
            Some(c) if c.change > 0.0 => Trend::Up,
            Some(c) if c.change < 0.0 => Trend::Down,
            _ => Trend::Flat,
        };
        [
            MetricTile {
                label: "Latest Price",
                value: format_price(self.latest_close),
                delta: Some(self.delta_label()),
                trend,
            },
            MetricTile {
                label: "Day High",
                value: format_price(self.day_high),
                delta: None,
                trend: Trend::Flat,
            },
            MetricTile {
                label: "Day Low",
                value: format_price(self.day_low),
                delta: None,
                trend: Trend::Flat,
            },
        ]
    }
}

pub fn format_price(value: f64) -> String {
    format!("${value:.2}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTile {
    pub label: &'static str,
    pub value: String,
    pub delta: Option<String>,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceColor {
    Orange,
    Blue,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandlePoint {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineTrace {
    pub name: String,
    pub color: TraceColor,
    /// Aligned with the candle points.
    pub values: Vec<Option<f64>>,
}

/// Chart description: one candlestick trace plus indicator overlays on the
/// same time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub candles: Vec<CandlePoint>,
    pub overlays: Vec<LineTrace>,
}

impl ChartSpec {
    /// Overlays whose column has no defined value are left out.
    pub fn from_series(series: &Series, ticker: &str) -> Self {
        let candles = series
            .rows()
            .iter()
            .map(|r| CandlePoint {
                timestamp: r.timestamp,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
            })
            .collect();
        let overlays = series
            .columns()
            .iter()
            .filter(|c| c.has_values())
            .map(|c| {
                let (name, color) = overlay_style(&c.name);
                LineTrace {
                    name,
                    color,
                    values: c.values.clone(),
                }
            })
            .collect();
        Self {
            title: format!("{ticker} - Real-Time Candlestick Chart"),
            candles,
            overlays,
        }
    }

    pub fn trace_count(&self) -> usize {
        1 + self.overlays.len()
    }
}

fn overlay_style(column: &str) -> (String, TraceColor) {
    match column {
        "SMA20" => ("SMA 20".to_owned(), TraceColor::Orange),
        "EMA20" => ("EMA 20".to_owned(), TraceColor::Blue),
        other => (other.to_owned(), TraceColor::Gray),
    }
}

/// Last rows of the series as display strings, in series column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn tail(series: &Series, n: usize) -> Self {
        let mut headers: Vec<String> = ["Datetime", "Open", "High", "Low", "Close", "Volume"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        headers.extend(series.columns().iter().map(|c| c.name.clone()));

        let start = series.len().saturating_sub(n);
        let rows = series.rows()[start..]
            .iter()
            .enumerate()
            .map(|(offset, r)| {
                let index = start + offset;
                let mut cells = vec![
                    r.timestamp.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
                    format!("{:.2}", r.open),
                    format!("{:.2}", r.high),
                    format!("{:.2}", r.low),
                    format!("{:.2}", r.close),
                    format!("{:.0}", r.volume),
                ];
                cells.extend(series.columns().iter().map(|c| {
                    c.values
                        .get(index)
                        .copied()
                        .flatten()
                        .map_or_else(|| "NaN".to_owned(), |v| format!("{v:.2}"))
                }));
                cells
            })
            .collect();
        Self { headers, rows }
    }
}

/// Everything drawn for a cycle that produced data.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub ticker: String,
    pub metrics: Metrics,
    pub chart: ChartSpec,
    pub table: TableView,
}

impl Dashboard {
    /// Returns `None` for an empty series; nothing is rendered in that case.
    pub fn build(series: &Series, ticker: &str, tail_rows: usize) -> Option<Self> {
        let metrics = Metrics::from_series(series)?;
        Some(Self {
            ticker: ticker.to_owned(),
            metrics,
            chart: ChartSpec::from_series(series, ticker),
            table: TableView::tail(series, tail_rows),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::add_indicators;
    use crate::model::tests::{observation, series_from_closes};
    use crate::model::{Interval, Period};

    fn two_row_series() -> Series {
        Series::new(
            "AAPL",
            Period::Day1,
            Interval::Min1,
            vec![
                observation(0, 100.0, 105.0, 99.0, 102.0),
                observation(1, 102.0, 103.0, 100.0, 101.0),
            ],
        )
    }

    #[test]
    fn two_row_example_metrics() {
        let metrics = Metrics::from_series(&two_row_series()).unwrap();
        assert_eq!(metrics.latest_close, 101.0);
        let change = metrics.change.unwrap();
        assert_eq!(change.previous_close, 102.0);
        assert!((change.change + 1.0).abs() < 1e-9);
        assert!((change.pct_change.unwrap() + 0.980_392_156_862_745).abs() < 1e-9);
        assert_eq!(metrics.day_high, 103.0);
        assert_eq!(metrics.day_low, 100.0);
    }

    #[test]
    fn two_row_example_tiles() {
        let tiles = Metrics::from_series(&two_row_series()).unwrap().tiles();
        assert_eq!(tiles[0].label, "Latest Price");
        assert_eq!(tiles[0].value, "$101.00");
        assert_eq!(tiles[0].delta.as_deref(), Some("-1.00 (-0.98%)"));
        assert_eq!(tiles[0].trend, Trend::Down);
        assert_eq!(tiles[1].value, "$103.00");
        assert_eq!(tiles[2].value, "$100.00");
    }

    #[test]
    fn empty_series_has_no_metrics() {
        assert!(Metrics::from_series(&series_from_closes(&[])).is_none());
        assert!(Dashboard::build(&series_from_closes(&[]), "X", 5).is_none());
    }

    #[test]
    fn single_row_suppresses_change() {
        let metrics = Metrics::from_series(&series_from_closes(&[42.0])).unwrap();
        assert_eq!(metrics.latest_close, 42.0);
        assert!(metrics.change.is_none());
        assert_eq!(metrics.delta_label(), "insufficient data");
    }

    #[test]
    fn zero_previous_close_has_no_percentage() {
        let metrics = Metrics::from_series(&series_from_closes(&[0.0, 3.0])).unwrap();
        let change = metrics.change.unwrap();
        assert_eq!(change.change, 3.0);
        assert!(change.pct_change.is_none());
        assert_eq!(metrics.delta_label(), "3.00 (n/a)");
    }

    #[test]
    fn day_high_low_use_last_row_only() {
        let series = Series::new(
            "AAPL",
            Period::Day1,
            Interval::Min1,
            vec![
                observation(0, 10.0, 50.0, 1.0, 10.0),
                observation(1, 10.0, 11.0, 9.0, 10.5),
            ],
        );
        let metrics = Metrics::from_series(&series).unwrap();
        assert_eq!(metrics.day_high, 11.0);
        assert_eq!(metrics.day_low, 9.0);
    }

    #[test]
    fn chart_without_indicators_has_one_trace() {
        let chart = ChartSpec::from_series(&series_from_closes(&[1.0, 2.0]), "AAPL");
        assert_eq!(chart.trace_count(), 1);
        assert_eq!(chart.title, "AAPL - Real-Time Candlestick Chart");
    }

    #[test]
    fn undefined_sma_overlay_is_omitted() {
        let mut series = series_from_closes(&[1.0; 5]);
        add_indicators(&mut series);
        let chart = ChartSpec::from_series(&series, "AAPL");
        assert_eq!(chart.trace_count(), 2);
        assert_eq!(chart.overlays[0].name, "EMA 20");
        assert_eq!(chart.overlays[0].color, TraceColor::Blue);
    }

    #[test]
    fn both_overlays_once_warmed_up() {
        let mut series = series_from_closes(&[1.0; 25]);
        add_indicators(&mut series);
        let chart = ChartSpec::from_series(&series, "AAPL");
        assert_eq!(chart.trace_count(), 3);
        assert_eq!(chart.overlays[0].name, "SMA 20");
        assert_eq!(chart.overlays[0].color, TraceColor::Orange);
        assert_eq!(chart.candles.len(), 25);
    }

    #[test]
    fn tail_table_keeps_last_five_rows_in_column_order() {
        let closes: Vec<f64> = (1..=8).map(f64::from).collect();
        let mut series = series_from_closes(&closes);
        add_indicators(&mut series);
        let table = TableView::tail(&series, DEFAULT_TAIL_ROWS);
        assert_eq!(
            table.headers,
            vec!["Datetime", "Open", "High", "Low", "Close", "Volume", "SMA20", "EMA20"]
        );
        assert_eq!(table.rows.len(), 5);
        let closes_shown: Vec<&str> = table.rows.iter().map(|r| r[4].as_str()).collect();
        assert_eq!(closes_shown, vec!["4.00", "5.00", "6.00", "7.00", "8.00"]);
        assert_eq!(table.rows[0][6], "NaN");
        assert_eq!(table.rows[0][0], "2024-03-01 09:33:00-04:00");
    }

    #[test]
    fn tail_table_shorter_than_requested() {
        let table = TableView::tail(&series_from_closes(&[1.0, 2.0]), 5);
        assert_eq!(table.rows.len(), 2);
    }
}

use std::fmt;

use chrono::{DateTime, FixedOffset};

/// Lookback window accepted by the chart endpoint (`range` query parameter).
///
/// String representations match the provider and config file format (e.g. `"1d"`, `"ytd"`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    #[default]
    Day1,
    Day5,
    Month1,
    Month3,
    Month6,
    Year1,
    Year2,
    Year5,
    Year10,
    YearToDate,
    Max,
}

impl Period {
    /// Parse a provider-format string into a `Period`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Self::Day1),
            "5d" => Some(Self::Day5),
            "1mo" => Some(Self::Month1),
            "3mo" => Some(Self::Month3),
            "6mo" => Some(Self::Month6),
            "1y" => Some(Self::Year1),
            "2y" => Some(Self::Year2),
            "5y" => Some(Self::Year5),
            "10y" => Some(Self::Year10),
            "ytd" => Some(Self::YearToDate),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day1 => "1d",
            Self::Day5 => "5d",
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
            Self::Month6 => "6mo",
            Self::Year1 => "1y",
            Self::Year2 => "2y",
            Self::Year5 => "5y",
            Self::Year10 => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sampling granularity accepted by the chart endpoint (`interval` query parameter).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    #[default]
    Min1,
    Min2,
    Min5,
    Min15,
    Min30,
    Min60,
    Min90,
    Hour1,
    Day1,
    Day5,
    Week1,
    Month1,
    Month3,
}

impl Interval {
    /// Parse a provider-format string into an `Interval`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::Min1),
            "2m" => Some(Self::Min2),
            "5m" => Some(Self::Min5),
            "15m" => Some(Self::Min15),
            "30m" => Some(Self::Min30),
            "60m" => Some(Self::Min60),
            "90m" => Some(Self::Min90),
            "1h" => Some(Self::Hour1),
            "1d" => Some(Self::Day1),
            "5d" => Some(Self::Day5),
            "1wk" => Some(Self::Week1),
            "1mo" => Some(Self::Month1),
            "3mo" => Some(Self::Month3),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1m",
            Self::Min2 => "2m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Min60 => "60m",
            Self::Min90 => "90m",
            Self::Hour1 => "1h",
            Self::Day1 => "1d",
            Self::Day5 => "5d",
            Self::Week1 => "1wk",
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
        }
    }

    /// Whether timestamps at this granularity carry a meaningful time of day.
    pub fn is_intraday(self) -> bool {
        matches!(
            self,
            Self::Min1
                | Self::Min2
                | Self::Min5
                | Self::Min15
                | Self::Min30
                | Self::Min60
                | Self::Min90
                | Self::Hour1
        )
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seconds between automatic refreshes, bounded to `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefreshRate(u64);

impl RefreshRate {
    pub const MIN: u64 = 5;
    pub const MAX: u64 = 60;
    pub const DEFAULT: u64 = 15;

    /// Returns `None` when `secs` falls outside the accepted bounds.
    pub fn new(secs: u64) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&secs).then_some(Self(secs))
    }

    pub fn secs(self) -> u64 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self((self.0 + 1).min(Self::MAX))
    }

    pub fn decrement(self) -> Self {
        Self(self.0.saturating_sub(1).max(Self::MIN))
    }
}

impl Default for RefreshRate {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for RefreshRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Trim and upper-case a user-entered symbol. Returns `None` for blank input.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// One OHLCV bucket as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A derived column aligned with the rows of its `Series`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl IndicatorColumn {
    /// True when at least one row has a value.
    pub fn has_values(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }
}

/// Time-ordered OHLCV rows for one symbol and window, plus derived columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
    rows: Vec<Observation>,
    columns: Vec<IndicatorColumn>,
}

impl Series {
    /// Build a series, ordering rows by timestamp and keeping the last
    /// observation for any repeated timestamp.
    pub fn new(
        symbol: impl Into<String>,
        period: Period,
        interval: Interval,
        mut rows: Vec<Observation>,
    ) -> Self {
        rows.sort_by_key(|r| r.timestamp);
        let mut deduped: Vec<Observation> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(prev) if prev.timestamp == row.timestamp => *prev = row,
                _ => deduped.push(row),
            }
        }
        Self {
            symbol: symbol.into(),
            period,
            interval,
            rows: deduped,
            columns: Vec::new(),
        }
    }

    pub fn empty(symbol: impl Into<String>, period: Period, interval: Interval) -> Self {
        Self::new(symbol, period, interval, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn last(&self) -> Option<&Observation> {
        self.rows.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.close).collect()
    }

    pub fn columns(&self) -> &[IndicatorColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&IndicatorColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Insert a derived column, replacing any existing column with the same name.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        let name = name.into();
        debug_assert_eq!(values.len(), self.rows.len(), "column {name} misaligned");
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(IndicatorColumn { name, values }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    pub(crate) fn observation(minute: i64, open: f64, high: f64, low: f64, close: f64) -> Observation {
        let base = FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
            .unwrap();
        Observation {
            timestamp: base + Duration::minutes(minute),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    pub(crate) fn series_from_closes(closes: &[f64]) -> Series {
        let rows = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| observation(i as i64, c, c, c, c))
            .collect();
        Series::new("TEST", Period::Day1, Interval::Min1, rows)
    }

    #[test]
    fn period_round_trip() {
        for s in ["1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max"] {
            assert_eq!(Period::from_str(s).map(Period::as_str), Some(s));
        }
        assert_eq!(Period::from_str("2d"), None);
    }

    #[test]
    fn interval_round_trip() {
        for s in [
            "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
        ] {
            assert_eq!(Interval::from_str(s).map(Interval::as_str), Some(s));
        }
        assert_eq!(Interval::from_str("3m"), None);
    }

    #[test]
    fn defaults_match_dashboard_window() {
        assert_eq!(Period::default().as_str(), "1d");
        assert_eq!(Interval::default().as_str(), "1m");
        assert_eq!(RefreshRate::default().secs(), 15);
    }

    #[test]
    fn minute_and_hour_intervals_are_intraday() {
        assert!(Interval::Min1.is_intraday());
        assert!(Interval::Min90.is_intraday());
        assert!(!Interval::Day1.is_intraday());
        assert!(!Interval::Month3.is_intraday());
    }

    #[test]
    fn refresh_rate_bounds() {
        assert!(RefreshRate::new(4).is_none());
        assert!(RefreshRate::new(61).is_none());
        let min = RefreshRate::new(5).unwrap();
        let max = RefreshRate::new(60).unwrap();
        assert_eq!(min.decrement(), min);
        assert_eq!(max.increment(), max);
        assert_eq!(min.increment().secs(), 6);
    }

    #[test]
    fn ticker_is_trimmed_and_upper_cased() {
        assert_eq!(normalize_ticker("  infy.ns "), Some("INFY.NS".to_owned()));
        assert_eq!(normalize_ticker("   "), None);
    }

    #[test]
    fn series_orders_rows_and_drops_duplicate_timestamps() {
        let rows = vec![
            observation(2, 3.0, 3.0, 3.0, 3.0),
            observation(0, 1.0, 1.0, 1.0, 1.0),
            observation(2, 4.0, 4.0, 4.0, 4.0),
            observation(1, 2.0, 2.0, 2.0, 2.0),
        ];
        let series = Series::new("AAPL", Period::Day1, Interval::Min1, rows);
        assert_eq!(series.closes(), vec![1.0, 2.0, 4.0]);
        assert!(
            series
                .rows()
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
        );
    }

    #[test]
    fn set_column_replaces_existing() {
        let mut series = series_from_closes(&[1.0, 2.0]);
        series.set_column("X", vec![None, Some(1.0)]);
        series.set_column("X", vec![Some(5.0), Some(6.0)]);
        assert_eq!(series.columns().len(), 1);
        assert_eq!(series.column("X").unwrap().values, vec![Some(5.0), Some(6.0)]);
    }
}

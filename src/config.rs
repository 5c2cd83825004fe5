use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::dashboard::DEFAULT_TAIL_ROWS;
use crate::error::ConfigError;
use crate::model::{Interval, Period, RefreshRate, normalize_ticker};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_log_file() -> String {
    "ticker-dashboard.log".into()
}

fn default_ticker() -> String {
    "AAPL".into()
}

fn default_refresh_secs() -> u64 {
    RefreshRate::DEFAULT
}

fn default_period() -> String {
    Period::default().as_str().into()
}

fn default_interval() -> String {
    Interval::default().as_str().into()
}

fn default_tail_rows() -> usize {
    DEFAULT_TAIL_ROWS
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Log destination while the terminal UI owns stdout.
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: default_log_file(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_ticker")]
    pub ticker: String,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_tail_rows")]
    pub tail_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            refresh_secs: default_refresh_secs(),
            period: default_period(),
            interval: default_interval(),
            tail_rows: default_tail_rows(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            requests_per_minute: default_requests_per_minute(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Parse an `AppConfig` from a TOML file at `path`.
///
/// Not validated here: command-line overrides are applied first, then the
/// caller runs [`validate`].
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    Ok(config)
}

/// Load from `path` when given, otherwise fall back to built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, Report<ConfigError>> {
    match path {
        Some(path) => load(path),
        None => Ok(AppConfig::default()),
    }
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

pub fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(&config.general)?;
    validate_dashboard(&config.dashboard)?;
    validate_provider(&config.provider)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(general: &GeneralConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not one of {VALID_LOG_FORMATS:?}",
            general.log_format
        )));
    }
    Ok(())
}

fn validate_dashboard(dashboard: &DashboardConfig) -> Result<(), Report<ConfigError>> {
    if normalize_ticker(&dashboard.ticker).is_none() {
        return Err(invalid("dashboard.ticker must not be empty".into()));
    }
    if RefreshRate::new(dashboard.refresh_secs).is_none() {
        return Err(invalid(format!(
            "dashboard.refresh_secs {} is outside {}..={}",
            dashboard.refresh_secs,
            RefreshRate::MIN,
            RefreshRate::MAX
        )));
    }
    if Period::from_str(&dashboard.period).is_none() {
        return Err(invalid(format!(
            "dashboard.period: unknown period \"{}\"",
            dashboard.period
        )));
    }
    if Interval::from_str(&dashboard.interval).is_none() {
        return Err(invalid(format!(
            "dashboard.interval: unknown interval \"{}\"",
            dashboard.interval
        )));
    }
    if dashboard.tail_rows == 0 {
        return Err(invalid("dashboard.tail_rows must be > 0".into()));
    }
    Ok(())
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), Report<ConfigError>> {
    if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://") {
        return Err(invalid(format!(
            "provider.base_url \"{}\" must be an http(s) URL",
            provider.base_url
        )));
    }
    if provider.requests_per_minute == 0 {
        return Err(invalid("provider.requests_per_minute must be > 0".into()));
    }
    if provider.timeout_secs == 0 {
        return Err(invalid("provider.timeout_secs must be > 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
log_file = "/tmp/dashboard.log"

[dashboard]
ticker = "tsla"
refresh_secs = 30
period = "5d"
interval = "5m"
tail_rows = 10

[provider]
base_url = "https://query2.finance.yahoo.com"
requests_per_minute = 12
timeout_secs = 5
"#;
        let config = parse(toml);
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.dashboard.ticker, "tsla");
        assert_eq!(config.dashboard.refresh_secs, 30);
        assert_eq!(config.dashboard.tail_rows, 10);
        assert_eq!(config.provider.requests_per_minute, 12);
    }

    #[test]
    fn defaults_applied_when_sections_omitted() {
        let config = parse("");
        assert!(validate(&config).is_ok());
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.dashboard.ticker, "AAPL");
        assert_eq!(config.dashboard.refresh_secs, 15);
        assert_eq!(config.dashboard.period, "1d");
        assert_eq!(config.dashboard.interval, "1m");
        assert_eq!(config.dashboard.tail_rows, 5);
        assert_eq!(config.provider.base_url, "https://query1.finance.yahoo.com");
    }

    #[test]
    fn missing_path_uses_defaults() {
        let config = load_or_default(None).unwrap();
        assert_eq!(config.dashboard.ticker, "AAPL");
    }

    #[test]
    fn unreadable_file_rejected() {
        let result = load(Path::new("/nonexistent/ticker-dashboard.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_leaves_validation_to_caller() {
        let path = std::env::temp_dir().join(format!("ticker-dashboard-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[dashboard]\nrefresh_secs = 90\n").unwrap();
        let loaded = load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.dashboard.refresh_secs, 90);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn refresh_outside_bounds_rejected() {
        for secs in [4, 61] {
            let config = parse(&format!("[dashboard]\nrefresh_secs = {secs}\n"));
            assert!(validate(&config).is_err(), "refresh_secs = {secs}");
        }
    }

    #[test]
    fn unknown_period_rejected() {
        let config = parse("[dashboard]\nperiod = \"2d\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_interval_rejected() {
        let config = parse("[dashboard]\ninterval = \"3m\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn blank_ticker_rejected() {
        let config = parse("[dashboard]\nticker = \"  \"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let config = parse("[general]\nlog_format = \"xml\"\n");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let config = parse("[provider]\nrequests_per_minute = 0\n");
        assert!(validate(&config).is_err());
    }
}

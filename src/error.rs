use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum ProviderError {
    #[display("invalid ticker: {ticker:?}")]
    InvalidTicker { ticker: String },
    #[display("failed to connect to {provider}")]
    Connection { provider: String },
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
    #[display("rate limit exceeded for {provider}")]
    RateLimit { provider: String },
    #[display("{provider} reported {code}: {description}")]
    Provider {
        provider: String,
        code: String,
        description: String,
    },
}

#[derive(Debug, Display, Error)]
pub enum UiError {
    #[display("terminal setup failed")]
    Terminal,
    #[display("failed to draw frame")]
    Draw,
    #[display("failed to read terminal input")]
    Input,
}

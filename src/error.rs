use thiserror::Error;

/// Errors that can occur while configuring or running the metrics
/// pipeline.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// A custom error with a free-form message.
    #[error("Custom error: {0}")]
    Custom(String),

    /// Invalid client or server configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// A watch expression that could not be parsed.
    #[error("Invalid watch expression: {0}")]
    WatchExpr(String),

    /// An I/O error from the standard library.
    #[error("Std Io error: {0}")]
    StdIo(#[from] std::io::Error),
}

impl From<String> for MetricsError {
    fn from(value: String) -> Self {
        Self::Custom(value)
    }
}

impl From<&str> for MetricsError {
    fn from(value: &str) -> Self {
        Self::Custom(value.to_string())
    }
}

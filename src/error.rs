//! Error handling for the procgauge agent.

/// A specialized `Result` type for procgauge operations.
pub type Result<T> = std::result::Result<T, SystemError>;

/// The main error type for procgauge operations.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metric registry error
    #[error("Registry error: {0}")]
    Registry(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Generic system error
    #[error("System error: {0}")]
    System(String),
}

impl SystemError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new registry error
    pub fn registry_error(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new generic system error
    #[allow(clippy::self_named_constructors)]
    pub fn system_error(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }
}

impl From<prometheus::Error> for SystemError {
    fn from(err: prometheus::Error) -> Self {
        Self::Registry(err.to_string())
    }
}

impl From<serde_json::Error> for SystemError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

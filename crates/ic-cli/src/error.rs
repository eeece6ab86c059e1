//! CLI error types.

use ic_connector::ConnectorError;
use ic_directory::DirectoryError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error reported by the connector.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// The directory rejected the credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error.
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<DirectoryError> for CliError {
    fn from(err: DirectoryError) -> Self {
        Self::Connector(err.into())
    }
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

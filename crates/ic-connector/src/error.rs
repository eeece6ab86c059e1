//! Connector error types.
//!
//! Every backend translates its native failures into [`ConnectorError`],
//! and every `ConnectorError` belongs to exactly one [`ErrorKind`]. Callers
//! that only need to decide "retry, re-prompt, or give up" match on the kind.
//!
//! ## Security Note
//!
//! Error messages must not contain passwords or bind credentials.

use thiserror::Error;

/// Coarse classification of connector failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Recoverable condition such as a referral or partial result.
    Transient,
    /// Connection, TLS, timeout or protocol failure. Fatal to the operation.
    Connection,
    /// The backend rejected the supplied credentials.
    Authentication,
    /// A result could not be converted into the domain model.
    Mapper,
    /// The connector is misconfigured.
    Configuration,
    /// The requested principal does not exist.
    NotFound,
    /// The connector does not support the operation.
    Unsupported,
}

impl ErrorKind {
    /// Returns true if the failure ends the operation.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Transient | Self::NotFound)
    }
}

/// Errors that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection error to the backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Protocol error reported by the backend.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Principal not found.
    #[error("Principal not found: {0}")]
    PrincipalNotFound(String),

    /// A backend result could not be mapped.
    #[error("Attribute mapping error: {0}")]
    AttributeMapping(String),

    /// Recoverable condition surfaced to the caller.
    #[error("Partial result: {0}")]
    PartialResult(String),

    /// Operation not supported by this connector.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Connector is read-only.
    #[error("Connector is read-only: cannot {0}")]
    ReadOnly(String),

    /// The principal is not in a state the operation applies to, such as
    /// unlocking an account that is not locked.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal error.
    #[error("Internal connector error: {0}")]
    Internal(String),
}

impl ConnectorError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Creates a principal not found error.
    #[must_use]
    pub fn not_found(principal: impl Into<String>) -> Self {
        Self::PrincipalNotFound(principal.into())
    }

    /// Creates a mapping error.
    #[must_use]
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::AttributeMapping(msg.into())
    }

    /// Creates a not supported error.
    #[must_use]
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported(operation.into())
    }

    /// Creates a read-only error.
    #[must_use]
    pub fn read_only(operation: impl Into<String>) -> Self {
        Self::ReadOnly(operation.into())
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Connection(_)
            | Self::Tls(_)
            | Self::Timeout(_)
            | Self::Protocol(_)
            | Self::Internal(_) => ErrorKind::Connection,
            Self::AuthenticationFailed(_) => ErrorKind::Authentication,
            Self::PrincipalNotFound(_) => ErrorKind::NotFound,
            Self::AttributeMapping(_) => ErrorKind::Mapper,
            Self::PartialResult(_) => ErrorKind::Transient,
            Self::NotSupported(_) | Self::ReadOnly(_) | Self::InvalidState(_) => {
                ErrorKind::Unsupported
            }
        }
    }

    /// Checks if this is an authentication error.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Authentication)
    }

    /// Checks if this is a connection error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection)
    }

    /// Checks if this is a principal not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::PrincipalNotFound(_))
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

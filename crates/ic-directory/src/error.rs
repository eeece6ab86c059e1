//! Directory error types.
//!
//! ## Security Note
//!
//! Error messages must not leak passwords or bind credentials.

use ic_connector::ConnectorError;
use thiserror::Error;

/// LDAP result codes the connector treats specially.
pub mod result_code {
    /// Partial results (LDAPv2 referral).
    pub const PARTIAL_RESULTS: u32 = 9;
    /// Referral.
    pub const REFERRAL: u32 = 10;
    /// A value to remove is not present.
    pub const NO_SUCH_ATTRIBUTE: u32 = 16;
    /// A value to add is already present.
    pub const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
    /// The base entry of a search does not exist.
    pub const NO_SUCH_OBJECT: u32 = 32;
    /// Invalid credentials.
    pub const INVALID_CREDENTIALS: u32 = 49;
    /// Unwilling to perform (for example a disabled account or empty password).
    pub const UNWILLING_TO_PERFORM: u32 = 53;
    /// The entry to add already exists.
    pub const ALREADY_EXISTS: u32 = 68;
}

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Invalid configuration.
    #[error("Directory configuration error: {0}")]
    Configuration(String),

    /// Connection could not be established to any host.
    #[error("Directory connection failed: {0}")]
    Connection(String),

    /// Bind was rejected.
    #[error("Directory bind failed: {0}")]
    Bind(String),

    /// The server returned a referral or partial result while referrals are
    /// being followed.
    #[error("Referral received from {base}: {message}")]
    Referral {
        /// Base DN of the search.
        base: String,
        /// Server diagnostic.
        message: String,
    },

    /// The server returned an error result code.
    #[error("Directory operation failed with result code {code}: {message}")]
    Operation {
        /// LDAP result code.
        code: u32,
        /// Server diagnostic.
        message: String,
    },

    /// Malformed distinguished name.
    #[error("Invalid DN '{dn}': {reason}")]
    InvalidDn {
        /// The offending value.
        dn: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Malformed control in a response.
    #[error("Malformed control: {0}")]
    Control(String),

    /// A result entry could not be mapped.
    #[error("Mapping error: {0}")]
    Mapper(String),

    /// No entry matched a lookup.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Writes are refused over this connection.
    #[error("Directory is read-only: cannot {0}")]
    ReadOnly(String),

    /// The entry is not in a state the operation applies to.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// `next` was called on an exhausted search.
    #[error("No more elements in search")]
    NoSuchElement,

    /// Underlying ldap3 error.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

impl DirectoryError {
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

    /// Creates a mapping error.
    #[must_use]
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapper(msg.into())
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Classifies a non-success LDAP result code.
    #[must_use]
    pub fn from_result_code(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            result_code::INVALID_CREDENTIALS | result_code::UNWILLING_TO_PERFORM => {
                Self::Bind(format!("result code {code}: {message}"))
            }
            _ => Self::Operation { code, message },
        }
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Ldap3(_))
    }

    /// Checks if the server rejected credentials.
    #[must_use]
    pub fn is_invalid_credentials(&self) -> bool {
        match self {
            Self::Bind(_) => true,
            Self::Ldap3(ldap3::LdapError::LdapResult { result }) => matches!(
                result.rc,
                result_code::INVALID_CREDENTIALS | result_code::UNWILLING_TO_PERFORM
            ),
            _ => false,
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl From<DirectoryError> for ConnectorError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Configuration(msg) => Self::Configuration(msg),
            DirectoryError::Connection(msg) => Self::Connection(msg),
            DirectoryError::Bind(msg) => Self::AuthenticationFailed(msg),
            DirectoryError::Referral { .. } => Self::PartialResult(err.to_string()),
            DirectoryError::Operation { code, message } => match code {
                result_code::PARTIAL_RESULTS | result_code::REFERRAL => {
                    Self::PartialResult(message)
                }
                _ => Self::Protocol(format!("result code {code}: {message}")),
            },
            DirectoryError::InvalidDn { .. } => Self::Configuration(err.to_string()),
            DirectoryError::Control(msg) => Self::Protocol(msg),
            DirectoryError::Mapper(msg) => Self::AttributeMapping(msg),
            DirectoryError::NotFound(what) => Self::PrincipalNotFound(what),
            DirectoryError::ReadOnly(op) => Self::ReadOnly(op),
            DirectoryError::InvalidState(msg) => Self::InvalidState(msg),
            DirectoryError::NoSuchElement => Self::Internal(err.to_string()),
            DirectoryError::Ldap3(e) => match e {
                ldap3::LdapError::LdapResult { result } => {
                    DirectoryError::from_result_code(result.rc, result.text).into()
                }
                ldap3::LdapError::Timeout { .. } => Self::Timeout(e.to_string()),
                other => Self::Connection(other.to_string()),
            },
        }
    }
}

impl From<ConnectorError> for DirectoryError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Configuration(msg) => Self::Configuration(msg),
            other => Self::Connection(other.to_string()),
        }
    }
}

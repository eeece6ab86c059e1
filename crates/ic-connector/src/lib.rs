//! # ic-connector
//!
//! Connector framework for identity stores.
//!
//! This crate provides the traits every identity connector implements, the
//! shared error taxonomy, and the multi-valued configuration map connectors
//! are configured from.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod filter;
pub mod provider;

pub use config::ConnectorConfig;
pub use error::{ConnectorError, ConnectorResult, ErrorKind};
pub use filter::NameFilter;
pub use provider::{
    first_principal, Connector, ConnectorCapability, ConnectorWriter, CredentialValidator,
    PrincipalIter,
};

//! # ic-cli
//!
//! The `icx` command-line tool.
//!
//! `icx` loads a connector configuration from a TOML file and queries the
//! directory it describes:
//! - list or look up identities and roles
//! - list organizational units
//! - check a password by binding as the user
//! - verify the service account connection

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};

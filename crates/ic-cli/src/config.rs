//! CLI configuration.
//!
//! A configuration file names the connector type and carries the
//! connector's key map as a table:
//!
//! ```toml
//! type = "active-directory"
//! output_format = "table"
//!
//! [connector]
//! "directory.hostname" = ["dc1.example.com", "dc2.example.com:636"]
//! "directory.serviceAccountUsername" = "svc-icx"
//! "directory.serviceAccountPassword" = "..."
//! "activeDirectory.includeDefaultUsers" = true
//! ```

use std::path::Path;

use ic_connector::ConnectorConfig;
use serde::{Deserialize, Serialize};

use crate::{CliError, CliResult};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "icx.toml";

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Connector to build.
    #[serde(rename = "type", default)]
    pub connector_type: ConnectorType,

    /// Output format used when `--output` is not given.
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Connector key map.
    #[serde(default)]
    pub connector: ConnectorConfig,
}

impl CliConfig {
    /// Loads configuration from `path`.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Err(CliError::Config(format!(
                "configuration file {} not found",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses a configuration document.
    pub fn parse(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Gets the effective output format (from args or config).
    pub fn effective_output(&self, arg_output: Option<OutputFormat>) -> OutputFormat {
        arg_output.unwrap_or(self.output_format)
    }
}

/// Connector type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectorType {
    /// Generic LDAP directory.
    #[default]
    Directory,
    /// Active Directory.
    ActiveDirectory,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

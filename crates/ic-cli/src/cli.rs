//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{OutputFormat, DEFAULT_CONFIG_FILE};

/// icx - query identities, roles and credentials through a directory connector.
#[derive(Debug, Parser)]
#[command(name = "icx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, env = "ICX_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output format (overrides config).
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List identities, or look one up.
    Identities {
        /// Principal name to look up.
        #[arg(long, conflicts_with = "guid")]
        name: Option<String>,

        /// Identifier to look up.
        #[arg(long)]
        guid: Option<String>,
    },

    /// List roles, or look one up.
    Roles {
        /// Role name to look up.
        #[arg(long)]
        name: Option<String>,
    },

    /// List organizational units.
    Ous,

    /// Check a password by binding as the user.
    CheckCredentials {
        /// DN of the user. Active Directory also accepts an account name.
        principal: String,

        /// Password. Prompted for when not given.
        #[arg(long, env = "ICX_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Verify the service account can connect.
    Status,
}

//! Role commands.

use ic_directory::{ClientFactory, DirectoryRole};
use ic_model::Principal;
use tabled::Tabled;

use crate::config::OutputFormat;
use crate::output::output;
use crate::CliResult;

use super::{collect, ConnectorHandle};

/// Role representation for display.
#[derive(Debug, Clone, Tabled)]
pub struct RoleRow {
    /// Role name.
    pub name: String,
    /// Backend identifier.
    pub guid: String,
    /// Entry DN.
    pub dn: String,
}

impl From<&DirectoryRole> for RoleRow {
    fn from(role: &DirectoryRole) -> Self {
        Self {
            name: role.principal_name().to_string(),
            guid: role.guid().to_string(),
            dn: role.dn().to_string(),
        }
    }
}

/// Lists roles, or looks one up by name.
pub fn run_roles<F>(
    handle: &ConnectorHandle<F>,
    name: Option<&str>,
    output_format: OutputFormat,
) -> CliResult<()>
where
    F: ClientFactory,
    F::Client: 'static,
{
    let connector = handle.connector();
    let roles = match name {
        Some(name) => vec![connector.role_by_name(name)?],
        None => collect(connector.all_roles()?)?,
    };
    output(&roles, output_format, |r| RoleRow::from(r))
}

//! Identity commands.

use ic_directory::{ClientFactory, DirectoryIdentity};
use tabled::Tabled;

use crate::config::OutputFormat;
use crate::output::{label, output};
use crate::CliResult;

use super::{collect, ConnectorHandle};

/// Identity representation for display.
#[derive(Debug, Clone, Tabled)]
pub struct IdentityRow {
    /// Principal name.
    pub name: String,
    /// Display name.
    pub full_name: String,
    /// Email address.
    pub email: String,
    /// Account status.
    pub account: String,
    /// Password status.
    pub password: String,
    /// Role names.
    pub roles: String,
    /// Backend identifier.
    pub guid: String,
}

impl From<&DirectoryIdentity> for IdentityRow {
    fn from(identity: &DirectoryIdentity) -> Self {
        Self {
            name: identity.principal_name.clone(),
            full_name: identity.full_name.clone().unwrap_or_default(),
            email: identity.email.clone().unwrap_or_default(),
            account: label(&identity.account_status.status),
            password: label(&identity.password_status.status),
            roles: identity
                .roles
                .iter()
                .map(|r| r.principal_name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            guid: identity.guid.clone(),
        }
    }
}

/// Lists identities, or looks one up by name or identifier.
pub fn run_identities<F>(
    handle: &ConnectorHandle<F>,
    name: Option<&str>,
    guid: Option<&str>,
    output_format: OutputFormat,
) -> CliResult<()>
where
    F: ClientFactory,
    F::Client: 'static,
{
    let connector = handle.connector();
    let identities = match (name, guid) {
        (Some(name), _) => vec![connector.identity_by_name(name)?],
        (None, Some(guid)) => vec![connector.identity_by_guid(guid)?],
        (None, None) => collect(connector.all_identities()?)?,
    };
    output(&identities, output_format, |i| IdentityRow::from(i))
}

//! Command implementations.

pub mod credentials;
pub mod identity;
pub mod ou;
pub mod role;
pub mod status;

pub use credentials::run_check_credentials;
pub use identity::run_identities;
pub use ou::run_ous;
pub use role::run_roles;
pub use status::run_status;

use ic_active_directory::{ActiveDirectoryConfig, ActiveDirectoryConnector};
use ic_connector::{Connector, ConnectorResult, CredentialValidator};
use ic_directory::{
    ClientFactory, DirectoryConfig, DirectoryConnector, DirectoryIdentity, DirectoryRole,
    LdapClientFactory, OrganizationalUnit,
};
use tracing::debug;

use crate::config::{CliConfig, ConnectorType};
use crate::CliResult;

/// The connector a configuration file describes.
pub enum ConnectorHandle<F: ClientFactory = LdapClientFactory> {
    /// Generic LDAP directory.
    Directory(DirectoryConnector<F>),
    /// Active Directory.
    ActiveDirectory(ActiveDirectoryConnector<F>),
}

impl ConnectorHandle {
    /// Builds the configured connector. No connection is opened yet.
    pub fn new(config: &CliConfig) -> CliResult<Self> {
        let handle = match config.connector_type {
            ConnectorType::Directory => {
                let directory = DirectoryConfig::from_connector_config(&config.connector)?;
                Self::Directory(DirectoryConnector::new(directory))
            }
            ConnectorType::ActiveDirectory => {
                let ad = ActiveDirectoryConfig::from_connector_config(&config.connector)?;
                Self::ActiveDirectory(ActiveDirectoryConnector::new(ad))
            }
        };
        debug!(connector = handle.connector().connector_type(), "Connector configured");
        Ok(handle)
    }
}

impl<F> ConnectorHandle<F>
where
    F: ClientFactory,
    F::Client: 'static,
{
    /// Returns the connector.
    pub fn connector(&self) -> &dyn Connector<Identity = DirectoryIdentity, Role = DirectoryRole> {
        match self {
            Self::Directory(c) => c,
            Self::ActiveDirectory(c) => c,
        }
    }

    /// Returns the credential validator.
    pub fn validator(&self) -> &dyn CredentialValidator {
        match self {
            Self::Directory(c) => c,
            Self::ActiveDirectory(c) => c,
        }
    }

    /// Lists organizational units in scope.
    pub fn organizational_units(&self) -> CliResult<Vec<OrganizationalUnit>> {
        let units = match self {
            Self::Directory(c) => c.organizational_units()?.collect::<Result<Vec<_>, _>>()?,
            Self::ActiveDirectory(c) => c.organizational_units()?.collect::<Result<Vec<_>, _>>()?,
        };
        Ok(units)
    }

    /// Binds as `principal`.
    ///
    /// Active Directory accepts an account name as well as a DN.
    pub fn check_credentials(&self, principal: &str, password: &str) -> CliResult<bool> {
        let accepted = match self {
            Self::Directory(c) => c.check_credentials_by_dn(principal, password)?,
            Self::ActiveDirectory(c) if principal.contains('=') => {
                c.check_credentials_by_dn(principal, password)?
            }
            Self::ActiveDirectory(c) => c.check_credentials_by_name(principal, password)?,
        };
        Ok(accepted)
    }
}

/// Drains a principal sequence, stopping at the first error.
pub fn collect<T>(iter: impl Iterator<Item = ConnectorResult<T>>) -> CliResult<Vec<T>> {
    Ok(iter.collect::<ConnectorResult<Vec<T>>>()?)
}

//! Active Directory configuration.
//!
//! [`ActiveDirectoryConfig`] reads the same `directory.*` keys as the
//! generic connector with AD schema defaults, and derives what an AD
//! deployment usually leaves implicit:
//!
//! - the base DN from the domain (`example.com` becomes `DC=example,DC=com`)
//! - the domain from the first controller host name, or from the base DN
//! - the service account as `user@domain` or a DN under the base
//! - scoping of the built-in `CN=Users` and `CN=Builtin` containers

use std::net::IpAddr;

use ic_connector::ConnectorConfig;
use ic_directory::config::{keys as directory_keys, parse_host};
use ic_directory::{DirectoryConfig, DirectoryError, DirectoryResult, Dn, SecurityProtocol};
use serde::Serialize;
use tracing::debug;

/// Configuration keys specific to Active Directory.
pub mod keys {
    /// DNS domain of the directory.
    pub const DOMAIN: &str = "directory.domain";
    /// Controllers of child domains.
    pub const CHILD_DOMAIN_CONTROLLERS: &str = "directory.childDomainControllers";
    /// Whether controllers are contacted on the global catalog ports.
    pub const GLOBAL_CATALOG: &str = "directory.isGlobalCatalog";
    /// Whether the `CN=Users` container is in scope.
    pub const INCLUDE_DEFAULT_USERS: &str = "activeDirectory.includeDefaultUsers";
    /// Whether the `CN=Builtin` container is in scope.
    pub const INCLUDE_BUILTIN_GROUPS: &str = "activeDirectory.includeBuiltInGroups";
}

/// Container of the default user accounts.
pub const CN_USERS: &str = "CN=Users";

/// Container of the built-in groups.
pub const CN_BUILTIN: &str = "CN=Builtin";

/// Global catalog port over plain LDAP.
pub const GLOBAL_CATALOG_PORT: u16 = 3268;

/// Global catalog port over TLS.
pub const GLOBAL_CATALOG_SSL_PORT: u16 = 3269;

/// Active Directory connector configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveDirectoryConfig {
    /// Underlying directory configuration, with AD defaults applied.
    pub directory: DirectoryConfig,

    /// DNS domain. Empty when it cannot be derived.
    pub domain: String,

    /// Controllers of child domains.
    pub child_domain_controllers: Vec<String>,

    /// Whether controllers are contacted on the global catalog ports.
    pub global_catalog: bool,

    /// Whether `CN=Users` is in scope.
    pub include_default_users: bool,

    /// Whether `CN=Builtin` is in scope.
    pub include_builtin_groups: bool,
}

impl ActiveDirectoryConfig {
    /// Reads the configuration, applying AD defaults for absent keys.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - Neither a base DN nor a domain is available
    /// - A value is malformed
    /// - The resulting directory configuration is invalid
    pub fn from_connector_config(config: &ConnectorConfig) -> DirectoryResult<Self> {
        let mut config = config.clone();

        let domain = domain_of(&config)?;
        let base_dn = match config.get(directory_keys::BASE_DN).map(str::trim) {
            Some(base) if !base.is_empty() => Dn::parse(base)?,
            _ if domain.is_empty() => {
                return Err(DirectoryError::config(format!(
                    "{} is required when {} cannot be derived",
                    directory_keys::BASE_DN,
                    keys::DOMAIN
                )));
            }
            _ => {
                let base = domain_to_base_dn(&domain)?;
                config.set(directory_keys::BASE_DN, vec![base.to_string()]);
                base
            }
        };

        if let Some(username) = config.get(directory_keys::SERVICE_ACCOUNT_USERNAME) {
            let username = build_username(&base_dn, &domain, username.trim());
            config.set(directory_keys::SERVICE_ACCOUNT_USERNAME, vec![username]);
        }

        let include_default_users =
            scope_container(&mut config, &base_dn, CN_USERS, keys::INCLUDE_DEFAULT_USERS)?;
        let include_builtin_groups =
            scope_container(&mut config, &base_dn, CN_BUILTIN, keys::INCLUDE_BUILTIN_GROUPS)?;

        let mut directory = DirectoryConfig::builder()
            .identity_schema("user", "sAMAccountName", "objectGUID")
            .identity_profile("mail", "displayName")
            .role_schema("group", "cn", "objectGUID")
            .member_of_attribute("memberOf")
            .creation_object_classes(
                &["top", "person", "organizationalPerson", "user"],
                &["top", "group"],
            )
            .identity_password_attribute("unicodePwd")
            .apply(&config)?
            .build()?;

        let global_catalog = config.get_bool_or(keys::GLOBAL_CATALOG, false)?;
        if global_catalog {
            directory.hosts = directory
                .hosts
                .iter()
                .map(|host| with_global_catalog_port(host, directory.security))
                .collect::<DirectoryResult<_>>()?;
        }

        let child_domain_controllers = config
            .get_all(keys::CHILD_DOMAIN_CONTROLLERS)
            .into_iter()
            .map(str::to_string)
            .collect();

        debug!(
            domain = %domain,
            base_dn = %directory.base_dn,
            global_catalog,
            include_default_users,
            include_builtin_groups,
            "Active Directory configuration loaded"
        );

        Ok(Self {
            directory,
            domain,
            child_domain_controllers,
            global_catalog,
            include_default_users,
            include_builtin_groups,
        })
    }

    /// DN of the `CN=Users` container.
    pub fn default_users_dn(&self) -> DirectoryResult<Dn> {
        self.directory.base_dn.join(CN_USERS)
    }

    /// DN of the `CN=Builtin` container.
    pub fn builtin_groups_dn(&self) -> DirectoryResult<Dn> {
        self.directory.base_dn.join(CN_BUILTIN)
    }
}

/// Adds `container` to the includes or excludes unless the configuration
/// already mentions it. Returns whether the container ends up in scope.
fn scope_container(
    config: &mut ConnectorConfig,
    base: &Dn,
    container: &str,
    flag_key: &str,
) -> DirectoryResult<bool> {
    let target = Dn::parse(container)?.rebase_onto(base);
    let mentions = |config: &ConnectorConfig, key: &str| -> DirectoryResult<bool> {
        for value in config.get_all(key) {
            if Dn::parse(value)?.rebase_onto(base) == target {
                return Ok(true);
            }
        }
        Ok(false)
    };

    let flag = config.get_bool_or(flag_key, false)?;
    let included = mentions(config, directory_keys::INCLUDES)?;
    let excluded = mentions(config, directory_keys::EXCLUDES)?;

    if !included && !excluded {
        if !flag {
            config.append(directory_keys::EXCLUDES, [container.to_string()]);
        } else if !config.get_all(directory_keys::INCLUDES).is_empty() {
            config.append(directory_keys::INCLUDES, [container.to_string()]);
        }
    }
    Ok((flag || included) && !excluded)
}

/// Derives the domain from `directory.domain`, the first controller host
/// name, or the `DC` components of the base DN, in that order.
fn domain_of(config: &ConnectorConfig) -> DirectoryResult<String> {
    if let Some(domain) = config.get(keys::DOMAIN).map(str::trim).filter(|d| !d.is_empty()) {
        return Ok(domain.to_string());
    }

    if let Some(host) = config.get_all(directory_keys::HOSTNAME).first() {
        let (name, _) = parse_host(host)?;
        if name.parse::<IpAddr>().is_err() {
            return Ok(name
                .split_once('.')
                .map(|(_, domain)| domain.to_string())
                .unwrap_or_default());
        }
    }

    match config.get(directory_keys::BASE_DN) {
        Some(base) => Ok(domain_of_dn(&Dn::parse(base)?)),
        None => Ok(String::new()),
    }
}

/// Joins the `DC` components of a DN, for example
/// `OU=Staff,DC=emea,DC=example,DC=com` gives `emea.example.com`.
#[must_use]
pub fn domain_of_dn(dn: &Dn) -> String {
    dn.rdns()
        .filter(|rdn| rdn.attr().eq_ignore_ascii_case("dc"))
        .map(|rdn| rdn.value().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(".")
}

/// Builds the base DN of a domain.
pub fn domain_to_base_dn(domain: &str) -> DirectoryResult<Dn> {
    let dn = domain
        .split('.')
        .filter(|label| !label.trim().is_empty())
        .map(|label| format!("DC={}", label.trim()))
        .collect::<Vec<_>>()
        .join(",");
    Dn::parse(&dn)
}

/// Qualifies the service account name.
///
/// A `CN=` name is completed with the base DN. Any other name not already
/// ending in the domain becomes `name@domain`.
#[must_use]
pub fn build_username(base: &Dn, domain: &str, username: &str) -> String {
    let upper = username.to_ascii_uppercase();
    if upper.starts_with("CN=") {
        if let Ok(dn) = Dn::parse(username.trim_end_matches(',')) {
            if dn.is_descendant_of(base) {
                return username.to_string();
            }
        }
        return format!("{},{base}", username.trim_end_matches(','));
    }
    if domain.is_empty() || upper.ends_with(&domain.to_ascii_uppercase()) {
        return username.to_string();
    }
    format!("{username}@{}", domain.to_ascii_lowercase())
}

/// Appends the global catalog port to a host without an explicit port.
fn with_global_catalog_port(host: &str, security: SecurityProtocol) -> DirectoryResult<String> {
    let (name, port) = parse_host(host)?;
    if port.is_some() {
        return Ok(host.trim().to_string());
    }
    let name = if name.contains(':') {
        format!("[{name}]")
    } else {
        name.to_string()
    };
    let port = match security {
        SecurityProtocol::Ssl => GLOBAL_CATALOG_SSL_PORT,
        SecurityProtocol::Plain => GLOBAL_CATALOG_PORT,
    };
    Ok(format!("{name}:{port}"))
}

//! Directory connector configuration.
//!
//! [`DirectoryConfig`] is built either with [`DirectoryConfig::builder`] or
//! from the `directory.*` keys of a [`ConnectorConfig`].
//!
//! ## Security
//!
//! `ssl` (LDAPS) is the default protocol. Plain LDAP is accepted for lab
//! directories but logged as a warning when a connection is opened.

use std::time::Duration;

use ic_connector::{ConnectorConfig, NameFilter};
use serde::{Deserialize, Serialize};

use crate::dn::Dn;
use crate::error::{DirectoryError, DirectoryResult};
use crate::scope::IncludeExcludeRules;

/// Configuration keys read by [`DirectoryConfig::from_connector_config`].
pub mod keys {
    /// Primary controller host(s), `host` or `host:port`.
    pub const HOSTNAME: &str = "directory.hostname";
    /// Backup controller hosts.
    pub const BACKUP_HOSTNAMES: &str = "directory.backupHostnames";
    /// Search base.
    pub const BASE_DN: &str = "directory.baseDn";
    /// Service account bind DN.
    pub const SERVICE_ACCOUNT_USERNAME: &str = "directory.serviceAccountUsername";
    /// Service account password.
    pub const SERVICE_ACCOUNT_PASSWORD: &str = "directory.serviceAccountPassword";
    /// `ssl` or `plain`.
    pub const PROTOCOL: &str = "directory.protocol";
    /// Included subtrees.
    pub const INCLUDES: &str = "directory.includes";
    /// Excluded subtrees.
    pub const EXCLUDES: &str = "directory.excludes";
    /// Whether referrals are followed.
    pub const FOLLOW_REFERRALS: &str = "directory.followReferrals";
    /// Page size.
    pub const MAX_PAGE_SIZE: &str = "directory.maxPageSize";
    /// Connect timeout in seconds.
    pub const CONNECT_TIMEOUT: &str = "directory.timeout";
    /// Read timeout in milliseconds.
    pub const READ_TIMEOUT: &str = "directory.readTimeout";
    /// Identity object class.
    pub const IDENTITY_OBJECT_CLASS: &str = "directory.identityObjectClass";
    /// Identity login name attribute.
    pub const IDENTITY_NAME_ATTRIBUTE: &str = "directory.identityNameAttribute";
    /// Identity unique id attribute.
    pub const IDENTITY_GUID_ATTRIBUTE: &str = "directory.identityGuidAttribute";
    /// Identity email attribute.
    pub const IDENTITY_EMAIL_ATTRIBUTE: &str = "directory.identityEmailAttribute";
    /// Identity display name attribute.
    pub const IDENTITY_FULL_NAME_ATTRIBUTE: &str = "directory.identityFullNameAttribute";
    /// Identity attribute holding the guid of its role.
    pub const IDENTITY_ROLE_GUID_ATTRIBUTE: &str = "directory.identityRoleGuidAttribute";
    /// Identity attribute holding the name of its role.
    pub const IDENTITY_ROLE_NAME_ATTRIBUTE: &str = "directory.identityRoleNameAttribute";
    /// Identity attribute holding the DNs of its roles.
    pub const MEMBER_OF_ATTRIBUTE: &str = "directory.memberOfAttribute";
    /// Role object class.
    pub const ROLE_OBJECT_CLASS: &str = "directory.roleObjectClass";
    /// Role name attribute.
    pub const ROLE_NAME_ATTRIBUTE: &str = "directory.roleNameAttribute";
    /// Role unique id attribute.
    pub const ROLE_GUID_ATTRIBUTE: &str = "directory.roleGuidAttribute";
    /// Role mode.
    pub const ROLE_MODE: &str = "directory.roleMode";
    /// Included role names.
    pub const INCLUDE_ROLES: &str = "directory.includeRoles";
    /// Excluded role names.
    pub const EXCLUDE_ROLES: &str = "directory.excludeRoles";
    /// Included role subtrees.
    pub const INCLUDE_ROLES_DN: &str = "directory.includeRolesDN";
    /// Excluded role subtrees.
    pub const EXCLUDE_ROLES_DN: &str = "directory.excludeRolesDN";
    /// Container for new principals, relative to the domain root.
    pub const OU: &str = "directory.ou";
    /// Object classes of new identities.
    pub const IDENTITY_CREATION_OBJECT_CLASSES: &str = "directory.identityCreationObjectClasses";
    /// Object classes of new roles.
    pub const ROLE_CREATION_OBJECT_CLASSES: &str = "directory.roleCreationObjectClasses";
    /// Identity password attribute.
    pub const IDENTITY_PASSWORD_ATTRIBUTE: &str = "directory.identityPasswordAttribute";
    /// Role attribute listing member DNs.
    pub const ROLE_MEMBER_ATTRIBUTE: &str = "directory.roleMemberAttribute";
}

/// Default page size.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;

// ============================================================================
// Enums
// ============================================================================

/// Transport security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityProtocol {
    /// LDAP over TLS.
    #[default]
    Ssl,
    /// Unencrypted LDAP.
    Plain,
}

impl SecurityProtocol {
    /// Parses the `directory.protocol` value.
    pub fn parse(value: &str) -> DirectoryResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ssl" | "ldaps" => Ok(Self::Ssl),
            "plain" | "ldap" => Ok(Self::Plain),
            other => Err(DirectoryError::config(format!(
                "{} must be 'ssl' or 'plain', got '{other}'",
                keys::PROTOCOL
            ))),
        }
    }

    /// Default port for this protocol.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Ssl => 636,
            Self::Plain => 389,
        }
    }

    /// URL scheme for this protocol.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Ssl => "ldaps",
            Self::Plain => "ldap",
        }
    }
}

/// How roles are exposed and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleMode {
    /// Roles are not exposed.
    Disabled,
    /// Roles are filtered by name.
    #[default]
    PrincipalNames,
    /// Roles are filtered by DN subtree.
    DistinguishedNames,
    /// Roles are restricted by DN subtree in the server-side search.
    ServerDistinguishedNames,
}

impl RoleMode {
    /// Parses the `directory.roleMode` value.
    ///
    /// Accepts both `principalNames` and `PRINCIPAL_NAMES` spellings.
    pub fn parse(value: &str) -> DirectoryResult<Self> {
        let folded: String = value
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "disabled" => Ok(Self::Disabled),
            "principalnames" => Ok(Self::PrincipalNames),
            "distinguishednames" => Ok(Self::DistinguishedNames),
            "serverdistinguishednames" => Ok(Self::ServerDistinguishedNames),
            _ => Err(DirectoryError::config(format!(
                "invalid {} '{value}'",
                keys::ROLE_MODE
            ))),
        }
    }

    /// Whether roles are exposed at all.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

// ============================================================================
// Directory Configuration
// ============================================================================

/// Directory connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    // === Connection ===
    /// Controller hosts in failover order, `host` or `host:port`.
    pub hosts: Vec<String>,

    /// Transport security.
    pub security: SecurityProtocol,

    /// Service account bind DN.
    pub service_account_dn: String,

    /// Service account password.
    #[serde(skip_serializing, default)]
    pub service_account_password: String,

    /// Connect timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout of individual operations.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    // === Directory Structure ===
    /// Search base.
    pub base_dn: Dn,

    /// Subtree rules, rebased onto `base_dn`.
    pub rules: IncludeExcludeRules,

    /// Whether referrals and partial results are reported as errors.
    pub follow_referrals: bool,

    /// Page size.
    pub max_page_size: u32,

    // === Identities ===
    /// Identity object class.
    pub identity_object_class: String,

    /// Identity login name attribute.
    pub identity_name_attribute: String,

    /// Identity unique id attribute.
    pub identity_guid_attribute: String,

    /// Identity email attribute.
    pub identity_email_attribute: String,

    /// Identity display name attribute.
    pub identity_full_name_attribute: String,

    /// Identity attribute holding the guid of its role.
    pub identity_role_guid_attribute: Option<String>,

    /// Identity attribute holding the name of its role.
    pub identity_role_name_attribute: Option<String>,

    /// Identity attribute holding the DNs of the roles it is a member of.
    pub member_of_attribute: Option<String>,

    // === Roles ===
    /// Role mode.
    pub role_mode: RoleMode,

    /// Role object class.
    pub role_object_class: String,

    /// Role name attribute.
    pub role_name_attribute: String,

    /// Role unique id attribute.
    pub role_guid_attribute: String,

    /// Role name rules, applied in [`RoleMode::PrincipalNames`].
    pub role_names: NameFilter,

    /// Role subtree rules, applied in the distinguished name modes.
    pub role_dns: IncludeExcludeRules,

    // === Writes ===
    /// Container for new principals, relative to the domain root. `None`
    /// means `CN=Users`.
    pub ou: Option<Dn>,

    /// Object classes of new identities.
    pub identity_creation_object_classes: Vec<String>,

    /// Object classes of new roles.
    pub role_creation_object_classes: Vec<String>,

    /// Identity password attribute.
    pub identity_password_attribute: String,

    /// Role attribute listing member DNs.
    pub role_member_attribute: String,
}

impl DirectoryConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> DirectoryConfigBuilder {
        DirectoryConfigBuilder::new()
    }

    /// Reads the `directory.*` keys, applying defaults for absent ones.
    pub fn from_connector_config(config: &ConnectorConfig) -> DirectoryResult<Self> {
        Self::builder().apply(config)?.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(DirectoryError::config(format!("{} is required", keys::HOSTNAME)));
        }
        for host in &self.hosts {
            parse_host(host)?;
        }
        if self.service_account_dn.trim().is_empty() {
            return Err(DirectoryError::config(format!(
                "{} is required",
                keys::SERVICE_ACCOUNT_USERNAME
            )));
        }
        if self.max_page_size == 0 {
            return Err(DirectoryError::config(format!(
                "{} must be greater than 0",
                keys::MAX_PAGE_SIZE
            )));
        }
        for (key, value) in [
            (keys::IDENTITY_OBJECT_CLASS, &self.identity_object_class),
            (keys::IDENTITY_NAME_ATTRIBUTE, &self.identity_name_attribute),
            (keys::IDENTITY_GUID_ATTRIBUTE, &self.identity_guid_attribute),
            (keys::ROLE_OBJECT_CLASS, &self.role_object_class),
            (keys::ROLE_NAME_ATTRIBUTE, &self.role_name_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(DirectoryError::config(format!("{key} cannot be empty")));
            }
        }
        Ok(())
    }

    /// LDAP URLs for all controller hosts, in failover order.
    pub fn provider_urls(&self) -> DirectoryResult<Vec<String>> {
        self.hosts
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|h| build_provider_url(h, self.security))
            .collect()
    }

    /// Whether writes are refused. Passwords are never sent over plain LDAP.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.security == SecurityProtocol::Plain
    }

    /// Default container for new principals.
    ///
    /// This is the configured `ou` under the domain root of the base DN, or
    /// `CN=Users` when none is configured.
    pub fn default_container(&self) -> DirectoryResult<Dn> {
        let root = self.base_dn.domain_root();
        match &self.ou {
            Some(ou) => Ok(ou.rebase_onto(&root)),
            None => root.join("CN=Users"),
        }
    }

    /// Returns true when roles are filtered client-side by name.
    #[must_use]
    pub fn is_filtered_by_role_name(&self) -> bool {
        self.role_mode == RoleMode::PrincipalNames && !self.role_names.is_empty()
    }

    /// Returns true when roles are filtered by DN subtree.
    #[must_use]
    pub fn is_filtered_by_role_dn(&self) -> bool {
        matches!(
            self.role_mode,
            RoleMode::DistinguishedNames | RoleMode::ServerDistinguishedNames
        ) && !(self.role_dns.includes().is_empty() && self.role_dns.excludes().is_empty())
    }
}

// ============================================================================
// Provider URLs
// ============================================================================

/// Splits `host[:port]`, accepting bracketed IPv6 literals.
pub fn parse_host(host: &str) -> DirectoryResult<(&str, Option<u16>)> {
    let host = host.trim();
    let invalid = || DirectoryError::config(format!("invalid controller host '{host}'"));

    let (name, port) = if let Some(rest) = host.strip_prefix('[') {
        let (name, rest) = rest.split_once(']').ok_or_else(invalid)?;
        (name, rest.strip_prefix(':'))
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if !name.contains(':') => (name, Some(port)),
            _ => (host, None),
        }
    };
    if name.is_empty() {
        return Err(invalid());
    }
    let port = port
        .map(|p| p.parse::<u16>().map_err(|_| invalid()))
        .transpose()?;
    Ok((name, port))
}

/// Builds the LDAP URL for one controller host.
///
/// Well-known ports choose the scheme (389 and 3268 plain, 636 and 3269
/// TLS); other ports use `protocol`. Without a port, the protocol's default
/// port is used.
pub fn build_provider_url(host: &str, protocol: SecurityProtocol) -> DirectoryResult<String> {
    let (name, port) = parse_host(host)?;
    let name = if name.contains(':') {
        format!("[{name}]")
    } else {
        name.to_string()
    };
    let url = match port {
        Some(port @ (389 | 3268)) => format!("ldap://{name}:{port}"),
        Some(port @ (636 | 3269)) => format!("ldaps://{name}:{port}"),
        Some(port) => format!("{}://{name}:{port}", protocol.scheme()),
        None => format!("{}://{name}:{}", protocol.scheme(), protocol.default_port()),
    };
    Ok(url)
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for [`DirectoryConfig`].
#[derive(Debug)]
pub struct DirectoryConfigBuilder {
    hosts: Vec<String>,
    security: SecurityProtocol,
    service_account_dn: Option<String>,
    service_account_password: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    base_dn: Dn,
    includes: Vec<Dn>,
    excludes: Vec<Dn>,
    follow_referrals: bool,
    max_page_size: u32,
    identity_object_class: String,
    identity_name_attribute: String,
    identity_guid_attribute: String,
    identity_email_attribute: String,
    identity_full_name_attribute: String,
    identity_role_guid_attribute: Option<String>,
    identity_role_name_attribute: Option<String>,
    member_of_attribute: Option<String>,
    role_mode: RoleMode,
    role_object_class: String,
    role_name_attribute: String,
    role_guid_attribute: String,
    role_names: NameFilter,
    include_roles_dn: Vec<Dn>,
    exclude_roles_dn: Vec<Dn>,
    ou: Option<Dn>,
    identity_creation_object_classes: Vec<String>,
    role_creation_object_classes: Vec<String>,
    identity_password_attribute: String,
    role_member_attribute: String,
}

impl Default for DirectoryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryConfigBuilder {
    /// Creates a builder with generic LDAP defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hosts: Vec::new(),
            security: SecurityProtocol::Ssl,
            service_account_dn: None,
            service_account_password: String::new(),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_millis(120_000),
            base_dn: Dn::root(),
            includes: Vec::new(),
            excludes: Vec::new(),
            follow_referrals: false,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            identity_object_class: "inetOrgPerson".to_string(),
            identity_name_attribute: "uid".to_string(),
            identity_guid_attribute: "entryUUID".to_string(),
            identity_email_attribute: "mail".to_string(),
            identity_full_name_attribute: "cn".to_string(),
            identity_role_guid_attribute: None,
            identity_role_name_attribute: None,
            member_of_attribute: None,
            role_mode: RoleMode::PrincipalNames,
            role_object_class: "groupOfNames".to_string(),
            role_name_attribute: "cn".to_string(),
            role_guid_attribute: "entryUUID".to_string(),
            role_names: NameFilter::default(),
            include_roles_dn: Vec::new(),
            exclude_roles_dn: Vec::new(),
            ou: None,
            identity_creation_object_classes: strings(&[
                "top",
                "person",
                "organizationalPerson",
                "inetOrgPerson",
            ]),
            role_creation_object_classes: strings(&["top", "groupOfNames"]),
            identity_password_attribute: "userPassword".to_string(),
            role_member_attribute: "member".to_string(),
        }
    }

    /// Adds a controller host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Sets the transport security.
    #[must_use]
    pub const fn security(mut self, security: SecurityProtocol) -> Self {
        self.security = security;
        self
    }

    /// Sets the service account credentials.
    #[must_use]
    pub fn service_account(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.service_account_dn = Some(dn.into());
        self.service_account_password = password.into();
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the operation timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the search base.
    #[must_use]
    pub fn base_dn(mut self, dn: Dn) -> Self {
        self.base_dn = dn;
        self
    }

    /// Adds an included subtree.
    #[must_use]
    pub fn include(mut self, dn: Dn) -> Self {
        self.includes.push(dn);
        self
    }

    /// Adds an excluded subtree.
    #[must_use]
    pub fn exclude(mut self, dn: Dn) -> Self {
        self.excludes.push(dn);
        self
    }

    /// Sets whether referrals are reported as errors.
    #[must_use]
    pub const fn follow_referrals(mut self, follow: bool) -> Self {
        self.follow_referrals = follow;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets the identity object class and name/guid attributes.
    #[must_use]
    pub fn identity_schema(
        mut self,
        object_class: impl Into<String>,
        name_attribute: impl Into<String>,
        guid_attribute: impl Into<String>,
    ) -> Self {
        self.identity_object_class = object_class.into();
        self.identity_name_attribute = name_attribute.into();
        self.identity_guid_attribute = guid_attribute.into();
        self
    }

    /// Sets the identity email and display name attributes.
    #[must_use]
    pub fn identity_profile(
        mut self,
        email_attribute: impl Into<String>,
        full_name_attribute: impl Into<String>,
    ) -> Self {
        self.identity_email_attribute = email_attribute.into();
        self.identity_full_name_attribute = full_name_attribute.into();
        self
    }

    /// Sets the identity attribute holding its role guid.
    #[must_use]
    pub fn identity_role_guid_attribute(mut self, attr: impl Into<String>) -> Self {
        self.identity_role_guid_attribute = Some(attr.into());
        self
    }

    /// Sets the identity attribute holding its role name.
    #[must_use]
    pub fn identity_role_name_attribute(mut self, attr: impl Into<String>) -> Self {
        self.identity_role_name_attribute = Some(attr.into());
        self
    }

    /// Sets the identity attribute holding the DNs of its roles.
    #[must_use]
    pub fn member_of_attribute(mut self, attr: impl Into<String>) -> Self {
        self.member_of_attribute = Some(attr.into());
        self
    }

    /// Sets the role object class and name/guid attributes.
    #[must_use]
    pub fn role_schema(
        mut self,
        object_class: impl Into<String>,
        name_attribute: impl Into<String>,
        guid_attribute: impl Into<String>,
    ) -> Self {
        self.role_object_class = object_class.into();
        self.role_name_attribute = name_attribute.into();
        self.role_guid_attribute = guid_attribute.into();
        self
    }

    /// Sets the role mode.
    #[must_use]
    pub const fn role_mode(mut self, mode: RoleMode) -> Self {
        self.role_mode = mode;
        self
    }

    /// Sets the role name rules.
    #[must_use]
    pub fn role_names(mut self, filter: NameFilter) -> Self {
        self.role_names = filter;
        self
    }

    /// Sets the role subtree rules.
    #[must_use]
    pub fn role_dns(mut self, includes: Vec<Dn>, excludes: Vec<Dn>) -> Self {
        self.include_roles_dn = includes;
        self.exclude_roles_dn = excludes;
        self
    }

    /// Sets the container for new principals.
    #[must_use]
    pub fn ou(mut self, ou: Dn) -> Self {
        self.ou = Some(ou);
        self
    }

    /// Sets the object classes of new identities and roles.
    #[must_use]
    pub fn creation_object_classes(mut self, identity: &[&str], role: &[&str]) -> Self {
        self.identity_creation_object_classes = strings(identity);
        self.role_creation_object_classes = strings(role);
        self
    }

    /// Sets the identity password attribute.
    #[must_use]
    pub fn identity_password_attribute(mut self, attr: impl Into<String>) -> Self {
        self.identity_password_attribute = attr.into();
        self
    }

    /// Sets the role attribute listing member DNs.
    #[must_use]
    pub fn role_member_attribute(mut self, attr: impl Into<String>) -> Self {
        self.role_member_attribute = attr.into();
        self
    }

    /// Applies the `directory.*` keys present in `config`.
    pub fn apply(mut self, config: &ConnectorConfig) -> DirectoryResult<Self> {
        let text = |key: &str| config.get(key).map(str::trim).filter(|v| !v.is_empty());
        let dns = |key: &str| -> DirectoryResult<Vec<Dn>> {
            config.get_all(key).into_iter().map(Dn::parse).collect()
        };

        let hosts: Vec<String> = config
            .get_all(keys::HOSTNAME)
            .into_iter()
            .chain(config.get_all(keys::BACKUP_HOSTNAMES))
            .map(str::to_string)
            .collect();
        if !hosts.is_empty() {
            self.hosts = hosts;
        }
        if let Some(v) = text(keys::PROTOCOL) {
            self.security = SecurityProtocol::parse(v)?;
        }
        if let Some(v) = text(keys::SERVICE_ACCOUNT_USERNAME) {
            self.service_account_dn = Some(v.to_string());
        }
        if let Some(v) = config.get(keys::SERVICE_ACCOUNT_PASSWORD) {
            self.service_account_password = v.to_string();
        }
        if let Some(secs) = config.get_u32(keys::CONNECT_TIMEOUT)? {
            self.connect_timeout = Duration::from_secs(u64::from(secs));
        }
        if let Some(millis) = config.get_u32(keys::READ_TIMEOUT)? {
            self.read_timeout = Duration::from_millis(u64::from(millis));
        }
        if let Some(v) = config.get(keys::BASE_DN) {
            self.base_dn = Dn::parse(v)?;
        }
        self.includes.extend(dns(keys::INCLUDES)?);
        self.excludes.extend(dns(keys::EXCLUDES)?);
        if let Some(v) = config.get_bool(keys::FOLLOW_REFERRALS)? {
            self.follow_referrals = v;
        }
        if let Some(v) = config.get_u32(keys::MAX_PAGE_SIZE)? {
            self.max_page_size = v;
        }

        for (key, field) in [
            (keys::IDENTITY_OBJECT_CLASS, &mut self.identity_object_class),
            (keys::IDENTITY_NAME_ATTRIBUTE, &mut self.identity_name_attribute),
            (keys::IDENTITY_GUID_ATTRIBUTE, &mut self.identity_guid_attribute),
            (keys::IDENTITY_EMAIL_ATTRIBUTE, &mut self.identity_email_attribute),
            (keys::IDENTITY_FULL_NAME_ATTRIBUTE, &mut self.identity_full_name_attribute),
            (keys::ROLE_OBJECT_CLASS, &mut self.role_object_class),
            (keys::ROLE_NAME_ATTRIBUTE, &mut self.role_name_attribute),
            (keys::ROLE_GUID_ATTRIBUTE, &mut self.role_guid_attribute),
            (keys::IDENTITY_PASSWORD_ATTRIBUTE, &mut self.identity_password_attribute),
            (keys::ROLE_MEMBER_ATTRIBUTE, &mut self.role_member_attribute),
        ] {
            if let Some(v) = text(key) {
                *field = v.to_string();
            }
        }
        if let Some(v) = text(keys::IDENTITY_ROLE_GUID_ATTRIBUTE) {
            self.identity_role_guid_attribute = Some(v.to_string());
        }
        if let Some(v) = text(keys::IDENTITY_ROLE_NAME_ATTRIBUTE) {
            self.identity_role_name_attribute = Some(v.to_string());
        }
        if let Some(v) = text(keys::MEMBER_OF_ATTRIBUTE) {
            self.member_of_attribute = Some(v.to_string());
        }

        if let Some(v) = text(keys::ROLE_MODE) {
            self.role_mode = RoleMode::parse(v)?;
        }
        let include_roles = config.get_all(keys::INCLUDE_ROLES);
        let exclude_roles = config.get_all(keys::EXCLUDE_ROLES);
        if !include_roles.is_empty() || !exclude_roles.is_empty() {
            self.role_names = NameFilter::new(include_roles, exclude_roles);
        }
        self.include_roles_dn.extend(dns(keys::INCLUDE_ROLES_DN)?);
        self.exclude_roles_dn.extend(dns(keys::EXCLUDE_ROLES_DN)?);

        if let Some(v) = text(keys::OU) {
            self.ou = Some(Dn::parse(v)?);
        }
        for (key, field) in [
            (
                keys::IDENTITY_CREATION_OBJECT_CLASSES,
                &mut self.identity_creation_object_classes,
            ),
            (keys::ROLE_CREATION_OBJECT_CLASSES, &mut self.role_creation_object_classes),
        ] {
            let classes = config.get_all(key);
            if !classes.is_empty() {
                *field = classes.into_iter().map(str::to_string).collect();
            }
        }

        Ok(self)
    }

    /// Builds and validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - No controller host is configured or a host is malformed
    /// - The service account is missing
    /// - The page size is 0 or a schema attribute is blank
    pub fn build(self) -> DirectoryResult<DirectoryConfig> {
        let rules = IncludeExcludeRules::new(self.base_dn.clone(), self.includes, self.excludes);
        let role_dns = IncludeExcludeRules::new(
            self.base_dn.clone(),
            self.include_roles_dn,
            self.exclude_roles_dn,
        );

        let config = DirectoryConfig {
            hosts: self.hosts,
            security: self.security,
            service_account_dn: self.service_account_dn.ok_or_else(|| {
                DirectoryError::config(format!("{} is required", keys::SERVICE_ACCOUNT_USERNAME))
            })?,
            service_account_password: self.service_account_password,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            base_dn: self.base_dn,
            rules,
            follow_referrals: self.follow_referrals,
            max_page_size: self.max_page_size,
            identity_object_class: self.identity_object_class,
            identity_name_attribute: self.identity_name_attribute,
            identity_guid_attribute: self.identity_guid_attribute,
            identity_email_attribute: self.identity_email_attribute,
            identity_full_name_attribute: self.identity_full_name_attribute,
            identity_role_guid_attribute: self.identity_role_guid_attribute,
            identity_role_name_attribute: self.identity_role_name_attribute,
            member_of_attribute: self.member_of_attribute,
            role_mode: self.role_mode,
            role_object_class: self.role_object_class,
            role_name_attribute: self.role_name_attribute,
            role_guid_attribute: self.role_guid_attribute,
            role_names: self.role_names,
            role_dns,
            ou: self.ou,
            identity_creation_object_classes: self.identity_creation_object_classes,
            role_creation_object_classes: self.role_creation_object_classes,
            identity_password_attribute: self.identity_password_attribute,
            role_member_attribute: self.role_member_attribute,
        };

        config.validate()?;

        Ok(config)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

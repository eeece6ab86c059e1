//! Active Directory connector.
//!
//! [`ActiveDirectoryConnector`] is a [`DirectoryConnector`] configured with
//! AD defaults and an [`AdDecoder`], which reads binary `objectGUID` and
//! `objectSid` values and derives account and password status from
//! `userAccountControl` and the FILETIME attributes. An [`AdDialect`] finds
//! principals by `sAMAccountName` or `userPrincipalName`, leaves computer
//! accounts out and writes passwords to `unicodePwd`.
//!
//! Account locking and enabling go through `lockoutTime` and
//! `userAccountControl`, after checking the current account state.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ic_connector::{
    Connector, ConnectorCapability, ConnectorError, ConnectorResult, ConnectorWriter,
    CredentialValidator, PrincipalIter,
};
use ic_directory::config::build_provider_url;
use ic_directory::filter::{and, equals, escape_filter_value, not, object_class, or};
use ic_directory::{
    ClientFactory, Dialect, DirectoryConfig, DirectoryConnector, DirectoryError,
    DirectoryIdentity, DirectoryResult, DirectoryRole, Dn, EntryDecoder, LdapClientFactory,
    Modification, OrganizationalUnit, RawEntry, StandardDialect, TextAttributes,
};
use ic_directory::connector::WILDCARD;
use ic_model::{AccountStatusType, HasDistinguishedName, Identity, PasswordStatusType, Principal, Role};
use tracing::{debug, info};

use crate::config::{domain_of_dn, ActiveDirectoryConfig};
use crate::dc_cache::DomainControllerCache;
use crate::filetime::{parse_filetime, to_filetime};
use crate::guid::{decode_guid, decode_sid, encode_guid_filter, escape_bytes, sibling_sid};
use crate::uac::UserAccountControl;

/// Attribute holding the account control flags.
pub const USER_ACCOUNT_CONTROL: &str = "userAccountControl";

/// Binary unique id of every AD object.
pub const OBJECT_GUID: &str = "objectGUID";

/// Binary security identifier.
pub const OBJECT_SID: &str = "objectSid";

/// Base64 of the `objectGUID` bytes, as used by cloud directory sync.
pub const IMMUTABLE_ID: &str = "ImmutableId";

/// Pre-Windows 2000 logon name.
pub const SAM_ACCOUNT_NAME: &str = "sAMAccountName";

/// `name@domain` logon name.
pub const USER_PRINCIPAL_NAME: &str = "userPrincipalName";

/// Write-only password attribute.
pub const UNICODE_PWD: &str = "unicodePwd";

/// Relative id of an identity's primary group.
pub const PRIMARY_GROUP_ID: &str = "primaryGroupID";

/// Primary group of every domain user. Membership is never listed.
pub const DOMAIN_USERS: &str = "Domain Users";

const COMPUTER: &str = "computer";
const LAST_LOGON: &str = "lastLogonTimestamp";
const PWD_LAST_SET: &str = "pwdLastSet";
const ACCOUNT_EXPIRES: &str = "accountExpires";
const LOCKOUT_TIME: &str = "lockoutTime";
const PASSWORD_EXPIRY: &str = "msDS-UserPasswordExpiryTimeComputed";

/// Name of the synthetic unit for `CN=Users`.
pub const DEFAULT_USERS_OU: &str = "Default Users";

/// Name of the synthetic unit for `CN=Builtin`.
pub const DEFAULT_GROUPS_OU: &str = "Default Groups";

// ============================================================================
// Entry Decoder
// ============================================================================

/// Decodes Active Directory values.
#[derive(Debug, Clone)]
pub struct AdDecoder {
    service_account: String,
    domain: String,
}

impl AdDecoder {
    /// Creates a decoder for a directory.
    #[must_use]
    pub fn new(config: &ActiveDirectoryConfig) -> Self {
        Self {
            service_account: config.directory.service_account_dn.clone(),
            domain: config.domain.clone(),
        }
    }

    /// Whether `entry` is the account the connector binds as.
    fn is_service_account(&self, entry: &RawEntry) -> bool {
        let account = self.service_account.as_str();
        if let (Ok(account_dn), Ok(entry_dn)) = (Dn::parse(account), Dn::parse(&entry.dn)) {
            if !account_dn.is_root() && account_dn == entry_dn {
                return true;
            }
        }
        if entry
            .get_attr("userPrincipalName")
            .is_some_and(|upn| upn.eq_ignore_ascii_case(account))
        {
            return true;
        }
        entry.get_attr("sAMAccountName").is_some_and(|sam| {
            !self.domain.is_empty() && format!("{sam}@{}", self.domain).eq_ignore_ascii_case(account)
        })
    }
}

/// Raw bytes of an attribute that may arrive as text when it happens to be
/// valid UTF-8.
fn bytes_of<'a>(entry: &'a RawEntry, attribute: &str) -> Option<&'a [u8]> {
    entry
        .get_binary_attr(attribute)
        .or_else(|| entry.get_attr(attribute).map(str::as_bytes))
}

fn filetime_attr(entry: &RawEntry, attribute: &str) -> DirectoryResult<Option<DateTime<Utc>>> {
    Ok(entry
        .get_attr(attribute)
        .map(|value| parse_filetime(attribute, value))
        .transpose()?
        .flatten())
}

impl EntryDecoder for AdDecoder {
    fn guid(&self, entry: &RawEntry, attribute: &str) -> DirectoryResult<String> {
        if !attribute.eq_ignore_ascii_case(OBJECT_GUID) {
            return Ok(entry.get_attr_or_hex(attribute).unwrap_or_default());
        }
        let bytes = bytes_of(entry, attribute).ok_or_else(|| {
            DirectoryError::mapping(format!("{} has no {OBJECT_GUID}", entry.dn))
        })?;
        Ok(decode_guid(bytes)?.to_string())
    }

    fn guid_filter_value(&self, guid: &str) -> DirectoryResult<String> {
        Ok(encode_guid_filter(guid).unwrap_or_else(|_| escape_filter_value(guid)))
    }

    fn complete_identity(&self, entry: &RawEntry, identity: &mut Identity) -> DirectoryResult<()> {
        let uac = entry
            .get_attr(USER_ACCOUNT_CONTROL)
            .ok_or_else(|| {
                DirectoryError::mapping(format!("{} has no {USER_ACCOUNT_CONTROL}", entry.dn))
            })
            .and_then(UserAccountControl::parse)?;
        let now = Utc::now();

        identity.last_sign_on = filetime_attr(entry, LAST_LOGON)?;
        identity.account_status = uac.account_status(
            filetime_attr(entry, LOCKOUT_TIME)?,
            filetime_attr(entry, ACCOUNT_EXPIRES)?,
            now,
        );

        if entry.has_attr(PWD_LAST_SET) {
            identity.password_status = uac.password_status(
                filetime_attr(entry, PWD_LAST_SET)?,
                filetime_attr(entry, PASSWORD_EXPIRY)?,
                now,
            );
        }
        if self.is_service_account(entry) {
            identity.password_status.status = PasswordStatusType::Locked;
        }

        if let Some(sid) = bytes_of(entry, OBJECT_SID) {
            identity.set_attribute(OBJECT_SID, vec![decode_sid(sid)?]);
        }
        if let Some(guid) = bytes_of(entry, OBJECT_GUID) {
            identity.set_attribute(IMMUTABLE_ID, vec![STANDARD.encode(guid)]);
        }
        Ok(())
    }

    /// The primary group, which shares the identity's domain SID and has
    /// `primaryGroupID` as its relative id. It is absent from `memberOf`.
    fn role_reference_filters(&self, entry: &RawEntry) -> DirectoryResult<Vec<String>> {
        let (Some(sid), Some(rid)) = (bytes_of(entry, OBJECT_SID), entry.get_attr(PRIMARY_GROUP_ID)) else {
            return Ok(Vec::new());
        };
        let rid = rid.trim().parse::<u32>().map_err(|_| {
            DirectoryError::mapping(format!("invalid {PRIMARY_GROUP_ID} '{rid}' on {}", entry.dn))
        })?;
        let group = sibling_sid(sid, rid)?;
        Ok(vec![format!("({OBJECT_SID}={})", escape_bytes(&group))])
    }
}

// ============================================================================
// Dialect
// ============================================================================

/// Attributes AD maintains itself or that only change through dedicated
/// operations.
const MANAGED_ATTRIBUTES: &[&str] = &[
    USER_ACCOUNT_CONTROL,
    OBJECT_SID,
    IMMUTABLE_ID,
    SAM_ACCOUNT_NAME,
    USER_PRINCIPAL_NAME,
    PRIMARY_GROUP_ID,
    LAST_LOGON,
    "lastLogon",
    PWD_LAST_SET,
    LOCKOUT_TIME,
    PASSWORD_EXPIRY,
    "distinguishedName",
    "name",
];

/// Encodes a password for `unicodePwd`: quoted and UTF-16LE.
#[must_use]
pub fn unicode_password(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Active Directory naming, filters and password encoding.
#[derive(Debug, Clone, Default)]
pub struct AdDialect {
    domain: String,
}

impl AdDialect {
    /// Creates a dialect qualifying names with `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// `name@domain`, for a plain name.
    fn qualified(&self, name: &str) -> Option<String> {
        (!self.domain.is_empty() && name != WILDCARD && !name.contains('@'))
            .then(|| format!("{name}@{}", self.domain))
    }

    /// The `sAMAccountName` and `userPrincipalName` of a principal name.
    fn logon_names<'a>(&self, name: &'a str) -> (&'a str, String) {
        let name = name.trim();
        let account = name.split_once('@').map_or(name, |(account, _)| account);
        let principal = self.qualified(name).unwrap_or_else(|| name.to_string());
        (account, principal)
    }
}

fn without_computers(class: &str) -> String {
    and([not(&object_class(COMPUTER)), object_class(class)])
}

impl Dialect for AdDialect {
    fn identity_class_filter(&self, config: &DirectoryConfig) -> String {
        without_computers(&config.identity_object_class)
    }

    fn identity_filter(&self, config: &DirectoryConfig, name: &str) -> String {
        let name_attr = config.identity_name_attribute.as_str();
        if name == WILDCARD {
            return and([self.identity_class_filter(config), equals(name_attr, name)]);
        }
        let mut names = vec![equals(name_attr, name)];
        if !name_attr.eq_ignore_ascii_case(USER_PRINCIPAL_NAME) {
            names.push(equals(USER_PRINCIPAL_NAME, name));
        }
        names.extend(self.qualified(name).map(|q| equals(USER_PRINCIPAL_NAME, &q)));
        and([self.identity_class_filter(config), or(names)])
    }

    fn role_class_filter(&self, config: &DirectoryConfig) -> String {
        without_computers(&config.role_object_class)
    }

    fn role_filter(&self, config: &DirectoryConfig, name: &str) -> String {
        let name_attr = config.role_name_attribute.as_str();
        if name == WILDCARD {
            return and([self.role_class_filter(config), equals(name_attr, name)]);
        }
        let mut names = vec![equals(name_attr, name)];
        if !name_attr.eq_ignore_ascii_case(SAM_ACCOUNT_NAME) {
            names.push(equals(SAM_ACCOUNT_NAME, name));
        }
        names.extend(self.qualified(name).map(|q| equals(name_attr, &q)));
        and([self.role_class_filter(config), or(names)])
    }

    fn identity_naming_attributes(&self, config: &DirectoryConfig, identity: &Identity) -> TextAttributes {
        let (account, principal) = self.logon_names(&identity.principal_name);
        let mut attributes = vec![
            (SAM_ACCOUNT_NAME.to_string(), vec![account.to_string()]),
            (USER_PRINCIPAL_NAME.to_string(), vec![principal]),
        ];
        let name_attr = &config.identity_name_attribute;
        if !attributes.iter().any(|(attr, _)| attr.eq_ignore_ascii_case(name_attr)) {
            attributes.push((name_attr.clone(), vec![identity.principal_name.trim().to_string()]));
        }
        attributes
    }

    fn role_naming_attributes(&self, config: &DirectoryConfig, role: &Role) -> TextAttributes {
        let name = role.principal_name.trim();
        let mut attributes = vec![(config.role_name_attribute.clone(), vec![name.to_string()])];
        if !config.role_name_attribute.eq_ignore_ascii_case(SAM_ACCOUNT_NAME) {
            let (account, _) = self.logon_names(name);
            attributes.push((SAM_ACCOUNT_NAME.to_string(), vec![account.to_string()]));
        }
        attributes
    }

    fn initial_identity_attributes(&self, _config: &DirectoryConfig) -> TextAttributes {
        let disabled = UserAccountControl::NORMAL_ACCOUNT | UserAccountControl::ACCOUNTDISABLE;
        vec![(USER_ACCOUNT_CONTROL.to_string(), vec![disabled.bits().to_string()])]
    }

    fn set_password(&self, _config: &DirectoryConfig, password: &str) -> Vec<Modification> {
        vec![Modification::replace(UNICODE_PWD, [unicode_password(password)])]
    }

    fn require_password_change(&self, required: bool) -> Vec<Modification> {
        if required {
            vec![Modification::replace(PWD_LAST_SET, ["0"])]
        } else {
            vec![Modification::clear(PWD_LAST_SET), Modification::add(PWD_LAST_SET, ["-1"])]
        }
    }

    fn change_password(
        &self,
        _config: &DirectoryConfig,
        old_password: &str,
        new_password: &str,
    ) -> Option<Vec<Modification>> {
        Some(vec![
            Modification::delete(UNICODE_PWD, [unicode_password(old_password)]),
            Modification::add(UNICODE_PWD, [unicode_password(new_password)]),
        ])
    }

    fn is_managed_attribute(&self, config: &DirectoryConfig, attribute: &str) -> bool {
        StandardDialect.is_managed_attribute(config, attribute)
            || MANAGED_ATTRIBUTES
                .iter()
                .any(|managed| managed.eq_ignore_ascii_case(attribute))
    }

    fn is_implicit_role(&self, role: &Role) -> bool {
        role.principal_name.eq_ignore_ascii_case(DOMAIN_USERS)
    }
}

// ============================================================================
// Active Directory Connector
// ============================================================================

const WRITE_CAPABILITIES: &[ConnectorCapability] = &[
    ConnectorCapability::Identities,
    ConnectorCapability::Roles,
    ConnectorCapability::IdentityRoles,
    ConnectorCapability::AuthenticationCheck,
    ConnectorCapability::OrganizationalUnits,
    ConnectorCapability::CreateIdentity,
    ConnectorCapability::UpdateIdentity,
    ConnectorCapability::DeleteIdentity,
    ConnectorCapability::CreateRole,
    ConnectorCapability::UpdateRole,
    ConnectorCapability::DeleteRole,
    ConnectorCapability::PasswordSet,
    ConnectorCapability::PasswordChange,
    ConnectorCapability::ForcePasswordChange,
    ConnectorCapability::AccountLocking,
    ConnectorCapability::AccountDisable,
];

const WRITE_CAPABILITIES_WITHOUT_ROLES: &[ConnectorCapability] = &[
    ConnectorCapability::Identities,
    ConnectorCapability::AuthenticationCheck,
    ConnectorCapability::OrganizationalUnits,
    ConnectorCapability::CreateIdentity,
    ConnectorCapability::UpdateIdentity,
    ConnectorCapability::DeleteIdentity,
    ConnectorCapability::PasswordSet,
    ConnectorCapability::PasswordChange,
    ConnectorCapability::ForcePasswordChange,
    ConnectorCapability::AccountLocking,
    ConnectorCapability::AccountDisable,
];

/// Connector over Active Directory. Writes need LDAPS or StartTLS.
pub struct ActiveDirectoryConnector<F: ClientFactory = LdapClientFactory> {
    config: Arc<ActiveDirectoryConfig>,
    directory: DirectoryConnector<F>,
    controllers: Arc<DomainControllerCache>,
}

impl ActiveDirectoryConnector<LdapClientFactory> {
    /// Creates a connector over `ldap3`. No connection is opened yet.
    pub fn new(config: ActiveDirectoryConfig) -> Self {
        let directory = Arc::new(config.directory.clone());
        let factory = LdapClientFactory::new(Arc::clone(&directory));
        Self::with_factory(config, factory)
    }
}

impl<F: ClientFactory> ActiveDirectoryConnector<F> {
    /// Creates a connector using `factory` for connections.
    pub fn with_factory(config: ActiveDirectoryConfig, factory: F) -> Self {
        let controllers = Arc::new(DomainControllerCache::new(
            config.child_domain_controllers.clone(),
        ));
        let directory = DirectoryConnector::with_factory(Arc::new(config.directory.clone()), factory)
            .with_decoder(AdDecoder::new(&config))
            .with_dialect(AdDialect::new(config.domain.clone()));
        Self {
            config: Arc::new(config),
            directory,
            controllers,
        }
    }

    /// Shares a controller cache with other connectors.
    #[must_use]
    pub fn with_controller_cache(mut self, controllers: Arc<DomainControllerCache>) -> Self {
        self.controllers = controllers;
        self
    }

    /// The underlying directory connector.
    pub fn directory(&self) -> &DirectoryConnector<F> {
        &self.directory
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ActiveDirectoryConfig {
        &self.config
    }

    /// The controller cache.
    pub fn controllers(&self) -> &Arc<DomainControllerCache> {
        &self.controllers
    }

    /// The controller serving the domain of `dn`, or `None` when the entry is
    /// in the primary domain.
    ///
    /// ## Errors
    ///
    /// Fails when `dn` is in a child domain without a known controller.
    pub fn domain_controller_for(&self, dn: &Dn) -> DirectoryResult<Option<String>> {
        let domain = domain_of_dn(dn);
        if domain.is_empty() || domain.eq_ignore_ascii_case(&self.config.domain) {
            return Ok(None);
        }
        self.controllers.controller_for(&domain).map(Some)
    }

    /// LDAP URLs to contact for operations on `dn`.
    pub fn provider_urls_for(&self, dn: &Dn) -> DirectoryResult<Vec<String>> {
        match self.domain_controller_for(dn)? {
            Some(controller) => {
                debug!(dn = %dn, controller = %controller, "Using child domain controller");
                Ok(vec![build_provider_url(&controller, self.config.directory.security)?])
            }
            None => self.config.directory.provider_urls(),
        }
    }

    /// Lists organizational units in scope, preceded by the default user and
    /// group containers when they are in scope.
    pub fn organizational_units(
        &self,
    ) -> DirectoryResult<impl Iterator<Item = DirectoryResult<OrganizationalUnit>>> {
        let mut defaults = Vec::new();
        if self.config.include_default_users {
            defaults.push(OrganizationalUnit {
                dn: self.config.default_users_dn()?.to_string(),
                name: DEFAULT_USERS_OU.to_string(),
            });
        }
        if self.config.include_builtin_groups {
            defaults.push(OrganizationalUnit {
                dn: self.config.builtin_groups_dn()?.to_string(),
                name: DEFAULT_GROUPS_OU.to_string(),
            });
        }
        let units = self.directory.organizational_units()?;
        Ok(defaults.into_iter().map(Ok).chain(units))
    }

    /// Binds as `dn`, against the controller of its domain when it lives in
    /// a child domain.
    pub fn check_credentials_by_dn(&self, dn: &str, password: &str) -> DirectoryResult<bool> {
        let Ok(parsed) = Dn::parse(dn) else {
            return self.directory.check_credentials_by_dn(dn, password);
        };
        if self.domain_controller_for(&parsed)?.is_none() {
            return self.directory.check_credentials_by_dn(dn, password);
        }
        let urls = self.provider_urls_for(&parsed)?;
        self.directory.check_credentials_by_dn_at(&urls, dn, password)
    }

    /// Binds as `name@domain`, or as `name` when it is already qualified.
    pub fn check_credentials_by_name(&self, name: &str, password: &str) -> DirectoryResult<bool> {
        let principal = if name.contains('@') || self.config.domain.is_empty() {
            name.to_string()
        } else {
            format!("{name}@{}", self.config.domain)
        };
        self.directory.check_credentials_by_dn(&principal, password)
    }

    // === Writes ===

    /// Creates an identity. With a password, the account is enabled once the
    /// password is set unless `identity` asks for a disabled account.
    pub fn create_identity(
        &self,
        identity: &Identity,
        password: Option<&str>,
        force_change: bool,
    ) -> DirectoryResult<DirectoryIdentity> {
        let created = self.directory.create_identity(identity, password, force_change)?;
        if password.is_none() || identity.account_status.status == AccountStatusType::Disabled {
            return Ok(created);
        }
        let mut uac = account_control(&created)?;
        uac.remove(UserAccountControl::ACCOUNTDISABLE);
        self.write_account_control(&created, uac, "enable identity")?;
        self.directory.identity_by_guid(&created.guid)
    }

    /// Sets the password of `identity`, requiring a change at next logon when
    /// `force_change` is set.
    ///
    /// ## Errors
    ///
    /// A change cannot be required of a password that never expires or that
    /// its owner may not change.
    pub fn set_password(&self, identity: &DirectoryIdentity, password: &str, force_change: bool) -> DirectoryResult<()> {
        if force_change {
            if identity.password_status.never_expires {
                return Err(DirectoryError::invalid_state(format!(
                    "the password of {} never expires",
                    identity.principal_name
                )));
            }
            if identity.password_status.status == PasswordStatusType::Locked {
                return Err(DirectoryError::invalid_state(format!(
                    "the password of {} cannot be changed",
                    identity.principal_name
                )));
            }
        }
        self.directory.set_entry_password(identity.dn(), password, force_change)
    }

    /// Locks the account of `identity`.
    pub fn lock(&self, identity: &DirectoryIdentity) -> DirectoryResult<()> {
        match identity.account_status.status {
            AccountStatusType::Expired => Err(account_state(identity, "is expired")),
            AccountStatusType::Locked => Err(account_state(identity, "is already locked")),
            _ => {
                let now = to_filetime(Utc::now()).to_string();
                self.directory.modify_entry(
                    "lock identity",
                    identity.dn(),
                    &[Modification::replace(LOCKOUT_TIME, [now])],
                )
            }
        }
    }

    /// Unlocks the account of `identity`.
    pub fn unlock(&self, identity: &DirectoryIdentity) -> DirectoryResult<()> {
        match identity.account_status.status {
            AccountStatusType::Expired => Err(account_state(identity, "is expired")),
            AccountStatusType::Unlocked => Err(account_state(identity, "is not locked")),
            _ => self.directory.modify_entry(
                "unlock identity",
                identity.dn(),
                &[Modification::replace(LOCKOUT_TIME, ["0"])],
            ),
        }
    }

    /// Disables the account of `identity`.
    pub fn disable(&self, identity: &DirectoryIdentity) -> DirectoryResult<()> {
        if identity.account_status.status == AccountStatusType::Disabled {
            return Err(account_state(identity, "is already disabled"));
        }
        let uac = account_control(identity)? | UserAccountControl::ACCOUNTDISABLE;
        self.write_account_control(identity, uac, "disable identity")
    }

    /// Enables the disabled account of `identity`.
    pub fn enable(&self, identity: &DirectoryIdentity) -> DirectoryResult<()> {
        if identity.account_status.status != AccountStatusType::Disabled {
            return Err(account_state(identity, "is not disabled"));
        }
        let mut uac = account_control(identity)?;
        uac.remove(UserAccountControl::ACCOUNTDISABLE);
        self.write_account_control(identity, uac, "enable identity")
    }

    fn write_account_control(
        &self,
        identity: &DirectoryIdentity,
        uac: UserAccountControl,
        operation: &str,
    ) -> DirectoryResult<()> {
        self.directory.modify_entry(
            operation,
            identity.dn(),
            &[Modification::replace(USER_ACCOUNT_CONTROL, [uac.bits().to_string()])],
        )?;
        info!(identity = %identity.principal_name, uac = uac.bits(), operation, "Account control written");
        Ok(())
    }
}

/// Current `userAccountControl` of an identity.
fn account_control(identity: &DirectoryIdentity) -> DirectoryResult<UserAccountControl> {
    identity
        .attribute(USER_ACCOUNT_CONTROL)
        .ok_or_else(|| {
            DirectoryError::invalid_state(format!("{} has no {USER_ACCOUNT_CONTROL}", identity.dn()))
        })
        .and_then(UserAccountControl::parse)
}

fn account_state(identity: &DirectoryIdentity, state: &str) -> DirectoryError {
    DirectoryError::invalid_state(format!("the account of {} {state}", identity.principal_name))
}

// ============================================================================
// Connector Traits
// ============================================================================

impl<F> Connector for ActiveDirectoryConnector<F>
where
    F: ClientFactory,
    F::Client: 'static,
{
    type Identity = DirectoryIdentity;
    type Role = DirectoryRole;

    fn connector_type(&self) -> &'static str {
        "active-directory"
    }

    fn capabilities(&self) -> &[ConnectorCapability] {
        let read = self.directory.capabilities();
        if self.directory.is_read_only() {
            read
        } else if read.contains(&ConnectorCapability::Roles) {
            WRITE_CAPABILITIES
        } else {
            WRITE_CAPABILITIES_WITHOUT_ROLES
        }
    }

    fn is_read_only(&self) -> bool {
        self.directory.is_read_only()
    }

    fn test_connection(&self) -> ConnectorResult<()> {
        Ok(self.directory.test_connection()?)
    }

    fn all_identities(&self) -> ConnectorResult<PrincipalIter<'_, DirectoryIdentity>> {
        self.directory.all_identities()
    }

    fn identity_by_name(&self, name: &str) -> ConnectorResult<DirectoryIdentity> {
        Ok(self.directory.identity_by_name(name)?)
    }

    fn identity_by_guid(&self, guid: &str) -> ConnectorResult<DirectoryIdentity> {
        Ok(self.directory.identity_by_guid(guid)?)
    }

    fn all_roles(&self) -> ConnectorResult<PrincipalIter<'_, DirectoryRole>> {
        self.directory.all_roles()
    }

    fn role_by_name(&self, name: &str) -> ConnectorResult<DirectoryRole> {
        Ok(self.directory.role_by_name(name)?)
    }
}

impl<F> ConnectorWriter for ActiveDirectoryConnector<F>
where
    F: ClientFactory,
    F::Client: 'static,
{
    fn create_identity(
        &self,
        identity: &Identity,
        password: Option<&str>,
        force_change: bool,
    ) -> ConnectorResult<DirectoryIdentity> {
        Ok(Self::create_identity(self, identity, password, force_change)?)
    }

    fn update_identity(&self, current: &DirectoryIdentity, desired: &Identity) -> ConnectorResult<()> {
        Ok(self.directory.update_identity(current, desired)?)
    }

    fn delete_identity(&self, identity: &DirectoryIdentity) -> ConnectorResult<()> {
        Ok(self.directory.delete_entry("delete identity", identity.dn())?)
    }

    fn create_role(&self, role: &Role) -> ConnectorResult<DirectoryRole> {
        Ok(self.directory.create_role(role)?)
    }

    fn update_role(&self, current: &DirectoryRole, desired: &Role) -> ConnectorResult<()> {
        Ok(self.directory.update_role(current, desired)?)
    }

    fn delete_role(&self, role: &DirectoryRole) -> ConnectorResult<()> {
        Ok(self.directory.delete_entry("delete role", role.dn())?)
    }

    fn set_password(
        &self,
        identity: &DirectoryIdentity,
        password: &str,
        force_change: bool,
    ) -> ConnectorResult<()> {
        Ok(Self::set_password(self, identity, password, force_change)?)
    }

    fn change_password(
        &self,
        identity: &DirectoryIdentity,
        old_password: &str,
        new_password: &str,
    ) -> ConnectorResult<()> {
        Ok(self
            .directory
            .change_entry_password(identity.dn(), old_password, new_password)?)
    }

    fn lock_identity(&self, identity: &DirectoryIdentity) -> ConnectorResult<()> {
        Ok(self.lock(identity)?)
    }

    fn unlock_identity(&self, identity: &DirectoryIdentity) -> ConnectorResult<()> {
        Ok(self.unlock(identity)?)
    }

    fn disable_identity(&self, identity: &DirectoryIdentity) -> ConnectorResult<()> {
        Ok(self.disable(identity)?)
    }

    fn enable_identity(&self, identity: &DirectoryIdentity) -> ConnectorResult<()> {
        Ok(self.enable(identity)?)
    }
}

impl<F: ClientFactory> CredentialValidator for ActiveDirectoryConnector<F> {
    fn check_credentials(&self, principal: &dyn Principal, password: &str) -> ConnectorResult<bool> {
        if let Some(located) = principal.as_distinguished() {
            return Ok(self.check_credentials_by_dn(located.distinguished_name(), password)?);
        }
        let identity = self.directory.identity_by_name(principal.principal_name())?;
        Ok(self.check_credentials_by_dn(identity.distinguished_name(), password)?)
    }

    fn supports_optimised_check(&self) -> bool {
        !self.config.domain.is_empty()
    }

    fn check_credentials_optimised(&self, name: &str, password: &str) -> ConnectorResult<bool> {
        if !self.supports_optimised_check() {
            return Err(ConnectorError::not_supported(
                "optimised credential check without a domain",
            ));
        }
        Ok(self.check_credentials_by_name(name, password)?)
    }
}

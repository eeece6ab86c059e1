//! Generic LDAP directory connector.
//!
//! [`DirectoryConnector`] maps configured object classes and attributes onto
//! the [`Identity`]/[`Role`] model and runs every lookup as a
//! [`PagedSearch`]. Backend-specific value decoding (binary GUIDs, account
//! flags) is plugged in through [`EntryDecoder`]; backend-specific filters
//! and write encoding through [`Dialect`].
//!
//! Writes are refused while the connection is plain LDAP.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use ic_connector::{
    Connector, ConnectorCapability, ConnectorError, ConnectorResult, ConnectorWriter,
    CredentialValidator, PrincipalIter,
};
use ic_model::{Attributes, HasDistinguishedName, Identity, Principal, Role};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{AttributeValues, ClientFactory, DirectoryClient, DirectoryWriter, Modification};
use crate::config::{DirectoryConfig, RoleMode};
use crate::connection::LdapClientFactory;
use crate::dialect::{Dialect, StandardDialect, TextAttributes, COMMON_NAME, OBJECT_CLASS, OU_ATTRIBUTE};
use crate::dn::Dn;
use crate::entry::RawEntry;
use crate::error::{result_code, DirectoryError, DirectoryResult};
use crate::filter::{and, escape_filter_value, object_class_filter};
use crate::mapper::{FnMapper, ResultMapper};
use crate::scope::{is_included, IncludeExcludeRules};
use crate::search::{PagedSearch, SearchBases, SearchRequest};

/// Wildcard value matching any entry that has the attribute.
pub const WILDCARD: &str = "*";

// ============================================================================
// Directory Principals
// ============================================================================

/// An identity read from a directory, with the DN of its entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryIdentity {
    #[serde(flatten)]
    identity: Identity,
    dn: Dn,
    #[serde(skip)]
    dn_text: String,
}

impl DirectoryIdentity {
    /// Wraps an identity.
    #[must_use]
    pub fn new(identity: Identity, dn: Dn) -> Self {
        let dn_text = dn.to_string();
        Self {
            identity,
            dn,
            dn_text,
        }
    }

    /// The entry DN.
    #[must_use]
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Unwraps the identity.
    #[must_use]
    pub fn into_inner(self) -> Identity {
        self.identity
    }
}

impl Deref for DirectoryIdentity {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.identity
    }
}

impl HasDistinguishedName for DirectoryIdentity {
    fn distinguished_name(&self) -> &str {
        &self.dn_text
    }
}

impl Principal for DirectoryIdentity {
    fn guid(&self) -> &str {
        &self.identity.guid
    }

    fn principal_name(&self) -> &str {
        &self.identity.principal_name
    }

    fn attributes(&self) -> &Attributes {
        &self.identity.attributes
    }

    fn as_distinguished(&self) -> Option<&dyn HasDistinguishedName> {
        Some(self)
    }
}

/// A role read from a directory, with the DN of its entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRole {
    #[serde(flatten)]
    role: Role,
    dn: Dn,
    #[serde(skip)]
    dn_text: String,
}

impl DirectoryRole {
    /// Wraps a role.
    #[must_use]
    pub fn new(role: Role, dn: Dn) -> Self {
        let dn_text = dn.to_string();
        Self { role, dn, dn_text }
    }

    /// The entry DN.
    #[must_use]
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Unwraps the role.
    #[must_use]
    pub fn into_inner(self) -> Role {
        self.role
    }
}

impl Deref for DirectoryRole {
    type Target = Role;

    fn deref(&self) -> &Role {
        &self.role
    }
}

impl HasDistinguishedName for DirectoryRole {
    fn distinguished_name(&self) -> &str {
        &self.dn_text
    }
}

impl Principal for DirectoryRole {
    fn guid(&self) -> &str {
        &self.role.guid
    }

    fn principal_name(&self) -> &str {
        &self.role.principal_name
    }

    fn attributes(&self) -> &Attributes {
        &self.role.attributes
    }

    fn as_distinguished(&self) -> Option<&dyn HasDistinguishedName> {
        Some(self)
    }
}

/// An organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationalUnit {
    /// Entry DN.
    pub dn: String,
    /// Value of `ou`.
    pub name: String,
}

/// Attribute under which an identity's DN is recorded.
pub const DN_ATTRIBUTE: &str = "dn";

// ============================================================================
// Entry Decoder
// ============================================================================

/// Backend-specific decoding of directory values.
pub trait EntryDecoder: Send + Sync {
    /// Reads the unique id of an entry from `attribute`.
    ///
    /// Text values are used as-is and binary values are hex encoded.
    fn guid(&self, entry: &RawEntry, attribute: &str) -> DirectoryResult<String> {
        Ok(entry.get_attr_or_hex(attribute).unwrap_or_default())
    }

    /// Encodes a unique id for use as a filter value.
    fn guid_filter_value(&self, guid: &str) -> DirectoryResult<String> {
        Ok(escape_filter_value(guid))
    }

    /// Fills in backend-specific identity state such as account status.
    fn complete_identity(&self, _entry: &RawEntry, _identity: &mut Identity) -> DirectoryResult<()> {
        Ok(())
    }

    /// Filters for roles an identity entry refers to other than through the
    /// configured role attributes, such as a primary group.
    ///
    /// Each filter is combined with the role class filter and resolved to at
    /// most one role.
    fn role_reference_filters(&self, _entry: &RawEntry) -> DirectoryResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Decoder for directories storing plain text values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl EntryDecoder for TextDecoder {}

// ============================================================================
// Directory Connector
// ============================================================================

const CAPABILITIES: &[ConnectorCapability] = &[
    ConnectorCapability::Identities,
    ConnectorCapability::Roles,
    ConnectorCapability::IdentityRoles,
    ConnectorCapability::AuthenticationCheck,
    ConnectorCapability::OrganizationalUnits,
];

const CAPABILITIES_WITHOUT_ROLES: &[ConnectorCapability] = &[
    ConnectorCapability::Identities,
    ConnectorCapability::AuthenticationCheck,
    ConnectorCapability::OrganizationalUnits,
];

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
];

/// Connector over an LDAP directory.
pub struct DirectoryConnector<F: ClientFactory = LdapClientFactory> {
    config: Arc<DirectoryConfig>,
    factory: F,
    decoder: Arc<dyn EntryDecoder>,
    dialect: Arc<dyn Dialect>,
}

impl DirectoryConnector<LdapClientFactory> {
    /// Creates a connector over `ldap3`. No connection is opened yet.
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        Self::with_factory(Arc::clone(&config), LdapClientFactory::new(config))
    }
}

impl<F: ClientFactory> DirectoryConnector<F> {
    /// Creates a connector using `factory` for connections.
    pub fn with_factory(config: Arc<DirectoryConfig>, factory: F) -> Self {
        Self {
            config,
            factory,
            decoder: Arc::new(TextDecoder),
            dialect: Arc::new(StandardDialect),
        }
    }

    /// Replaces the value decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: impl EntryDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Replaces the dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Arc::new(dialect);
        self
    }

    /// Whether writes are refused.
    pub fn is_read_only(&self) -> bool {
        self.config.is_read_only()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns the client factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Runs a scope-filtered search under the configured base.
    ///
    /// ## Errors
    ///
    /// Fails if no connection can be opened. The search itself runs lazily.
    pub fn search<M: ResultMapper>(
        &self,
        bases: SearchBases,
        filter: &str,
        mapper: M,
    ) -> DirectoryResult<PagedSearch<F::Client, M>> {
        let client = self.factory.connect()?;
        Ok(PagedSearch::new(client, self.search_request(bases, filter), mapper))
    }

    fn search_request(&self, bases: SearchBases, filter: &str) -> SearchRequest {
        SearchRequest::new(filter)
            .bases(bases)
            .page_size(self.config.max_page_size)
            .rules(self.config.rules.clone())
            .follow_referrals(self.config.follow_referrals)
    }

    /// Checks that the service account can connect and bind.
    pub fn test_connection(&self) -> DirectoryResult<()> {
        let mut client = self.factory.connect()?;
        client.close()
    }

    /// Checks whether `dn` lies under the base DN and within the configured
    /// include/exclude scope.
    pub fn is_included(&self, dn: &Dn) -> bool {
        dn.is_descendant_of(&self.config.base_dn) && is_included(dn, &self.config.rules)
    }

    // === Identities ===

    /// Lists all identities in scope.
    pub fn identities(&self) -> DirectoryResult<PagedSearch<F::Client, IdentityMapper<'_, F>>> {
        let filter = self.dialect.identity_filter(&self.config, WILDCARD);
        self.search(SearchBases::default(), &filter, IdentityMapper::new(self))
    }

    /// Lists identities matching an additional filter.
    pub fn identities_matching(
        &self,
        filter: &str,
    ) -> DirectoryResult<PagedSearch<F::Client, IdentityMapper<'_, F>>> {
        let filter = and([self.dialect.identity_class_filter(&self.config).as_str(), filter]);
        self.search(SearchBases::default(), &filter, IdentityMapper::new(self))
    }

    /// Gets an identity by login name.
    pub fn identity_by_name(&self, name: &str) -> DirectoryResult<DirectoryIdentity> {
        let filter = self.dialect.identity_filter(&self.config, name);
        first(name, self.search(SearchBases::default(), &filter, IdentityMapper::new(self))?)
    }

    /// Gets an identity by unique id.
    pub fn identity_by_guid(&self, guid: &str) -> DirectoryResult<DirectoryIdentity> {
        let filter = and([
            self.dialect.identity_class_filter(&self.config),
            format!(
                "({}={})",
                self.config.identity_guid_attribute,
                self.decoder.guid_filter_value(guid)?
            ),
        ]);
        first(guid, self.search(SearchBases::default(), &filter, IdentityMapper::new(self))?)
    }

    // === Roles ===

    /// Lists all roles. Empty when roles are disabled.
    ///
    /// Role searches are not restricted by the identity scope. Role names and
    /// DNs are filtered according to the role mode.
    pub fn roles(&self) -> DirectoryResult<Option<PagedSearch<F::Client, RoleMapper<'_>>>> {
        if !self.config.role_mode.is_enabled() {
            return Ok(None);
        }
        let filter = self.dialect.role_filter(&self.config, WILDCARD);
        self.search(self.role_bases(), &filter, self.role_mapper()).map(Some)
    }

    /// Gets a role by name.
    ///
    /// Returns `NotFound` when roles are disabled or the role is filtered out.
    pub fn role_by_name(&self, name: &str) -> DirectoryResult<DirectoryRole> {
        if !self.config.role_mode.is_enabled() {
            return Err(DirectoryError::not_found(format!("role {name} (roles are disabled)")));
        }
        let filter = self.dialect.role_filter(&self.config, name);
        first(name, self.search(self.role_bases(), &filter, self.role_mapper())?)
    }

    fn role_mapper(&self) -> RoleMapper<'_> {
        RoleMapper {
            config: &self.config,
            decoder: self.decoder.as_ref(),
        }
    }

    /// Bases of role searches. Only the server-side DN mode narrows them.
    fn role_bases(&self) -> SearchBases {
        match self.config.role_mode {
            RoleMode::ServerDistinguishedNames if !self.config.role_dns.includes().is_empty() => {
                SearchBases::new(self.config.role_dns.includes().to_vec())
            }
            _ => SearchBases::default(),
        }
    }

    /// Looks up one role, returning `None` if none matches.
    fn find_role(
        &self,
        bases: SearchBases,
        filter: &str,
        matches: impl Fn(&DirectoryRole) -> bool,
    ) -> DirectoryResult<Option<DirectoryRole>> {
        for role in self.search(bases, filter, self.role_mapper())? {
            let role = role?;
            if matches(&role) {
                return Ok(Some(role));
            }
        }
        Ok(None)
    }

    // === Organizational Units ===

    /// Lists organizational units in scope.
    pub fn organizational_units(
        &self,
    ) -> DirectoryResult<PagedSearch<F::Client, impl ResultMapper<Output = OrganizationalUnit>>> {
        let filter = object_class_filter("organizationalUnit", OU_ATTRIBUTE, WILDCARD);
        let mapper = FnMapper::new(|entry: &RawEntry| {
            Ok(entry.get_attr("ou").map(|name| OrganizationalUnit {
                dn: entry.dn.clone(),
                name: name.to_string(),
            }))
        });
        self.search(SearchBases::default(), &filter, mapper)
    }

    // === Credentials ===

    /// Binds as `dn` with `password`.
    ///
    /// Returns `Ok(false)` when the directory rejects the credentials.
    pub fn check_credentials_by_dn(&self, dn: &str, password: &str) -> DirectoryResult<bool> {
        credential_outcome(dn, self.factory.authenticate(dn, password))
    }

    /// Like [`check_credentials_by_dn`](Self::check_credentials_by_dn),
    /// binding against `urls` instead of the configured controllers.
    pub fn check_credentials_by_dn_at(
        &self,
        urls: &[String],
        dn: &str,
        password: &str,
    ) -> DirectoryResult<bool> {
        credential_outcome(dn, self.factory.authenticate_at(urls, dn, password))
    }

    // === Writes ===

    /// Opens a client, runs `operation` on it and closes it.
    ///
    /// ## Errors
    ///
    /// Fails with `ReadOnly` over plain LDAP, before connecting.
    pub fn write<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut F::Client) -> DirectoryResult<T>,
    ) -> DirectoryResult<T> {
        if self.is_read_only() {
            return Err(DirectoryError::ReadOnly(operation.to_string()));
        }
        let mut client = self.factory.connect()?;
        let result = f(&mut client);
        let closed = client.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Applies `changes` to the entry at `dn` in one modify request.
    pub fn modify_entry(
        &self,
        operation: &str,
        dn: &Dn,
        changes: &[Modification],
    ) -> DirectoryResult<()> {
        self.write(operation, |client| {
            if changes.is_empty() {
                return Ok(());
            }
            client.modify(dn, changes)
        })?;
        info!(dn = %dn, operation, "Entry modified");
        Ok(())
    }

    /// Deletes the entry at `dn`.
    pub fn delete_entry(&self, operation: &str, dn: &Dn) -> DirectoryResult<()> {
        self.write(operation, |client| client.delete(dn))?;
        info!(dn = %dn, operation, "Entry deleted");
        Ok(())
    }

    /// Location of a new principal: `CN=<cn>` in the container named by its
    /// `ou` attribute, or in the default container.
    ///
    /// ## Errors
    ///
    /// Fails when the location is outside the base DN or, for identities,
    /// outside the configured includes and excludes.
    pub fn new_entry_dn(&self, attributes: &Attributes, cn: &str, scoped: bool) -> DirectoryResult<Dn> {
        let container = match first_value(attributes, OU_ATTRIBUTE) {
            Some(ou) => Dn::parse(ou)?,
            None => self.config.default_container()?,
        };
        let dn = container.child("CN", cn)?;
        self.check_location(&dn, scoped)?;
        Ok(dn)
    }

    fn check_location(&self, dn: &Dn, scoped: bool) -> DirectoryResult<()> {
        let allowed = if scoped {
            self.is_included(dn)
        } else {
            dn.is_descendant_of(&self.config.base_dn)
        };
        if allowed {
            return Ok(());
        }
        Err(DirectoryError::InvalidDn {
            dn: dn.to_string(),
            reason: format!(
                "outside the base DN {} or the configured includes and excludes",
                self.config.base_dn
            ),
        })
    }

    /// Creates the entry of a new identity and assigns its roles.
    pub fn create_identity_entry(&self, identity: &Identity) -> DirectoryResult<Dn> {
        let config = &self.config;
        if identity.principal_name.trim().is_empty() {
            return Err(DirectoryError::invalid_state("a new identity needs a principal name"));
        }
        let cn = common_name_of(identity);
        let dn = self.new_entry_dn(&identity.attributes, &cn, true)?;

        let mut attributes = copied_attributes(&identity.attributes, |attr| {
            self.dialect.is_managed_attribute(config, attr)
                || attr.eq_ignore_ascii_case(&config.identity_email_attribute)
        });
        if let Some(email) = non_blank(identity.email.as_deref()) {
            attributes.push((config.identity_email_attribute.clone(), vec![email.to_string()]));
        }
        if !config.identity_full_name_attribute.eq_ignore_ascii_case(COMMON_NAME)
            && first_value(&identity.attributes, &config.identity_full_name_attribute).is_none()
        {
            attributes.push((config.identity_full_name_attribute.clone(), vec![cn.clone()]));
        }
        attributes.push((OBJECT_CLASS.to_string(), self.dialect.identity_object_classes(config)));
        attributes.push((COMMON_NAME.to_string(), vec![cn]));
        let naming = self.dialect.identity_naming_attributes(config, identity);
        for (attr, values) in self.dialect.initial_identity_attributes(config).into_iter().chain(naming) {
            upsert(&mut attributes, attr, values);
        }
        let roles = self.role_dns_of(&identity.roles)?;

        self.write("create identity", |client| {
            client.add(&dn, &encode(attributes))?;
            for role in &roles {
                self.assign_role(client, &dn, role)?;
            }
            Ok(())
        })?;
        info!(dn = %dn, roles = roles.len(), "Identity created");
        Ok(dn)
    }

    /// Creates an identity, assigns its roles and sets its password, then
    /// reads it back.
    pub fn create_identity(
        &self,
        identity: &Identity,
        password: Option<&str>,
        force_change: bool,
    ) -> DirectoryResult<DirectoryIdentity> {
        let dn = self.create_identity_entry(identity)?;
        if let Some(password) = password {
            self.set_entry_password(&dn, password, force_change)?;
        }
        self.identity_by_name(identity.principal_name.trim())
    }

    /// Brings the entry of `current` in line with `desired`.
    ///
    /// Attributes absent from `desired` are left alone and attributes left
    /// without values are removed. Roles are assigned and revoked by name. A
    /// new full name or `cn` renames the entry and a new `ou` container
    /// moves it.
    pub fn update_identity(&self, current: &DirectoryIdentity, desired: &Identity) -> DirectoryResult<()> {
        let config = &self.config;
        let mut changes = attribute_changes(&current.attributes, &desired.attributes, |attr| {
            self.dialect.is_managed_attribute(config, attr)
                || attr.eq_ignore_ascii_case(&config.identity_name_attribute)
                || attr.eq_ignore_ascii_case(&config.identity_email_attribute)
                || attr.eq_ignore_ascii_case(&config.identity_full_name_attribute)
        });

        let email = non_blank(desired.email.as_deref());
        if email != non_blank(current.email.as_deref()) {
            changes.push(match email {
                Some(email) => Modification::replace(&config.identity_email_attribute, [email]),
                None => Modification::clear(&config.identity_email_attribute),
            });
        }
        let full_name = changed(current.full_name.as_deref(), desired.full_name.as_deref());
        if let Some(full_name) = full_name {
            if !config.identity_full_name_attribute.eq_ignore_ascii_case(COMMON_NAME) {
                changes.push(Modification::replace(&config.identity_full_name_attribute, [full_name]));
            }
        }
        if desired.principal_name.trim() != current.principal_name {
            for (attr, values) in self.dialect.identity_naming_attributes(config, desired) {
                changes.push(Modification::replace(attr, values));
            }
        }

        let cn = full_name.or_else(|| changed(current.attribute(COMMON_NAME), desired.attribute(COMMON_NAME)));
        let container = changed(current.attribute(OU_ATTRIBUTE), desired.attribute(OU_ATTRIBUTE));
        let target = self.relocation(current.dn(), cn, container, true, &mut changes)?;

        let (revoke, assign) = role_changes(&current.roles, &desired.roles);
        let revoke = self.role_dns_of(&revoke)?;
        let assign = self.role_dns_of(&assign)?;

        let dn = current.dn();
        self.write("update identity", |client| {
            if !changes.is_empty() {
                client.modify(dn, &changes)?;
            }
            for role in &revoke {
                self.revoke_role(client, dn, role)?;
            }
            for role in &assign {
                self.assign_role(client, dn, role)?;
            }
            if let Some(target) = &target {
                client.rename(dn, target)?;
            }
            Ok(())
        })?;
        info!(
            dn = %dn,
            changes = changes.len(),
            revoked = revoke.len(),
            assigned = assign.len(),
            renamed = target.is_some(),
            "Identity updated"
        );
        Ok(())
    }

    /// Creates a role and reads it back.
    pub fn create_role(&self, role: &Role) -> DirectoryResult<DirectoryRole> {
        let config = &self.config;
        let name = role.principal_name.trim();
        if name.is_empty() {
            return Err(DirectoryError::invalid_state("a new role needs a name"));
        }
        let dn = self.new_entry_dn(&role.attributes, name, false)?;

        let mut attributes = copied_attributes(&role.attributes, |attr| {
            self.dialect.is_managed_attribute(config, attr)
        });
        attributes.push((OBJECT_CLASS.to_string(), self.dialect.role_object_classes(config)));
        attributes.push((COMMON_NAME.to_string(), vec![name.to_string()]));
        for (attr, values) in self.dialect.role_naming_attributes(config, role) {
            upsert(&mut attributes, attr, values);
        }

        self.write("create role", |client| client.add(&dn, &encode(attributes)))?;
        info!(dn = %dn, "Role created");
        self.role_by_name(name)
    }

    /// Brings the entry of `current` in line with `desired`.
    ///
    /// A new name is written to the naming attributes, or renames the entry
    /// when roles are named by `cn`.
    pub fn update_role(&self, current: &DirectoryRole, desired: &Role) -> DirectoryResult<()> {
        let config = &self.config;
        let mut changes = attribute_changes(&current.attributes, &desired.attributes, |attr| {
            self.dialect.is_managed_attribute(config, attr)
                || attr.eq_ignore_ascii_case(&config.role_name_attribute)
        });

        let name = desired.principal_name.trim();
        let renamed = !name.is_empty() && name != current.principal_name;
        if renamed {
            for (attr, values) in self.dialect.role_naming_attributes(config, desired) {
                if !attr.eq_ignore_ascii_case(COMMON_NAME) {
                    changes.push(Modification::replace(attr, values));
                }
            }
        }
        let cn = changed(current.attribute(COMMON_NAME), desired.attribute(COMMON_NAME)).or_else(|| {
            (renamed && config.role_name_attribute.eq_ignore_ascii_case(COMMON_NAME)).then_some(name)
        });
        let container = changed(current.attribute(OU_ATTRIBUTE), desired.attribute(OU_ATTRIBUTE));
        let target = self.relocation(current.dn(), cn, container, false, &mut changes)?;

        let dn = current.dn();
        self.write("update role", |client| {
            if !changes.is_empty() {
                client.modify(dn, &changes)?;
            }
            if let Some(target) = &target {
                client.rename(dn, target)?;
            }
            Ok(())
        })?;
        info!(dn = %dn, changes = changes.len(), renamed = target.is_some(), "Role updated");
        Ok(())
    }

    /// Sets the password of the entry at `dn`, then requires or clears a
    /// change at next sign-on where the directory supports it.
    pub fn set_entry_password(&self, dn: &Dn, password: &str, force_change: bool) -> DirectoryResult<()> {
        let changes = self.dialect.set_password(&self.config, password);
        let follow_up = self.dialect.require_password_change(force_change);
        self.write("set password", |client| {
            client.modify(dn, &changes)?;
            if !follow_up.is_empty() {
                client.modify(dn, &follow_up)?;
            }
            Ok(())
        })?;
        info!(dn = %dn, force_change, "Password set");
        Ok(())
    }

    /// Changes the password of the entry at `dn` on behalf of its owner.
    ///
    /// Directories without a change operation get the new password set.
    pub fn change_entry_password(&self, dn: &Dn, old_password: &str, new_password: &str) -> DirectoryResult<()> {
        let Some(changes) = self.dialect.change_password(&self.config, old_password, new_password) else {
            return self.set_entry_password(dn, new_password, false);
        };
        self.write("change password", |client| client.modify(dn, &changes))?;
        info!(dn = %dn, "Password changed");
        Ok(())
    }

    /// New DN of an entry whose common name or container changes, or `None`
    /// when it stays put.
    ///
    /// A new common name for an entry not named by `cn` is written as an
    /// attribute change instead.
    fn relocation(
        &self,
        dn: &Dn,
        cn: Option<&str>,
        container: Option<&str>,
        scoped: bool,
        changes: &mut Vec<Modification>,
    ) -> DirectoryResult<Option<Dn>> {
        let Some(rdn) = dn.rdn() else {
            return Ok(None);
        };
        let parent = match container {
            Some(container) => Dn::parse(container)?,
            None => dn.parent().unwrap_or_default(),
        };
        let value = match cn {
            Some(cn) if rdn.attr().eq_ignore_ascii_case(COMMON_NAME) => cn,
            Some(cn) => {
                changes.push(Modification::replace(COMMON_NAME, [cn]));
                rdn.value()
            }
            None => rdn.value(),
        };
        let target = parent.child(rdn.attr(), value)?;
        if target == *dn {
            return Ok(None);
        }
        self.check_location(&target, scoped)?;
        Ok(Some(target))
    }

    /// DNs of `roles`, leaving out roles every identity holds implicitly.
    fn role_dns_of(&self, roles: &[Role]) -> DirectoryResult<Vec<Dn>> {
        roles
            .iter()
            .filter(|role| {
                let implicit = self.dialect.is_implicit_role(role);
                if implicit {
                    debug!(role = %role.principal_name, "Membership is implicit, not written");
                }
                !implicit
            })
            .map(|role| match role.attribute(DN_ATTRIBUTE) {
                Some(dn) => Dn::parse(dn),
                None => self.role_by_name(&role.principal_name).map(|r| r.dn().clone()),
            })
            .collect()
    }

    fn assign_role(&self, client: &mut F::Client, member: &Dn, role: &Dn) -> DirectoryResult<()> {
        let change = Modification::add(&self.config.role_member_attribute, [member.to_string()]);
        match client.modify(role, &[change]) {
            Err(DirectoryError::Operation {
                code: result_code::ATTRIBUTE_OR_VALUE_EXISTS,
                ..
            }) => {
                warn!(member = %member, role = %role, "Already a member of the role");
                Ok(())
            }
            other => other,
        }
    }

    fn revoke_role(&self, client: &mut F::Client, member: &Dn, role: &Dn) -> DirectoryResult<()> {
        let change = Modification::delete(&self.config.role_member_attribute, [member.to_string()]);
        match client.modify(role, &[change]) {
            Err(DirectoryError::Operation {
                code: result_code::NO_SUCH_ATTRIBUTE,
                ..
            }) => {
                warn!(member = %member, role = %role, "Not a member of the role");
                Ok(())
            }
            other => other,
        }
    }

    // === Mapping ===

    fn map_identity(
        &self,
        entry: &RawEntry,
        roles: &RefCell<HashMap<String, Option<DirectoryRole>>>,
    ) -> DirectoryResult<DirectoryIdentity> {
        let config = &self.config;
        let dn = entry_dn(entry)?;

        let guid = self.decoder.guid(entry, &config.identity_guid_attribute)?;
        let name = entry.get_attr(&config.identity_name_attribute).unwrap_or_default();
        let mut identity = Identity::new(guid, name);
        identity.full_name = entry
            .get_attr(&config.identity_full_name_attribute)
            .map(str::to_string);
        identity.email = entry
            .get_attr(&config.identity_email_attribute)
            .map(str::to_string);

        identity.set_attribute(DN_ATTRIBUTE, vec![entry.dn.clone()]);
        for (attr, values) in &entry.attributes {
            if !attr.eq_ignore_ascii_case(&config.identity_guid_attribute)
                && !attr.eq_ignore_ascii_case(&config.identity_name_attribute)
            {
                identity.set_attribute(attr.clone(), values.clone());
            }
        }

        if config.role_mode.is_enabled() {
            for role in self.identity_roles(entry, roles)? {
                identity.add_role(role.into_inner());
            }
        }

        self.decoder.complete_identity(entry, &mut identity)?;

        Ok(DirectoryIdentity::new(identity, dn))
    }

    /// Resolves the roles an identity entry refers to.
    ///
    /// Roles that do not exist or are filtered out are left out.
    fn identity_roles(
        &self,
        entry: &RawEntry,
        cache: &RefCell<HashMap<String, Option<DirectoryRole>>>,
    ) -> DirectoryResult<Vec<DirectoryRole>> {
        let config = &self.config;
        let mut found = Vec::new();

        let mut resolve = |key: String,
                           lookup: &dyn Fn() -> DirectoryResult<Option<DirectoryRole>>|
         -> DirectoryResult<()> {
            let cached = cache.borrow().get(&key).cloned();
            let role = match cached {
                Some(role) => role,
                None => {
                    let role = lookup()?;
                    if role.is_none() {
                        debug!(reference = %key, "Identity refers to a role that is missing or out of scope");
                    }
                    cache.borrow_mut().insert(key, role.clone());
                    role
                }
            };
            found.extend(role);
            Ok(())
        };

        let role_class = self.dialect.role_class_filter(config);

        if let Some(attr) = &config.identity_role_guid_attribute {
            for guid in entry.get_attrs(attr) {
                let filter = and([
                    role_class.clone(),
                    format!(
                        "({}={})",
                        config.role_guid_attribute,
                        self.decoder.guid_filter_value(guid)?
                    ),
                ]);
                resolve(format!("guid:{guid}"), &|| {
                    self.find_role(self.role_bases(), &filter, |_| true)
                })?;
            }
        } else if let Some(attr) = &config.identity_role_name_attribute {
            for name in entry.get_attrs(attr) {
                let filter = self.dialect.role_filter(config, name);
                resolve(format!("name:{name}"), &|| {
                    self.find_role(self.role_bases(), &filter, |_| true)
                })?;
            }
        }

        for reference in self.decoder.role_reference_filters(entry)? {
            let filter = and([role_class.as_str(), reference.as_str()]);
            resolve(format!("filter:{reference}"), &|| {
                self.find_role(self.role_bases(), &filter, |_| true)
            })?;
        }

        if let Some(attr) = &config.member_of_attribute {
            for value in entry.get_attrs(attr) {
                let role_dn = Dn::parse(value).map_err(|e| {
                    DirectoryError::mapping(format!("invalid {attr} value on {}: {e}", entry.dn))
                })?;
                let filter = role_class.clone();
                resolve(format!("dn:{role_dn}"), &|| {
                    let found = self.find_role(SearchBases::single(role_dn.clone()), &filter, |r| {
                        *r.dn() == role_dn
                    });
                    match found {
                        Err(DirectoryError::Operation {
                            code: result_code::NO_SUCH_OBJECT,
                            ..
                        }) => Ok(None),
                        other => other,
                    }
                })?;
            }
        }

        Ok(found)
    }
}

fn credential_outcome(dn: &str, result: DirectoryResult<()>) -> DirectoryResult<bool> {
    match result {
        Ok(()) => {
            info!(dn = %dn, "Credentials accepted");
            Ok(true)
        }
        Err(e) if e.is_invalid_credentials() => {
            info!(dn = %dn, "Credentials rejected");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

fn entry_dn(entry: &RawEntry) -> DirectoryResult<Dn> {
    Dn::parse(&entry.dn)
        .map_err(|e| DirectoryError::mapping(format!("entry has an unparsable DN: {e}")))
}

/// Common name of a new identity: its full name, else
/// `givenName [initials.] sn`, else its principal name.
#[must_use]
pub fn common_name_of(identity: &Identity) -> String {
    if let Some(full_name) = non_blank(identity.full_name.as_deref()) {
        return full_name.to_string();
    }
    let given = non_blank(identity.attribute("givenName"));
    let surname = non_blank(identity.attribute("sn"));
    if given.is_none() && surname.is_none() {
        return identity.principal_name.trim().to_string();
    }
    let initials = non_blank(identity.attribute("initials")).map(|i| format!("{i}."));
    [given.map(str::to_string), initials, surname.map(str::to_string)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Changes turning `current` attributes into `desired` ones.
///
/// Attributes missing from `desired` or matched by `skip` are left alone.
/// Blank values are dropped and an attribute left without values is removed.
pub fn attribute_changes(
    current: &Attributes,
    desired: &Attributes,
    skip: impl Fn(&str) -> bool,
) -> Vec<Modification> {
    let mut changes = Vec::new();
    for (attr, values) in desired {
        if skip(attr) {
            continue;
        }
        let values: Vec<String> = values.iter().filter(|v| !v.trim().is_empty()).cloned().collect();
        let old = current
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map(|(_, old)| old);
        match old {
            None if values.is_empty() => {}
            None => changes.push(Modification::add(attr, values)),
            Some(old) if *old == values => {}
            Some(_) if values.is_empty() => changes.push(Modification::clear(attr)),
            Some(_) => changes.push(Modification::replace(attr, values)),
        }
    }
    changes
}

/// Roles to revoke and roles to assign, matched by name.
fn role_changes(current: &[Role], desired: &[Role]) -> (Vec<Role>, Vec<Role>) {
    let named = |roles: &[Role], name: &str| roles.iter().any(|r| r.principal_name == name);
    let revoke = current
        .iter()
        .filter(|r| !named(desired, &r.principal_name))
        .cloned()
        .collect();
    let assign = desired
        .iter()
        .filter(|r| !named(current, &r.principal_name))
        .cloned()
        .collect();
    (revoke, assign)
}

/// The desired value when it is set and differs from the current one.
fn changed<'a>(current: Option<&str>, desired: Option<&'a str>) -> Option<&'a str> {
    non_blank(desired).filter(|d| Some(*d) != non_blank(current))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn first_value<'a>(attributes: &'a Attributes, name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(attr, _)| attr.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| non_blank(values.first().map(String::as_str)))
}

/// Non-blank attributes not matched by `skip`.
fn copied_attributes(attributes: &Attributes, skip: impl Fn(&str) -> bool) -> TextAttributes {
    attributes
        .iter()
        .filter(|(attr, _)| !skip(attr))
        .filter_map(|(attr, values)| {
            let values: Vec<String> = values.iter().filter(|v| !v.trim().is_empty()).cloned().collect();
            (!values.is_empty()).then(|| (attr.clone(), values))
        })
        .collect()
}

fn upsert(attributes: &mut TextAttributes, attr: String, values: Vec<String>) {
    attributes.retain(|(name, _)| !name.eq_ignore_ascii_case(&attr));
    attributes.push((attr, values));
}

fn encode(attributes: TextAttributes) -> Vec<(String, AttributeValues)> {
    attributes
        .into_iter()
        .map(|(attr, values)| (attr, values.into_iter().map(String::into_bytes).collect()))
        .collect()
}

/// Returns the first value of a search, or `NotFound`.
fn first<C, M>(what: &str, mut search: PagedSearch<C, M>) -> DirectoryResult<M::Output>
where
    C: DirectoryClient,
    M: ResultMapper,
{
    match search.next() {
        Some(result) => result,
        None => Err(DirectoryError::not_found(what)),
    }
}

// ============================================================================
// Mappers
// ============================================================================

/// Maps identity entries, resolving their roles.
pub struct IdentityMapper<'a, F: ClientFactory> {
    connector: &'a DirectoryConnector<F>,
    roles: RefCell<HashMap<String, Option<DirectoryRole>>>,
}

impl<'a, F: ClientFactory> IdentityMapper<'a, F> {
    fn new(connector: &'a DirectoryConnector<F>) -> Self {
        Self {
            connector,
            roles: RefCell::new(HashMap::new()),
        }
    }
}

impl<F: ClientFactory> ResultMapper for IdentityMapper<'_, F> {
    type Output = DirectoryIdentity;

    fn map(&self, entry: &RawEntry) -> DirectoryResult<Option<DirectoryIdentity>> {
        self.connector.map_identity(entry, &self.roles).map(Some)
    }
}

/// Maps role entries, applying the role name and DN rules.
///
/// The identity scope rules do not apply to roles.
pub struct RoleMapper<'a> {
    config: &'a DirectoryConfig,
    decoder: &'a dyn EntryDecoder,
}

impl RoleMapper<'_> {
    fn is_role_included(&self, name: &str, dn: &Dn) -> bool {
        match self.config.role_mode {
            RoleMode::Disabled => false,
            RoleMode::PrincipalNames => self.config.role_names.is_included(name),
            RoleMode::DistinguishedNames => is_included(dn, &self.config.role_dns),
            RoleMode::ServerDistinguishedNames => {
                // Includes narrowed the search bases already.
                let excludes_only = IncludeExcludeRules::new(
                    self.config.role_dns.base().clone(),
                    Vec::new(),
                    self.config.role_dns.excludes().to_vec(),
                );
                is_included(dn, &excludes_only)
            }
        }
    }
}

impl ResultMapper for RoleMapper<'_> {
    type Output = DirectoryRole;

    fn map(&self, entry: &RawEntry) -> DirectoryResult<Option<DirectoryRole>> {
        let Some(name) = entry.get_attr(&self.config.role_name_attribute) else {
            warn!(dn = %entry.dn, attribute = %self.config.role_name_attribute, "Role entry has no name, skipping");
            return Ok(None);
        };
        let dn = entry_dn(entry)?;
        if !self.is_role_included(name, &dn) {
            return Ok(None);
        }

        let guid = self.decoder.guid(entry, &self.config.role_guid_attribute)?;
        let mut role = Role::new(guid, name);
        role.set_attribute(DN_ATTRIBUTE, vec![entry.dn.clone()]);
        for (attr, values) in &entry.attributes {
            if !attr.eq_ignore_ascii_case(&self.config.role_guid_attribute)
                && !attr.eq_ignore_ascii_case(&self.config.role_name_attribute)
            {
                role.set_attribute(attr.clone(), values.clone());
            }
        }
        Ok(Some(DirectoryRole::new(role, dn)))
    }

    fn applies_scope_filter(&self) -> bool {
        false
    }
}

// ============================================================================
// Connector Traits
// ============================================================================

impl<F> Connector for DirectoryConnector<F>
where
    F: ClientFactory,
    F::Client: 'static,
{
    type Identity = DirectoryIdentity;
    type Role = DirectoryRole;

    fn connector_type(&self) -> &'static str {
        "directory"
    }

    fn capabilities(&self) -> &[ConnectorCapability] {
        match (self.config.role_mode.is_enabled(), self.is_read_only()) {
            (true, true) => CAPABILITIES,
            (false, true) => CAPABILITIES_WITHOUT_ROLES,
            (true, false) => WRITE_CAPABILITIES,
            (false, false) => WRITE_CAPABILITIES_WITHOUT_ROLES,
        }
    }

    fn test_connection(&self) -> ConnectorResult<()> {
        Ok(Self::test_connection(self)?)
    }

    fn all_identities(&self) -> ConnectorResult<PrincipalIter<'_, DirectoryIdentity>> {
        let search = self.identities()?;
        Ok(Box::new(search.map(|r| r.map_err(ConnectorError::from))))
    }

    fn identity_by_name(&self, name: &str) -> ConnectorResult<DirectoryIdentity> {
        Ok(Self::identity_by_name(self, name)?)
    }

    fn identity_by_guid(&self, guid: &str) -> ConnectorResult<DirectoryIdentity> {
        Ok(Self::identity_by_guid(self, guid)?)
    }

    fn all_roles(&self) -> ConnectorResult<PrincipalIter<'_, DirectoryRole>> {
        match self.roles()? {
            Some(search) => Ok(Box::new(search.map(|r| r.map_err(ConnectorError::from)))),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn role_by_name(&self, name: &str) -> ConnectorResult<DirectoryRole> {
        Ok(Self::role_by_name(self, name)?)
    }

    fn is_read_only(&self) -> bool {
        self.config.is_read_only()
    }
}

impl<F> ConnectorWriter for DirectoryConnector<F>
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
        Ok(Self::update_identity(self, current, desired)?)
    }

    fn delete_identity(&self, identity: &DirectoryIdentity) -> ConnectorResult<()> {
        Ok(self.delete_entry("delete identity", identity.dn())?)
    }

    fn create_role(&self, role: &Role) -> ConnectorResult<DirectoryRole> {
        Ok(Self::create_role(self, role)?)
    }

    fn update_role(&self, current: &DirectoryRole, desired: &Role) -> ConnectorResult<()> {
        Ok(Self::update_role(self, current, desired)?)
    }

    fn delete_role(&self, role: &DirectoryRole) -> ConnectorResult<()> {
        Ok(self.delete_entry("delete role", role.dn())?)
    }

    fn set_password(
        &self,
        identity: &DirectoryIdentity,
        password: &str,
        force_change: bool,
    ) -> ConnectorResult<()> {
        Ok(self.set_entry_password(identity.dn(), password, force_change)?)
    }

    fn change_password(
        &self,
        identity: &DirectoryIdentity,
        old_password: &str,
        new_password: &str,
    ) -> ConnectorResult<()> {
        Ok(self.change_entry_password(identity.dn(), old_password, new_password)?)
    }
}

impl<F: ClientFactory> CredentialValidator for DirectoryConnector<F> {
    fn check_credentials(&self, principal: &dyn Principal, password: &str) -> ConnectorResult<bool> {
        if let Some(located) = principal.as_distinguished() {
            return Ok(self.check_credentials_by_dn(located.distinguished_name(), password)?);
        }
        let identity = self.identity_by_name(principal.principal_name())?;
        Ok(self.check_credentials_by_dn(identity.distinguished_name(), password)?)
    }
}

//! Connector traits.
//!
//! A connector is a facade over an external identity store. It exposes
//! identities and roles as lazily evaluated sequences and can validate
//! credentials on behalf of the caller. Connectors that can change the store
//! also implement [`ConnectorWriter`].
//!
//! ## Security
//!
//! Passwords passed to [`CredentialValidator`] and [`ConnectorWriter`] must
//! never be logged or stored by implementations.

use ic_model::{Identity, Principal, Role};

use crate::error::{ConnectorError, ConnectorResult};

// ============================================================================
// Capabilities
// ============================================================================

/// Optional features a connector may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorCapability {
    /// Identities can be listed and looked up.
    Identities,
    /// Roles can be listed and looked up.
    Roles,
    /// Passwords can be checked.
    AuthenticationCheck,
    /// Identities carry their role memberships.
    IdentityRoles,
    /// Organizational units can be listed.
    OrganizationalUnits,
    /// Identities can be created.
    CreateIdentity,
    /// Identities can be updated.
    UpdateIdentity,
    /// Identities can be deleted.
    DeleteIdentity,
    /// Roles can be created.
    CreateRole,
    /// Roles can be updated.
    UpdateRole,
    /// Roles can be deleted.
    DeleteRole,
    /// An administrator can set passwords.
    PasswordSet,
    /// Identities can change their own password.
    PasswordChange,
    /// A password change can be forced at next sign-on.
    ForcePasswordChange,
    /// Accounts can be locked and unlocked.
    AccountLocking,
    /// Accounts can be disabled and enabled.
    AccountDisable,
}

/// A fallible, lazily evaluated sequence of principals.
///
/// Once an item is `Err` the sequence ends.
pub type PrincipalIter<'a, T> = Box<dyn Iterator<Item = ConnectorResult<T>> + 'a>;

// ============================================================================
// Connector
// ============================================================================

/// Read access to an identity store.
pub trait Connector {
    /// Identity type produced by this connector.
    type Identity: Principal;
    /// Role type produced by this connector.
    type Role: Principal;

    /// Returns the connector type identifier.
    fn connector_type(&self) -> &'static str;

    /// Returns the supported capabilities.
    fn capabilities(&self) -> &[ConnectorCapability];

    /// Checks if a capability is supported.
    fn supports(&self, capability: ConnectorCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Verifies that the backend is reachable with the configured credentials.
    fn test_connection(&self) -> ConnectorResult<()>;

    // === Identity Lookup ===

    /// Lists all identities in scope.
    ///
    /// Fails up front if the backend cannot be reached; never returns an empty
    /// sequence in place of an error.
    fn all_identities(&self) -> ConnectorResult<PrincipalIter<'_, Self::Identity>>;

    /// Gets an identity by principal name.
    ///
    /// Returns `PrincipalNotFound` if there is no such identity.
    fn identity_by_name(&self, name: &str) -> ConnectorResult<Self::Identity>;

    /// Gets an identity by backend identifier.
    ///
    /// Returns `PrincipalNotFound` if there is no such identity.
    fn identity_by_guid(&self, guid: &str) -> ConnectorResult<Self::Identity>;

    // === Role Lookup ===

    /// Lists all roles in scope. Empty if roles are disabled.
    fn all_roles(&self) -> ConnectorResult<PrincipalIter<'_, Self::Role>>;

    /// Gets a role by name.
    ///
    /// Returns `PrincipalNotFound` if there is no such role or roles are disabled.
    fn role_by_name(&self, name: &str) -> ConnectorResult<Self::Role>;

    /// Whether writes are refused. Connectors without a [`ConnectorWriter`]
    /// implementation are always read-only.
    fn is_read_only(&self) -> bool {
        true
    }
}

// ============================================================================
// Connector Writer
// ============================================================================

/// Write access to an identity store.
///
/// Every operation defaults to `NotSupported`. Implementations return
/// `ReadOnly` from all of them while [`Connector::is_read_only`] is true.
pub trait ConnectorWriter: Connector {
    // === Identities ===

    /// Creates an identity and returns it as stored.
    ///
    /// Roles listed on `identity` are assigned. When `password` is given it
    /// is set, and `force_change` requires a change at next sign-on.
    fn create_identity(
        &self,
        _identity: &Identity,
        _password: Option<&str>,
        _force_change: bool,
    ) -> ConnectorResult<Self::Identity> {
        Err(ConnectorError::not_supported("create identity"))
    }

    /// Brings `current` in line with `desired`: attributes, roles and name.
    fn update_identity(&self, _current: &Self::Identity, _desired: &Identity) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("update identity"))
    }

    /// Deletes an identity.
    fn delete_identity(&self, _identity: &Self::Identity) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("delete identity"))
    }

    // === Roles ===

    /// Creates a role and returns it as stored.
    fn create_role(&self, _role: &Role) -> ConnectorResult<Self::Role> {
        Err(ConnectorError::not_supported("create role"))
    }

    /// Brings `current` in line with `desired`.
    fn update_role(&self, _current: &Self::Role, _desired: &Role) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("update role"))
    }

    /// Deletes a role.
    fn delete_role(&self, _role: &Self::Role) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("delete role"))
    }

    // === Passwords ===

    /// Sets a password as an administrator.
    fn set_password(
        &self,
        _identity: &Self::Identity,
        _password: &str,
        _force_change: bool,
    ) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("set password"))
    }

    /// Changes a password on behalf of its owner.
    fn change_password(
        &self,
        _identity: &Self::Identity,
        _old_password: &str,
        _new_password: &str,
    ) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("change password"))
    }

    // === Account State ===

    /// Locks an account.
    fn lock_identity(&self, _identity: &Self::Identity) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("lock identity"))
    }

    /// Unlocks an account.
    fn unlock_identity(&self, _identity: &Self::Identity) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("unlock identity"))
    }

    /// Disables an account.
    fn disable_identity(&self, _identity: &Self::Identity) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("disable identity"))
    }

    /// Enables an account.
    fn enable_identity(&self, _identity: &Self::Identity) -> ConnectorResult<()> {
        Err(ConnectorError::not_supported("enable identity"))
    }
}

// ============================================================================
// Credential Validator
// ============================================================================

/// Validates passwords against the backend.
pub trait CredentialValidator {
    /// Checks a password for a principal previously returned by the connector.
    ///
    /// Returns `Ok(false)` when the backend rejects the credentials and `Err`
    /// when the check itself could not be performed.
    fn check_credentials(&self, principal: &dyn Principal, password: &str) -> ConnectorResult<bool>;

    /// Whether [`check_credentials_optimised`](Self::check_credentials_optimised)
    /// avoids a lookup before the check.
    fn supports_optimised_check(&self) -> bool {
        false
    }

    /// Checks a password by principal name without a prior lookup.
    fn check_credentials_optimised(&self, _name: &str, _password: &str) -> ConnectorResult<bool> {
        Err(ConnectorError::not_supported("optimised credential check"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns the first principal of a sequence.
///
/// `description` names the lookup in the `PrincipalNotFound` error when the
/// sequence is empty. Remaining items are not evaluated.
pub fn first_principal<T>(
    description: &str,
    mut iter: impl Iterator<Item = ConnectorResult<T>>,
) -> ConnectorResult<T> {
    match iter.next() {
        Some(result) => result,
        None => Err(ConnectorError::not_found(description)),
    }
}

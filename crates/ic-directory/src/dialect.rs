//! Backend-specific filters and write encoding.
//!
//! [`DirectoryConnector`](crate::DirectoryConnector) builds every lookup
//! filter and every write through a [`Dialect`]. [`StandardDialect`] uses the
//! configured object classes and attributes as they are; directories with
//! their own naming rules (Active Directory's `sAMAccountName` and
//! `userPrincipalName`) supply their own.

use ic_model::{Identity, Role};

use crate::client::Modification;
use crate::config::DirectoryConfig;
use crate::connector::DN_ATTRIBUTE;
use crate::filter::{object_class, object_class_filter};

/// Object class attribute.
pub const OBJECT_CLASS: &str = "objectClass";

/// Common name attribute.
pub const COMMON_NAME: &str = "cn";

/// Organizational unit attribute. On a new principal it names the container.
pub const OU_ATTRIBUTE: &str = "ou";

/// Text attributes of an entry to be written.
pub type TextAttributes = Vec<(String, Vec<String>)>;

/// How a directory names, finds and writes principals.
pub trait Dialect: Send + Sync {
    // === Filters ===

    /// Matches every identity entry.
    fn identity_class_filter(&self, config: &DirectoryConfig) -> String {
        object_class(&config.identity_object_class)
    }

    /// Matches identities named `name`. `*` matches every named identity.
    fn identity_filter(&self, config: &DirectoryConfig, name: &str) -> String {
        object_class_filter(
            &config.identity_object_class,
            &config.identity_name_attribute,
            name,
        )
    }

    /// Matches every role entry.
    fn role_class_filter(&self, config: &DirectoryConfig) -> String {
        object_class(&config.role_object_class)
    }

    /// Matches roles named `name`. `*` matches every named role.
    fn role_filter(&self, config: &DirectoryConfig, name: &str) -> String {
        object_class_filter(&config.role_object_class, &config.role_name_attribute, name)
    }

    // === Writes ===

    /// Attributes that name a new identity.
    fn identity_naming_attributes(&self, config: &DirectoryConfig, identity: &Identity) -> TextAttributes {
        vec![(
            config.identity_name_attribute.clone(),
            vec![identity.principal_name.clone()],
        )]
    }

    /// Attributes that name a new role.
    fn role_naming_attributes(&self, config: &DirectoryConfig, role: &Role) -> TextAttributes {
        vec![(config.role_name_attribute.clone(), vec![role.principal_name.clone()])]
    }

    /// Object classes of a new identity.
    fn identity_object_classes(&self, config: &DirectoryConfig) -> Vec<String> {
        config.identity_creation_object_classes.clone()
    }

    /// Attributes every new identity starts with.
    fn initial_identity_attributes(&self, _config: &DirectoryConfig) -> TextAttributes {
        Vec::new()
    }

    /// Object classes of a new role.
    fn role_object_classes(&self, config: &DirectoryConfig) -> Vec<String> {
        config.role_creation_object_classes.clone()
    }

    /// Changes that set `password` as an administrator.
    fn set_password(&self, config: &DirectoryConfig, password: &str) -> Vec<Modification> {
        vec![Modification::replace(
            &config.identity_password_attribute,
            [password],
        )]
    }

    /// Changes that require (or stop requiring) a password change at next
    /// sign-on. Empty when the directory has no such flag.
    fn require_password_change(&self, _required: bool) -> Vec<Modification> {
        Vec::new()
    }

    /// Changes that replace `old_password` with `new_password` on behalf of
    /// the owner, or `None` when the directory only supports setting.
    fn change_password(
        &self,
        _config: &DirectoryConfig,
        _old_password: &str,
        _new_password: &str,
    ) -> Option<Vec<Modification>> {
        None
    }

    /// Attributes an update never writes. Renames cover the naming ones.
    fn is_managed_attribute(&self, config: &DirectoryConfig, attribute: &str) -> bool {
        [
            DN_ATTRIBUTE,
            OBJECT_CLASS,
            COMMON_NAME,
            OU_ATTRIBUTE,
            config.identity_guid_attribute.as_str(),
            config.role_guid_attribute.as_str(),
            config.identity_password_attribute.as_str(),
        ]
        .iter()
        .any(|managed| managed.eq_ignore_ascii_case(attribute))
            || config
                .member_of_attribute
                .as_deref()
                .is_some_and(|member_of| member_of.eq_ignore_ascii_case(attribute))
    }

    /// Whether every identity holds `role` without being listed as a member.
    fn is_implicit_role(&self, _role: &Role) -> bool {
        false
    }
}

/// Dialect of a standards-based directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDialect;

impl Dialect for StandardDialect {}

//! Identity domain model.
//!
//! Identities are the user accounts a connector exposes. They carry a
//! backend identifier, a principal (login) name, profile attributes,
//! account and password status, and the roles they are a member of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::principal::{Attributes, Principal};
use crate::role::Role;
use crate::status::{AccountStatus, PasswordStatus};

/// A user account in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    // === Identity ===
    /// Backend unique identifier.
    pub guid: String,
    /// Login name, unique within the backend.
    pub principal_name: String,

    // === Profile ===
    /// Display name.
    pub full_name: Option<String>,
    /// Primary email address.
    pub email: Option<String>,
    /// Last successful sign on, if the backend tracks it.
    pub last_sign_on: Option<DateTime<Utc>>,

    // === Status ===
    /// Account status.
    #[serde(default)]
    pub account_status: AccountStatus,
    /// Password status.
    #[serde(default)]
    pub password_status: PasswordStatus,

    // === Membership ===
    /// Roles this identity is a member of.
    #[serde(default)]
    pub roles: Vec<Role>,

    // === Custom Attributes ===
    /// All other attributes, by name.
    #[serde(default)]
    pub attributes: Attributes,
}

impl Identity {
    /// Creates an identity with default status and no attributes.
    #[must_use]
    pub fn new(guid: impl Into<String>, principal_name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            principal_name: principal_name.into(),
            full_name: None,
            email: None,
            last_sign_on: None,
            account_status: AccountStatus::default(),
            password_status: PasswordStatus::default(),
            roles: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Sets (replaces) an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attributes.insert(name.into(), values);
    }

    /// Adds a role unless one with the same name is already present.
    pub fn add_role(&mut self, role: Role) {
        if !self.member_of(&role.principal_name) {
            self.roles.push(role);
        }
    }

    /// Checks role membership by role name.
    #[must_use]
    pub fn member_of(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r.principal_name == role_name)
    }
}

impl Principal for Identity {
    fn guid(&self) -> &str {
        &self.guid
    }

    fn principal_name(&self) -> &str {
        &self.principal_name
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

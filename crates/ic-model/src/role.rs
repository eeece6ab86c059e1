//! Role domain model.
//!
//! Roles are groups of identities as reported by the backend.

use serde::{Deserialize, Serialize};

use crate::principal::{Attributes, Principal};

/// A role (group) in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Backend unique identifier.
    pub guid: String,
    /// Role name.
    pub principal_name: String,
    /// Additional attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

impl Role {
    /// Creates a role with no attributes.
    #[must_use]
    pub fn new(guid: impl Into<String>, principal_name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            principal_name: principal_name.into(),
            attributes: Attributes::new(),
        }
    }

    /// Sets (replaces) an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attributes.insert(name.into(), values);
    }
}

impl Principal for Role {
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

//! The principal abstraction common to identities and roles.

use std::collections::BTreeMap;

/// Multi-valued attribute map keyed by attribute name.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Capability implemented by principals that live at a directory location.
///
/// Callers that need a DN (for example to bind as a user) query it through
/// [`Principal::as_distinguished`] instead of assuming a concrete type.
pub trait HasDistinguishedName {
    /// Returns the full distinguished name of the entry.
    fn distinguished_name(&self) -> &str;
}

/// Anything a connector can look up: identities and roles.
pub trait Principal {
    /// Backend-assigned unique identifier. May be empty if the backend has none.
    fn guid(&self) -> &str;

    /// The name the principal is known by (login name, role name).
    fn principal_name(&self) -> &str;

    /// All attributes of the principal.
    fn attributes(&self) -> &Attributes;

    /// Returns the directory location of the principal, if it has one.
    fn as_distinguished(&self) -> Option<&dyn HasDistinguishedName> {
        None
    }

    /// Gets the first value of an attribute.
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes()
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets all values of an attribute, empty if absent.
    fn attribute_values(&self, name: &str) -> &[String] {
        self.attributes()
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Gets the first value of an attribute or a default.
    fn attribute_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attribute(name).unwrap_or(default)
    }
}

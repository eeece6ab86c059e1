//! Raw directory entries.

use std::collections::HashMap;

use ldap3::SearchEntry;

/// A directory entry as returned by the server.
///
/// Attribute names are kept as the server sent them; lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// Distinguished name, as sent by the server.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,

    /// Binary attributes.
    pub binary_attributes: HashMap<String, Vec<Vec<u8>>>,
}

impl RawEntry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Self::default()
        }
    }

    /// Adds text values to an attribute.
    #[must_use]
    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Adds a binary value to an attribute.
    #[must_use]
    pub fn with_binary_attr(mut self, name: impl Into<String>, value: Vec<u8>) -> Self {
        self.binary_attributes
            .entry(name.into())
            .or_default()
            .push(value);
        self
    }

    fn lookup<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
        map.get(name).or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Gets the first value of a text attribute.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        Self::lookup(&self.attributes, name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets all values of a text attribute, empty if absent.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> &[String] {
        Self::lookup(&self.attributes, name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Gets the first value of a binary attribute.
    #[must_use]
    pub fn get_binary_attr(&self, name: &str) -> Option<&[u8]> {
        Self::lookup(&self.binary_attributes, name)
            .and_then(|v| v.first())
            .map(Vec::as_slice)
    }

    /// Checks if the entry has a text or binary attribute.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        Self::lookup(&self.attributes, name).is_some()
            || Self::lookup(&self.binary_attributes, name).is_some()
    }

    /// Gets the first value of an attribute as text, hex-encoding binary values.
    #[must_use]
    pub fn get_attr_or_hex(&self, name: &str) -> Option<String> {
        self.get_attr(name)
            .map(str::to_string)
            .or_else(|| self.get_binary_attr(name).map(hex::encode))
    }
}

impl From<SearchEntry> for RawEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
            binary_attributes: entry.bin_attrs,
        }
    }
}

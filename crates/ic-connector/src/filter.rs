//! Include/exclude filtering of principal names.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Name-based include/exclude rules.
///
/// An empty include set includes everything. Excludes always win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    /// Names to include.
    #[serde(default)]
    pub includes: BTreeSet<String>,
    /// Names to exclude.
    #[serde(default)]
    pub excludes: BTreeSet<String>,
}

impl NameFilter {
    /// Creates a filter from include and exclude lists.
    #[must_use]
    pub fn new<I, E, S>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            includes: includes.into_iter().map(Into::into).collect(),
            excludes: excludes.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if no rule is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Checks a name against the rules.
    #[must_use]
    pub fn is_included(&self, name: &str) -> bool {
        let included = self.includes.is_empty() || self.includes.contains(name);
        included && !self.excludes.contains(name)
    }
}

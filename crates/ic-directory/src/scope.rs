//! Include/exclude scope filtering of directory entries.
//!
//! A directory connector can be restricted to parts of the tree below its
//! base DN. [`IncludeExcludeRules`] holds the subtrees; [`ScopeFilter`]
//! decides per entry whether its DN is in scope.

use serde::{Deserialize, Serialize};

use crate::dn::Dn;

/// Subtrees included in and excluded from the searchable population.
///
/// Both sets are descendants of `base`. An empty include set means every
/// descendant of `base` is included. Excludes always take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeExcludeRules {
    base: Dn,
    #[serde(default)]
    includes: Vec<Dn>,
    #[serde(default)]
    excludes: Vec<Dn>,
}

impl IncludeExcludeRules {
    /// Creates rules under `base`.
    ///
    /// Includes and excludes that are not already under `base` are treated
    /// as relative to it. Includes that are also excluded are dropped.
    #[must_use]
    pub fn new(base: Dn, includes: Vec<Dn>, excludes: Vec<Dn>) -> Self {
        let excludes: Vec<Dn> = excludes.iter().map(|dn| dn.rebase_onto(&base)).collect();
        let includes = includes
            .iter()
            .map(|dn| dn.rebase_onto(&base))
            .filter(|dn| !excludes.contains(dn))
            .collect();
        Self {
            base,
            includes,
            excludes,
        }
    }

    /// Rules with no includes or excludes.
    #[must_use]
    pub fn unrestricted(base: Dn) -> Self {
        Self::new(base, Vec::new(), Vec::new())
    }

    /// The root all rules are relative to.
    #[must_use]
    pub fn base(&self) -> &Dn {
        &self.base
    }

    /// Included subtrees.
    #[must_use]
    pub fn includes(&self) -> &[Dn] {
        &self.includes
    }

    /// Excluded subtrees.
    #[must_use]
    pub fn excludes(&self) -> &[Dn] {
        &self.excludes
    }

    /// Adds an excluded subtree.
    pub fn exclude(&mut self, dn: Dn) {
        let dn = dn.rebase_onto(&self.base);
        self.includes.retain(|i| *i != dn);
        if !self.excludes.contains(&dn) {
            self.excludes.push(dn);
        }
    }
}

/// Decides whether a DN is in scope.
///
/// The DN must be a descendant-or-equal of some include (or of anything, if
/// there are no includes) and of no exclude.
#[must_use]
pub fn is_included(dn: &Dn, rules: &IncludeExcludeRules) -> bool {
    let included =
        rules.includes.is_empty() || rules.includes.iter().any(|i| dn.is_descendant_of(i));
    included && !rules.excludes.iter().any(|e| dn.is_descendant_of(e))
}

/// Stateless scope predicate bound to one set of rules.
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    rules: IncludeExcludeRules,
}

impl ScopeFilter {
    /// Creates a filter.
    #[must_use]
    pub const fn new(rules: IncludeExcludeRules) -> Self {
        Self { rules }
    }

    /// The rules applied.
    #[must_use]
    pub const fn rules(&self) -> &IncludeExcludeRules {
        &self.rules
    }

    /// See [`is_included`].
    #[must_use]
    pub fn is_included(&self, dn: &Dn) -> bool {
        is_included(dn, &self.rules)
    }
}

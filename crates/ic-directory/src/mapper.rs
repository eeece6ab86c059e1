//! Result mappers.
//!
//! A [`ResultMapper`] turns a [`RawEntry`] into a domain object. Returning
//! `Ok(None)` skips the entry silently; returning `Err` ends the search.

use crate::entry::RawEntry;
use crate::error::DirectoryResult;

/// Converts raw entries into domain objects.
pub trait ResultMapper {
    /// Produced type.
    type Output;

    /// Maps one entry. `Ok(None)` filters the entry out.
    fn map(&self, entry: &RawEntry) -> DirectoryResult<Option<Self::Output>>;

    /// Whether the include/exclude scope rules apply to this search.
    fn applies_scope_filter(&self) -> bool {
        true
    }
}

impl<M: ResultMapper + ?Sized> ResultMapper for &M {
    type Output = M::Output;

    fn map(&self, entry: &RawEntry) -> DirectoryResult<Option<Self::Output>> {
        (**self).map(entry)
    }

    fn applies_scope_filter(&self) -> bool {
        (**self).applies_scope_filter()
    }
}

/// A mapper backed by a closure.
pub struct FnMapper<F> {
    f: F,
    scope_filter: bool,
}

impl<F> FnMapper<F> {
    /// Wraps a closure; scope rules apply.
    pub fn new<T>(f: F) -> Self
    where
        F: Fn(&RawEntry) -> DirectoryResult<Option<T>>,
    {
        Self {
            f,
            scope_filter: true,
        }
    }

    /// Wraps a closure; scope rules are not applied.
    pub fn unfiltered<T>(f: F) -> Self
    where
        F: Fn(&RawEntry) -> DirectoryResult<Option<T>>,
    {
        Self {
            f,
            scope_filter: false,
        }
    }
}

impl<T, F> ResultMapper for FnMapper<F>
where
    F: Fn(&RawEntry) -> DirectoryResult<Option<T>>,
{
    type Output = T;

    fn map(&self, entry: &RawEntry) -> DirectoryResult<Option<T>> {
        (self.f)(entry)
    }

    fn applies_scope_filter(&self) -> bool {
        self.scope_filter
    }
}

/// Maps every entry to its DN.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnMapper;

impl ResultMapper for DnMapper {
    type Output = String;

    fn map(&self, entry: &RawEntry) -> DirectoryResult<Option<String>> {
        Ok(Some(entry.dn.clone()))
    }
}

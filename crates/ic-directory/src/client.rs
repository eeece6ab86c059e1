//! Directory client abstraction.
//!
//! The paged search core talks to the directory only through
//! [`DirectoryClient`]; connectors write through [`DirectoryWriter`]. The
//! production implementation of both is
//! [`LdapClient`](crate::connection::LdapClient); tests use in-memory fakes.

use crate::dn::Dn;
use crate::entry::RawEntry;
use crate::error::DirectoryResult;
use crate::paging::{PagedResultsControl, PagedResultsResponse};

/// How a search operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    /// The server returned all results for this page.
    Complete,
    /// The server returned a referral or partial result. Carries the
    /// server diagnostic or referral URLs.
    Referral(String),
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    /// Entries in server order.
    pub entries: Vec<RawEntry>,
    /// The paged results response control, if the server sent one.
    pub paged: Option<PagedResultsResponse>,
    /// Outcome of the operation.
    pub status: SearchStatus,
}

impl SearchResponse {
    /// A complete response.
    #[must_use]
    pub fn complete(entries: Vec<RawEntry>, paged: Option<PagedResultsResponse>) -> Self {
        Self {
            entries,
            paged,
            status: SearchStatus::Complete,
        }
    }
}

/// A connection to a directory able to run paged subtree searches.
///
/// A client is owned by a single search for its whole lifetime.
pub trait DirectoryClient {
    /// Runs a subtree search under `base` with the paged results control
    /// attached to this request only.
    ///
    /// A root `base` searches the whole directory.
    fn search(
        &mut self,
        base: &Dn,
        filter: &str,
        control: &PagedResultsControl,
    ) -> DirectoryResult<SearchResponse>;

    /// Releases the connection.
    fn close(&mut self) -> DirectoryResult<()>;
}

// ============================================================================
// Writes
// ============================================================================

/// Values of one attribute. Text values are stored as their UTF-8 bytes.
pub type AttributeValues = Vec<Vec<u8>>;

/// A change to one attribute of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Adds values.
    Add(String, AttributeValues),
    /// Replaces all values. No values removes the attribute.
    Replace(String, AttributeValues),
    /// Removes the given values, or the whole attribute when none are given.
    Delete(String, AttributeValues),
}

impl Modification {
    /// Adds text values.
    #[must_use]
    pub fn add<I, S>(attr: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self::Add(attr.into(), values.into_iter().map(Into::into).collect())
    }

    /// Replaces all values with text values.
    #[must_use]
    pub fn replace<I, S>(attr: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self::Replace(attr.into(), values.into_iter().map(Into::into).collect())
    }

    /// Removes the given text values.
    #[must_use]
    pub fn delete<I, S>(attr: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self::Delete(attr.into(), values.into_iter().map(Into::into).collect())
    }

    /// Removes the whole attribute.
    #[must_use]
    pub fn clear(attr: impl Into<String>) -> Self {
        Self::Delete(attr.into(), Vec::new())
    }

    /// The attribute changed.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add(attr, _) | Self::Replace(attr, _) | Self::Delete(attr, _) => attr,
        }
    }

    /// The values involved.
    #[must_use]
    pub fn values(&self) -> &[Vec<u8>] {
        match self {
            Self::Add(_, values) | Self::Replace(_, values) | Self::Delete(_, values) => values,
        }
    }
}

/// Write operations on directory entries.
///
/// Every operation fails with the server's result code when the server
/// rejects it.
pub trait DirectoryWriter {
    /// Creates an entry.
    fn add(&mut self, dn: &Dn, attributes: &[(String, AttributeValues)]) -> DirectoryResult<()>;

    /// Applies modifications to an entry atomically.
    fn modify(&mut self, dn: &Dn, changes: &[Modification]) -> DirectoryResult<()>;

    /// Removes a leaf entry.
    fn delete(&mut self, dn: &Dn) -> DirectoryResult<()>;

    /// Moves or renames an entry to `new_dn`, dropping the old RDN value.
    fn rename(&mut self, dn: &Dn, new_dn: &Dn) -> DirectoryResult<()>;
}

// ============================================================================
// Client Factory
// ============================================================================

/// Opens clients and checks credentials.
pub trait ClientFactory {
    /// Client type produced.
    type Client: DirectoryClient + DirectoryWriter;

    /// Opens a client bound as the service account.
    fn connect(&self) -> DirectoryResult<Self::Client>;

    /// Binds as `dn` with `password` on a fresh connection, then closes it.
    ///
    /// Rejected credentials are reported as an error for which
    /// [`DirectoryError::is_invalid_credentials`](crate::error::DirectoryError::is_invalid_credentials)
    /// is true.
    fn authenticate(&self, dn: &str, password: &str) -> DirectoryResult<()>;

    /// Like [`authenticate`](Self::authenticate), contacting `urls` in
    /// failover order instead of the configured controllers.
    fn authenticate_at(&self, urls: &[String], dn: &str, password: &str) -> DirectoryResult<()>;
}

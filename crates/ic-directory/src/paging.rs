//! RFC 2696 paged results handling.
//!
//! Every page is fetched with a fresh [`PageRequest`]. The request carries a
//! critical paged results control with the page size and the cookie from the
//! previous page (empty on the first page). The cookie for the following page
//! is read from the response control only once the page's entries have been
//! consumed: [`Page::into_cookie`] takes the page by value.

use std::fmt;

use tracing::{debug, warn};

use crate::client::{DirectoryClient, SearchStatus};
use crate::dn::Dn;
use crate::entry::RawEntry;
use crate::error::{DirectoryError, DirectoryResult};

/// OID of the paged results control.
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

// ============================================================================
// Controls
// ============================================================================

/// Paged results request control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResultsControl {
    /// Requested page size.
    pub size: u32,
    /// Cookie from the previous response, empty on the first page.
    pub cookie: Vec<u8>,
    /// Criticality flag.
    pub critical: bool,
}

/// Paged results response control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagedResultsResponse {
    /// Server estimate of the total result size. Informational, often 0.
    pub result_size: u32,
    /// Cookie for the next page, empty on the last page.
    pub cookie: Vec<u8>,
}

/// Opaque resume point returned by the server. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct ContinuationCookie(Vec<u8>);

impl ContinuationCookie {
    /// Wraps a cookie; an empty cookie means there are no more pages.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        (!bytes.is_empty()).then_some(Self(bytes))
    }

    /// Raw cookie bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ContinuationCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationCookie({})", hex::encode(&self.0))
    }
}

// ============================================================================
// Page Request
// ============================================================================

/// Parameters of a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    base: Dn,
    filter: String,
    page_size: u32,
    cookie: Option<ContinuationCookie>,
}

impl PageRequest {
    /// Request for the first page under `base`.
    #[must_use]
    pub fn first(base: Dn, filter: impl Into<String>, page_size: u32) -> Self {
        Self {
            base,
            filter: filter.into(),
            page_size,
            cookie: None,
        }
    }

    /// Request for the page following the one `cookie` was returned with.
    #[must_use]
    pub fn next(&self, cookie: ContinuationCookie) -> Self {
        Self {
            cookie: Some(cookie),
            ..self.clone()
        }
    }

    /// Search base.
    #[must_use]
    pub const fn base(&self) -> &Dn {
        &self.base
    }

    /// Filter, forwarded unparsed.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Maximum number of entries in the page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Cookie of the previous page.
    #[must_use]
    pub const fn cookie(&self) -> Option<&ContinuationCookie> {
        self.cookie.as_ref()
    }

    /// The control to attach to the search.
    #[must_use]
    pub fn control(&self) -> PagedResultsControl {
        PagedResultsControl {
            size: self.page_size,
            cookie: self
                .cookie
                .as_ref()
                .map(|c| c.as_bytes().to_vec())
                .unwrap_or_default(),
            critical: true,
        }
    }
}

// ============================================================================
// Page
// ============================================================================

/// A fetched page whose entries are consumed one at a time.
#[derive(Debug)]
pub struct Page {
    entries: std::vec::IntoIter<RawEntry>,
    response: Option<PagedResultsResponse>,
}

impl Page {
    /// Next entry in server order.
    pub fn next_entry(&mut self) -> Option<RawEntry> {
        self.entries.next()
    }

    /// Number of entries not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Consumes the page and returns the cookie for the next page.
    ///
    /// `None` if the server sent an empty cookie or no control at all.
    #[must_use]
    pub fn into_cookie(self) -> Option<ContinuationCookie> {
        debug_assert_eq!(self.entries.len(), 0, "cookie read before page was drained");
        self.response
            .and_then(|r| ContinuationCookie::from_bytes(r.cookie))
    }
}

/// Fetches one page.
///
/// The control is attached to this request only; nothing carries over to
/// later operations on the same client. A referral or partial result ends the
/// current base (the page's entries are kept, its cookie is dropped) unless
/// `follow_referrals` is set, in which case it is an error.
pub fn request_page<C: DirectoryClient + ?Sized>(
    client: &mut C,
    request: &PageRequest,
    follow_referrals: bool,
) -> DirectoryResult<Page> {
    let control = request.control();
    let response = client.search(request.base(), request.filter(), &control)?;

    let paged = match response.status {
        SearchStatus::Complete => response.paged,
        SearchStatus::Referral(message) => {
            if follow_referrals {
                return Err(DirectoryError::Referral {
                    base: request.base().to_string(),
                    message,
                });
            }
            warn!(base = %request.base(), %message, "Ignoring referral, ending search of this base");
            None
        }
    };

    debug!(
        base = %request.base(),
        entries = response.entries.len(),
        has_cookie = paged.as_ref().is_some_and(|p| !p.cookie.is_empty()),
        "Fetched page"
    );

    Ok(Page {
        entries: response.entries.into_iter(),
        response: paged,
    })
}

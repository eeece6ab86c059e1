//! Lazy paged search over one or more base DNs.
//!
//! [`PagedSearch`] walks the configured bases in order. For each base it
//! fetches one page at a time, passes every entry through the
//! [`ScopeFilter`] and then the [`ResultMapper`], and yields mapped values in
//! server order. A returned cookie re-issues the search for the same base;
//! no cookie moves on to the next base.
//!
//! The search owns its [`DirectoryClient`]. The client is closed exactly once:
//! on exhaustion, on the first error, on [`PagedSearch::close`], or on drop.

use std::collections::VecDeque;
use std::mem;

use tracing::{debug, error, trace, warn};

use crate::client::DirectoryClient;
use crate::config::DEFAULT_MAX_PAGE_SIZE;
use crate::dn::Dn;
use crate::entry::RawEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::mapper::ResultMapper;
use crate::paging::{request_page, Page, PageRequest};
use crate::scope::{IncludeExcludeRules, ScopeFilter};

// ============================================================================
// Search Bases
// ============================================================================

/// Ordered base DNs of a search.
///
/// An empty list means the default base of the search's rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchBases(Vec<Dn>);

impl SearchBases {
    /// Searches the given bases in order.
    #[must_use]
    pub fn new(bases: Vec<Dn>) -> Self {
        Self(bases)
    }

    /// Searches a single base.
    #[must_use]
    pub fn single(base: Dn) -> Self {
        Self(vec![base])
    }

    /// Searches the whole directory from the root.
    #[must_use]
    pub fn global() -> Self {
        Self(vec![Dn::root()])
    }

    /// Returns true if no base was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn resolve(self, default: &Dn) -> VecDeque<Dn> {
        if self.0.is_empty() {
            VecDeque::from([default.clone()])
        } else {
            self.0.into()
        }
    }
}

// ============================================================================
// Search Request
// ============================================================================

/// Parameters of a [`PagedSearch`].
#[derive(Debug, Clone)]
pub struct SearchRequest {
    bases: SearchBases,
    filter: String,
    page_size: u32,
    rules: IncludeExcludeRules,
    follow_referrals: bool,
}

impl SearchRequest {
    /// A search of the whole directory with no scope restriction.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            bases: SearchBases::default(),
            filter: filter.into(),
            page_size: DEFAULT_MAX_PAGE_SIZE,
            rules: IncludeExcludeRules::default(),
            follow_referrals: false,
        }
    }

    /// Sets the bases. Empty bases search the rules' base.
    #[must_use]
    pub fn bases(mut self, bases: SearchBases) -> Self {
        self.bases = bases;
        self
    }

    /// Sets the page size (at least 1).
    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sets the scope rules.
    #[must_use]
    pub fn rules(mut self, rules: IncludeExcludeRules) -> Self {
        self.rules = rules;
        self
    }

    /// Reports referrals as errors instead of ending the base.
    #[must_use]
    pub fn follow_referrals(mut self, follow: bool) -> Self {
        self.follow_referrals = follow;
        self
    }

    /// The filter.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

// ============================================================================
// Paged Search
// ============================================================================

enum State {
    /// Start the next base, or finish.
    NextBase,
    /// Fetch a page.
    Fetch(PageRequest),
    /// Walk the entries of a fetched page.
    Walk { request: PageRequest, page: Page },
    /// Exhausted, failed or closed.
    Done,
}

/// A lazy, forward-only sequence of mapped search results.
///
/// Iterating yields `DirectoryResult<T>`. After the first `Err` the sequence
/// is finished.
pub struct PagedSearch<C: DirectoryClient, M: ResultMapper> {
    client: Option<C>,
    mapper: M,
    scope: ScopeFilter,
    bases: VecDeque<Dn>,
    filter: String,
    page_size: u32,
    follow_referrals: bool,
    state: State,
    buffered: Option<M::Output>,
    pages_fetched: usize,
}

impl<C: DirectoryClient, M: ResultMapper> PagedSearch<C, M> {
    /// Creates a search. Nothing is fetched until the first call to
    /// [`has_next`](Self::has_next) or [`Iterator::next`].
    pub fn new(client: C, request: SearchRequest, mapper: M) -> Self {
        let bases = request.bases.resolve(request.rules.base());
        debug!(
            bases = ?bases.iter().map(ToString::to_string).collect::<Vec<_>>(),
            filter = %request.filter,
            page_size = request.page_size,
            "Starting paged search"
        );

        Self {
            client: Some(client),
            mapper,
            scope: ScopeFilter::new(request.rules),
            bases,
            filter: request.filter,
            page_size: request.page_size,
            follow_referrals: request.follow_referrals,
            state: State::NextBase,
            buffered: None,
            pages_fetched: 0,
        }
    }

    /// Returns true if another mapped value is available.
    ///
    /// Idempotent: calling it repeatedly without consuming the value does not
    /// fetch further pages.
    pub fn has_next(&mut self) -> DirectoryResult<bool> {
        self.fill()
    }

    /// Returns the next mapped value.
    ///
    /// ## Errors
    ///
    /// [`DirectoryError::NoSuchElement`] when the search is exhausted, or the
    /// error that ended the search.
    pub fn next_entry(&mut self) -> DirectoryResult<M::Output> {
        if self.fill()? {
            self.buffered.take().ok_or(DirectoryError::NoSuchElement)
        } else {
            Err(DirectoryError::NoSuchElement)
        }
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Returns true once the client has been released.
    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    /// Ends the search and closes the client.
    ///
    /// Further calls return no values. Closing twice is a no-op.
    pub fn close(&mut self) -> DirectoryResult<()> {
        self.state = State::Done;
        self.buffered = None;
        self.release()
    }

    /// Advances until a value is buffered or the search ends.
    fn fill(&mut self) -> DirectoryResult<bool> {
        if self.buffered.is_some() {
            return Ok(true);
        }

        loop {
            match mem::replace(&mut self.state, State::Done) {
                State::Done => return Ok(false),

                State::NextBase => match self.bases.pop_front() {
                    Some(base) => {
                        self.state = State::Fetch(PageRequest::first(
                            base,
                            self.filter.clone(),
                            self.page_size,
                        ));
                    }
                    None => {
                        self.finish();
                        return Ok(false);
                    }
                },

                State::Fetch(request) => {
                    let Some(client) = self.client.as_mut() else {
                        return Ok(false);
                    };
                    match request_page(client, &request, self.follow_referrals) {
                        Ok(page) => {
                            self.pages_fetched += 1;
                            self.state = State::Walk { request, page };
                        }
                        Err(e) => return Err(self.fail(e)),
                    }
                }

                State::Walk { request, mut page } => match page.next_entry() {
                    Some(entry) => {
                        self.state = State::Walk { request, page };
                        match self.accept(&entry) {
                            Ok(Some(value)) => {
                                self.buffered = Some(value);
                                return Ok(true);
                            }
                            Ok(None) => {}
                            Err(e) => return Err(self.fail(e)),
                        }
                    }
                    None => {
                        self.state = match page.into_cookie() {
                            Some(cookie) => State::Fetch(request.next(cookie)),
                            None => State::NextBase,
                        };
                    }
                },
            }
        }
    }

    /// Applies the scope filter, then the mapper.
    fn accept(&self, entry: &RawEntry) -> DirectoryResult<Option<M::Output>> {
        if self.mapper.applies_scope_filter() {
            let dn = Dn::parse(&entry.dn).map_err(|e| {
                DirectoryError::mapping(format!("entry has an unparsable DN: {e}"))
            })?;
            if !self.scope.is_included(&dn) {
                trace!(dn = %entry.dn, "Entry out of scope");
                return Ok(None);
            }
        }
        self.mapper.map(entry)
    }

    fn fail(&mut self, err: DirectoryError) -> DirectoryError {
        self.state = State::Done;
        error!(error = %err, pages = self.pages_fetched, "Paged search failed");
        if let Err(e) = self.release() {
            warn!(error = %e, "Failed to close directory client after error");
        }
        err
    }

    fn finish(&mut self) {
        debug!(pages = self.pages_fetched, "Paged search exhausted");
        if let Err(e) = self.release() {
            warn!(error = %e, "Failed to close directory client");
        }
    }

    fn release(&mut self) -> DirectoryResult<()> {
        match self.client.take() {
            Some(mut client) => client.close(),
            None => Ok(()),
        }
    }
}

impl<C: DirectoryClient, M: ResultMapper> Iterator for PagedSearch<C, M> {
    type Item = DirectoryResult<M::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.fill() {
            Ok(true) => self.buffered.take().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<C: DirectoryClient, M: ResultMapper> std::iter::FusedIterator for PagedSearch<C, M> {}

impl<C: DirectoryClient, M: ResultMapper> Drop for PagedSearch<C, M> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            debug!(error = %e, "Failed to close directory client on drop");
        }
    }
}

impl<C: DirectoryClient, M: ResultMapper> std::fmt::Debug for PagedSearch<C, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedSearch")
            .field("filter", &self.filter)
            .field("page_size", &self.page_size)
            .field("pending_bases", &self.bases.len())
            .field("pages_fetched", &self.pages_fetched)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

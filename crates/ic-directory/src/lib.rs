//! # ic-directory
//!
//! Generic LDAP directory connector.
//!
//! The core of this crate is [`PagedSearch`]: a lazy iterator over one or
//! more base DNs that fetches RFC 2696 pages on demand, drops entries outside
//! the configured include/exclude subtrees and maps the rest through a
//! [`ResultMapper`]. [`DirectoryConnector`] builds identity, role and
//! organizational unit lookups on top of it.
//!
//! ## Connections
//!
//! All directory access goes through the [`DirectoryClient`] and
//! [`DirectoryWriter`] traits. The production implementation, [`LdapClient`],
//! uses the synchronous `ldap3` client. Each search owns one client and
//! closes it when it ends.
//!
//! ## Example
//!
//! ```ignore
//! use ic_directory::{DirectoryConfig, DirectoryConnector, Dn};
//!
//! let config = DirectoryConfig::builder()
//!     .host("ldap.example.com")
//!     .service_account("cn=svc,dc=example,dc=com", password)
//!     .base_dn(Dn::parse("dc=example,dc=com")?)
//!     .build()?;
//!
//! let connector = DirectoryConnector::new(config);
//! for identity in connector.identities()? {
//!     println!("{}", identity?.principal_name);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connection;
pub mod connector;
pub mod dialect;
pub mod dn;
pub mod entry;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod paging;
pub mod scope;
pub mod search;

pub use client::{
    AttributeValues, ClientFactory, DirectoryClient, DirectoryWriter, Modification,
    SearchResponse, SearchStatus,
};
pub use config::{DirectoryConfig, DirectoryConfigBuilder, RoleMode, SecurityProtocol};
pub use connection::{LdapClient, LdapClientFactory};
pub use connector::{
    attribute_changes, common_name_of, DirectoryConnector, DirectoryIdentity, DirectoryRole,
    EntryDecoder, OrganizationalUnit, TextDecoder,
};
pub use dialect::{Dialect, StandardDialect, TextAttributes};
pub use dn::{Dn, Rdn};
pub use entry::RawEntry;
pub use error::{DirectoryError, DirectoryResult};
pub use mapper::{DnMapper, FnMapper, ResultMapper};
pub use paging::{ContinuationCookie, PageRequest, PagedResultsControl, PagedResultsResponse};
pub use scope::{IncludeExcludeRules, ScopeFilter};
pub use search::{PagedSearch, SearchBases, SearchRequest};

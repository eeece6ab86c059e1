//! # ic-active-directory
//!
//! Active Directory connector built on [`ic_directory`].
//!
//! AD differs from a generic LDAP directory in a few ways this crate takes
//! care of:
//!
//! - identifiers are binary (`objectGUID`, `objectSid`), see [`guid`]
//! - account state lives in `userAccountControl` bits, see [`uac`]
//! - timestamps are Windows FILETIMEs, see [`filetime`]
//! - principals are found by `sAMAccountName` or `userPrincipalName` and
//!   passwords are written to `unicodePwd`, see [`AdDialect`]
//! - entries in child domains are served by other controllers, see
//!   [`dc_cache`]
//!
//! ## Example
//!
//! ```ignore
//! use ic_active_directory::{ActiveDirectoryConfig, ActiveDirectoryConnector};
//! use ic_connector::ConnectorConfig;
//!
//! let config = ConnectorConfig::new()
//!     .with("directory.hostname", "dc1.example.com")
//!     .with("directory.serviceAccountUsername", "svc-icx")
//!     .with("directory.serviceAccountPassword", password);
//!
//! let connector = ActiveDirectoryConnector::new(
//!     ActiveDirectoryConfig::from_connector_config(&config)?,
//! );
//! for identity in connector.directory().identities()? {
//!     let identity = identity?;
//!     println!("{} {:?}", identity.principal_name, identity.account_status.status);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connector;
pub mod dc_cache;
pub mod filetime;
pub mod guid;
pub mod uac;

pub use config::ActiveDirectoryConfig;
pub use connector::{unicode_password, ActiveDirectoryConnector, AdDecoder, AdDialect};
pub use dc_cache::{DomainControllerCache, DomainControllerResolver};
pub use uac::UserAccountControl;

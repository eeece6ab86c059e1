//! # ic-model
//!
//! Vendor-neutral domain model shared by every identity connector.
//!
//! Connectors translate directory entries (or API resources) into the
//! [`Identity`] and [`Role`] types defined here. Backend-specific variants
//! expose extra capabilities, such as a distinguished name, through the
//! [`HasDistinguishedName`] trait rather than through concrete types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod identity;
pub mod principal;
pub mod role;
pub mod status;

pub use identity::Identity;
pub use principal::{Attributes, HasDistinguishedName, Principal};
pub use role::Role;
pub use status::{AccountStatus, AccountStatusType, PasswordStatus, PasswordStatusType};

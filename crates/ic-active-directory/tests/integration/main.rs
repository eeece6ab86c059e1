//! Integration tests for the Active Directory connector.
//!
//! These tests drive the public API against an in-memory directory; no
//! domain controller is required.

mod connector;
mod writes;

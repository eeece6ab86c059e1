//! Integration tests for the directory connector.
//!
//! These tests drive the public API against an in-memory directory; no
//! LDAP server is required.

mod common;
mod paged_search;
mod writes;

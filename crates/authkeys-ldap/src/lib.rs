//! LDAP-backed lookup of SSH authorized keys and group rosters.
//!
//! This crate implements the authentication-time query path for an
//! `AuthorizedKeysCommand`-style integration: given a username, return the
//! public keys the directory holds for it; given a group name, return the
//! group's members with their POSIX account attributes.
//!
//! The pipeline is strictly sequential: a secure connection is established
//! once, a mode-dependent search is executed over it, raw entries are
//! normalized into stable records, and the result is serialized. Any failure
//! along the way is terminal for the invocation.

#![deny(missing_docs)]

mod client;
mod config;
mod dn;
mod error;
mod member;
mod output;
mod query;

pub use client::{DirectoryClient, LdapEntry, LookupOutcome};
pub use config::{AuthkeysConfig, DEFAULT_DIAL_TIMEOUT_SECS};
pub use dn::{member_group_name, DistinguishedName, DistinguishedNameError, RelativeDistinguishedName};
pub use error::{Error, Result};
pub use member::Member;
pub use output::write_outcome;
pub use query::{build_membership_lookup, build_search, SearchMode, SearchPlan};

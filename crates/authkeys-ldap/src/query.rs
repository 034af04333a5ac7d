//! Search construction: filters, base DNs, and attribute projections.
//!
//! Everything here is a pure function of the search mode and the
//! configuration. No I/O happens in this module; the only failure mode is a
//! malformed configuration surfacing while the group DN is assembled.

use crate::config::AuthkeysConfig;
use crate::dn::{DistinguishedName, RelativeDistinguishedName};
use crate::Result;

/// Attribute holding reverse group membership on user entries.
pub(crate) const MEMBER_OF: &str = "memberOf";

/// POSIX account attributes requested for every group member.
const POSIX_ATTRIBUTES: &[&str] = &["uidNumber", "gidNumber", "homeDirectory", "loginShell"];

/// The operation requested for this invocation.
///
/// Constructed exactly once by the caller and passed by reference through
/// every layer; nothing downstream re-derives the mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    /// Resolve a single identity's public keys.
    SingleUser {
        /// The supplied username, before the configured suffix is appended.
        username: String,
    },
    /// Enumerate a group's members with their POSIX account attributes.
    GroupMembers {
        /// Common name of the group to enumerate.
        group: String,
        /// Request the reduced attribute set and look up each member's
        /// membership individually, for directories that do not populate
        /// `memberOf` on group-listing queries.
        minimal_attributes: bool,
    },
}

/// A fully-shaped directory search: where to look, what to match, and which
/// attributes to project.
///
/// Scope is always the whole subtree under the base DN, aliases are never
/// dereferenced, and no server-side size or time limit is imposed; result
/// cardinality is validated after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    /// Base distinguished name the search runs under.
    pub base_dn: String,
    /// LDAP filter expression.
    pub filter: String,
    /// Attributes to request. Config-dependent, hence owned strings.
    pub attributes: Vec<String>,
}

/// Builds the primary search for the given mode.
///
/// # Errors
///
/// Returns [`crate::Error::Config`] when the group DN cannot be assembled
/// from the configured base DN and group object name.
pub fn build_search(mode: &SearchMode, config: &AuthkeysConfig) -> Result<SearchPlan> {
    match mode {
        SearchMode::SingleUser { username } => {
            let qualified = format!("{username}{}", config.user_postfix());
            Ok(SearchPlan {
                base_dn: config.base_dn().to_string(),
                filter: format!(
                    "({}={})",
                    config.user_attribute(),
                    escape_filter_value(&qualified)
                ),
                attributes: vec![config.key_attribute().to_string()],
            })
        }
        SearchMode::GroupMembers {
            group,
            minimal_attributes,
        } => {
            let group_dn = group_dn(group, config)?;
            let mut attributes: Vec<String> = Vec::with_capacity(POSIX_ATTRIBUTES.len() + 2);
            attributes.push(config.user_attribute().to_string());
            attributes.extend(POSIX_ATTRIBUTES.iter().map(ToString::to_string));
            if !minimal_attributes {
                attributes.push(MEMBER_OF.to_string());
            }
            Ok(SearchPlan {
                base_dn: config.base_dn().to_string(),
                // The DN may contain escape backslashes of its own; those
                // must be filter-escaped in turn or the filter is malformed.
                filter: format!(
                    "(&(objectClass=inetOrgPerson)(memberOf={}))",
                    escape_filter_value(group_dn.as_str())
                ),
                attributes,
            })
        }
    }
}

/// Builds the fallback per-member membership lookup, filtered on the
/// configured identity attribute and projecting only `memberOf`.
#[must_use]
pub fn build_membership_lookup(identity: &str, config: &AuthkeysConfig) -> SearchPlan {
    SearchPlan {
        base_dn: config.base_dn().to_string(),
        filter: format!(
            "({}={})",
            config.user_attribute(),
            escape_filter_value(identity)
        ),
        attributes: vec![MEMBER_OF.to_string()],
    }
}

fn group_dn(group: &str, config: &AuthkeysConfig) -> Result<DistinguishedName> {
    if config.group_object().is_empty() {
        return Err(crate::Error::Config(
            "GroupObject must be set for group lookups".to_string(),
        ));
    }
    let base = DistinguishedName::parse(config.base_dn())?;
    Ok(base
        .with_prefix(RelativeDistinguishedName::new("ou", config.group_object()))
        .with_prefix(RelativeDistinguishedName::new("cn", group)))
}

/// Escapes characters with special meaning in LDAP filter values (RFC 4515).
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

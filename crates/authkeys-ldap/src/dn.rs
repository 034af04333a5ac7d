//! Distinguished name utilities for building and picking apart directory
//! names.
//!
//! Two things live here: a strict [`DistinguishedName`] type used when
//! composing query filters (so group names with commas or other special
//! characters are escaped correctly), and [`member_group_name`], the small
//! pure function that extracts a group's common name from a raw `memberOf`
//! value. The latter is deliberately independent of query execution so the
//! most bug-prone parsing is directly unit-testable.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::Error as CrateError;

/// Errors that can occur when parsing distinguished names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistinguishedNameError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component in the distinguished name was invalid.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute name to the left of the `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// A component was missing the value to the right of the `=`.
    #[error("distinguished name component missing value for attribute {0}")]
    MissingValue(String),
    /// The distinguished name ended with an escape character.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DistinguishedNameError> for CrateError {
    fn from(err: DistinguishedNameError) -> Self {
        CrateError::Config(err.to_string())
    }
}

/// Relative distinguished name (single attribute/value pair).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeDistinguishedName {
    attribute: String,
    value: String,
}

impl RelativeDistinguishedName {
    /// Creates a new relative distinguished name.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute portion of the RDN (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Attribute value portion of the RDN.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true if this RDN matches the attribute name (case-insensitive).
    #[must_use]
    pub fn matches_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }
}

/// Strongly-typed distinguished name wrapper.
///
/// Keeps a canonical string representation alongside the parsed components.
/// Parsing is intentionally strict to surface malformed names early, before
/// they end up inside a search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    raw: String,
    rdns: Vec<RelativeDistinguishedName>,
}

impl DistinguishedName {
    /// Parses a distinguished name from a string.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError`] if the name is empty or contains
    /// invalid syntax.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DistinguishedNameError> {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            return Err(DistinguishedNameError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_escaped(raw, ',')? {
            let (attribute, value) = split_attribute_value(&component)?;
            rdns.push(RelativeDistinguishedName::new(attribute, value));
        }

        Ok(Self {
            raw: rdns_to_string(&rdns),
            rdns,
        })
    }

    /// Borrows the canonical distinguished name string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Looks up the value of the first matching attribute (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.rdns
            .iter()
            .find(|rdn| rdn.matches_attribute(attribute))
            .map(RelativeDistinguishedName::value)
    }

    /// Creates a new distinguished name by prefixing the provided RDN.
    ///
    /// This is how an entry-specific name is combined with a base DN, e.g.
    /// `cn=admins` prefixed onto `ou=groups,dc=example,dc=com`.
    #[must_use]
    pub fn with_prefix(mut self, rdn: RelativeDistinguishedName) -> Self {
        self.rdns.insert(0, rdn);
        self.raw = rdns_to_string(&self.rdns);
        self
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DistinguishedName {
    type Err = DistinguishedNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.raw
    }
}

/// Extracts the group common name from a raw membership value.
///
/// The value is expected to look like `cn=<name>,<rest>`; the result is the
/// substring strictly between the `cn=` marker and the first following comma,
/// or the remainder of the string when no comma follows. Returns `None` when
/// the marker is absent.
#[must_use]
pub fn member_group_name(value: &str) -> Option<&str> {
    let start = value.find("cn=")? + "cn=".len();
    let rest = &value[start..];
    Some(rest.find(',').map_or(rest, |end| &rest[..end]))
}

fn split_escaped(
    input: &str,
    delimiter: char,
) -> std::result::Result<Vec<String>, DistinguishedNameError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }

        if ch == '\\' {
            escape = true;
            continue;
        }

        if ch == delimiter {
            parts.push(current.trim().to_string());
            current.clear();
            continue;
        }

        current.push(ch);
    }

    if escape {
        return Err(DistinguishedNameError::UnterminatedEscape);
    }

    parts.push(current.trim().to_string());
    if parts.iter().any(String::is_empty) {
        return Err(DistinguishedNameError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn split_attribute_value(
    component: &str,
) -> std::result::Result<(String, String), DistinguishedNameError> {
    let idx = component
        .find('=')
        .ok_or_else(|| DistinguishedNameError::InvalidComponent(component.to_string()))?;
    let attribute = component[..idx].trim();
    let value = component[idx + 1..].trim_start();

    if attribute.is_empty() {
        return Err(DistinguishedNameError::MissingAttribute(
            component.to_string(),
        ));
    }
    if value.is_empty() {
        return Err(DistinguishedNameError::MissingValue(attribute.to_string()));
    }

    Ok((attribute.to_string(), value.to_string()))
}

fn escape(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in chars.iter().enumerate() {
        let is_first = idx == 0;
        let is_last = idx == chars.len() - 1;
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (is_first && (*ch == ' ' || *ch == '#'))
            || (is_last && *ch == ' ');

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(*ch);
    }

    escaped
}

fn rdns_to_string(rdns: &[RelativeDistinguishedName]) -> String {
    rdns.iter()
        .map(|rdn| format!("{}={}", rdn.attribute(), escape(rdn.value())))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_dn() {
        let dn = DistinguishedName::parse("cn=admins,ou=groups,dc=example,dc=com").unwrap();
        assert_eq!(dn.get("cn"), Some("admins"));
        assert_eq!(dn.get("ou"), Some("groups"));
        assert_eq!(dn.to_string(), "cn=admins,ou=groups,dc=example,dc=com");
    }

    #[test]
    fn parse_rejects_trailing_delimiter() {
        let err = DistinguishedName::parse("cn=admins,").unwrap_err();
        assert!(matches!(err, DistinguishedNameError::InvalidComponent(_)));
    }

    #[test]
    fn parse_rejects_missing_value() {
        let err = DistinguishedName::parse("cn=,dc=example").unwrap_err();
        assert!(matches!(err, DistinguishedNameError::MissingValue(_)));
    }

    #[test]
    fn with_prefix_builds_group_dn() {
        let base = DistinguishedName::parse("dc=example,dc=com").unwrap();
        let group_dn = base
            .with_prefix(RelativeDistinguishedName::new("ou", "groups"))
            .with_prefix(RelativeDistinguishedName::new("cn", "admins"));
        assert_eq!(group_dn.as_str(), "cn=admins,ou=groups,dc=example,dc=com");
    }

    #[test]
    fn with_prefix_escapes_special_characters() {
        let base = DistinguishedName::parse("dc=example,dc=com").unwrap();
        let group_dn = base.with_prefix(RelativeDistinguishedName::new("cn", "ops, east"));
        assert_eq!(group_dn.as_str(), "cn=ops\\, east,dc=example,dc=com");
    }

    #[test]
    fn member_group_name_takes_text_between_marker_and_comma() {
        assert_eq!(
            member_group_name("cn=admins,ou=groups,dc=example,dc=com"),
            Some("admins")
        );
    }

    #[test]
    fn member_group_name_without_trailing_comma_takes_rest() {
        assert_eq!(member_group_name("cn=admins"), Some("admins"));
    }

    #[test]
    fn member_group_name_requires_marker() {
        assert_eq!(member_group_name("ou=groups,dc=example,dc=com"), None);
        assert_eq!(member_group_name(""), None);
    }

    #[test]
    fn member_group_name_finds_marker_past_leading_components() {
        assert_eq!(
            member_group_name("ou=groups,cn=admins,dc=example,dc=com"),
            Some("admins")
        );
    }

    #[test]
    fn member_group_name_ignores_text_after_first_comma() {
        assert_eq!(member_group_name("cn=admins,anything at all"), Some("admins"));
    }
}

//! Normalized group-member records.

use serde::{Deserialize, Serialize};

use crate::client::LdapEntry;

/// A group member with POSIX account attributes, normalized from a raw
/// directory entry.
///
/// The serialized field names (`id`, `uid`, `gid`, `groups`, `home`,
/// `shell`) are the wire format consumed by provisioning tooling and must
/// stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Login name, with any `@`-delimited mail domain stripped.
    #[serde(rename = "id")]
    pub login: String,
    /// Numeric user id, verbatim from the directory.
    #[serde(rename = "uid")]
    pub uid_number: String,
    /// Numeric group id, verbatim from the directory.
    #[serde(rename = "gid")]
    pub gid_number: String,
    /// Names of the groups the member belongs to. Never empty: when the
    /// directory reports nothing, the queried group's own name is
    /// substituted.
    #[serde(rename = "groups")]
    pub groups: Vec<String>,
    /// Home directory path.
    #[serde(rename = "home")]
    pub home_directory: String,
    /// Login shell path.
    #[serde(rename = "shell")]
    pub shell: String,
}

impl Member {
    /// Assembles a member from a raw entry, the configured identity
    /// attribute, and the already-resolved group names. Absent attributes
    /// become empty strings.
    #[must_use]
    pub(crate) fn from_entry(entry: &LdapEntry, user_attribute: &str, groups: Vec<String>) -> Self {
        Self {
            login: strip_mail_domain(entry.first(user_attribute).unwrap_or_default()).to_string(),
            uid_number: attr_or_empty(entry, "uidNumber"),
            gid_number: attr_or_empty(entry, "gidNumber"),
            groups,
            home_directory: attr_or_empty(entry, "homeDirectory"),
            shell: attr_or_empty(entry, "loginShell"),
        }
    }
}

/// Truncates an identity at the first `@`, so directories that store mail
/// addresses in the identity attribute still yield a plain login name.
#[must_use]
pub(crate) fn strip_mail_domain(identity: &str) -> &str {
    match identity.find('@') {
        Some(at) => &identity[..at],
        None => identity,
    }
}

fn attr_or_empty(entry: &LdapEntry, attribute: &str) -> String {
    entry.first(attribute).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(attributes: &[(&str, &[&str])]) -> LdapEntry {
        LdapEntry {
            dn: "uid=test,ou=people,dc=example,dc=com".to_string(),
            attributes: attributes
                .iter()
                .map(|(name, values)| {
                    (
                        (*name).to_string(),
                        values.iter().map(|v| (*v).to_string()).collect(),
                    )
                })
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn strips_mail_domain_at_first_at_sign() {
        assert_eq!(strip_mail_domain("bob@example.com"), "bob");
        assert_eq!(strip_mail_domain("bob@foo@bar"), "bob");
    }

    #[test]
    fn plain_identity_is_unchanged() {
        assert_eq!(strip_mail_domain("alice"), "alice");
        assert_eq!(strip_mail_domain(""), "");
    }

    #[test]
    fn from_entry_reads_posix_attributes() {
        let entry = entry(&[
            ("uid", &["carol@example.com"]),
            ("uidNumber", &["1042"]),
            ("gidNumber", &["100"]),
            ("homeDirectory", &["/home/carol"]),
            ("loginShell", &["/bin/zsh"]),
        ]);
        let member = Member::from_entry(&entry, "uid", vec!["admins".to_string()]);

        assert_eq!(member.login, "carol");
        assert_eq!(member.uid_number, "1042");
        assert_eq!(member.gid_number, "100");
        assert_eq!(member.groups, vec!["admins".to_string()]);
        assert_eq!(member.home_directory, "/home/carol");
        assert_eq!(member.shell, "/bin/zsh");
    }

    #[test]
    fn absent_attributes_become_empty_strings() {
        let entry = entry(&[("uid", &["dave"])]);
        let member = Member::from_entry(&entry, "uid", vec!["admins".to_string()]);

        assert_eq!(member.login, "dave");
        assert_eq!(member.uid_number, "");
        assert_eq!(member.gid_number, "");
        assert_eq!(member.home_directory, "");
        assert_eq!(member.shell, "");
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let member = Member {
            login: "alice".to_string(),
            uid_number: "1000".to_string(),
            gid_number: "100".to_string(),
            groups: vec!["admins".to_string()],
            home_directory: "/home/alice".to_string(),
            shell: "/bin/bash".to_string(),
        };
        let json = serde_json::to_string(&member).unwrap();
        assert_eq!(
            json,
            r#"{"id":"alice","uid":"1000","gid":"100","groups":["admins"],"home":"/home/alice","shell":"/bin/bash"}"#
        );
    }
}

//! Configuration for directory lookups.
//!
//! The configuration is loaded once at startup, from a JSON file whose keys
//! match the historical `/etc/authkeys.json` format, and is immutable for the
//! rest of the invocation.

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default dial timeout (seconds), applied when the configured value is
/// absent or zero.
pub const DEFAULT_DIAL_TIMEOUT_SECS: u64 = 5;

const DEFAULT_LDAP_PORT: u16 = 389;

fn default_port() -> u16 {
    DEFAULT_LDAP_PORT
}

fn default_key_attribute() -> String {
    "sshPublicKey".to_string()
}

fn default_user_attribute() -> String {
    "uid".to_string()
}

/// Configuration for connecting to and querying the directory.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthkeysConfig {
    #[serde(rename = "LDAPServer")]
    server: String,
    #[serde(rename = "LDAPPort", default = "default_port")]
    port: u16,
    #[serde(rename = "DialTimeout", default)]
    dial_timeout_secs: u64,
    #[serde(rename = "BaseDN")]
    base_dn: String,
    #[serde(rename = "GroupObject", default)]
    group_object: String,
    #[serde(rename = "KeyAttribute", default = "default_key_attribute")]
    key_attribute: String,
    #[serde(rename = "UserAttribute", default = "default_user_attribute")]
    user_attribute: String,
    #[serde(rename = "UserPostfix", default)]
    user_postfix: String,
    #[serde(rename = "RootCAFile", default)]
    root_ca_file: Option<PathBuf>,
    #[serde(rename = "BindDN", default)]
    bind_dn: Option<String>,
    #[serde(rename = "BindPW", default)]
    bind_pw: Option<SecretString>,
}

impl AuthkeysConfig {
    /// Creates a configuration with default attribute names and no bind
    /// identity. Intended for programmatic construction; file-based callers
    /// should use [`AuthkeysConfig::from_file`].
    #[must_use]
    pub fn new(server: impl Into<String>, port: u16, base_dn: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port,
            dial_timeout_secs: 0,
            base_dn: base_dn.into(),
            group_object: String::new(),
            key_attribute: default_key_attribute(),
            user_attribute: default_user_attribute(),
            user_postfix: String::new(),
            root_ca_file: None,
            bind_dn: None,
            bind_pw: None,
        }
    }

    /// Loads and validates the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed, or if
    /// the parsed configuration is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("unable to read {}: {err}", path.display())))?;
        Self::from_json(&data)
    }

    /// Parses and validates the configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or invalid field
    /// combinations.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)
            .map_err(|err| Error::Config(format!("unable to parse configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(Error::Config("LDAPServer must not be empty".to_string()));
        }
        if self.base_dn.is_empty() {
            return Err(Error::Config("BaseDN must not be empty".to_string()));
        }
        if self.bind_dn.is_some() != self.bind_pw.is_some() {
            return Err(Error::Config(
                "BindDN and BindPW must be supplied together".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the directory endpoint URL. TLS is negotiated via StartTLS
    /// after connecting, so the scheme is always `ldap`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ldap://{}:{}", self.server, self.port)
    }

    /// Returns the dial timeout, substituting the default when unset or zero.
    #[must_use]
    pub fn dial_timeout(&self) -> Duration {
        if self.dial_timeout_secs == 0 {
            Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.dial_timeout_secs)
        }
    }

    /// Returns the base distinguished name under which all searches run.
    #[must_use]
    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    /// Returns the relative name of the organizational unit holding groups.
    #[must_use]
    pub fn group_object(&self) -> &str {
        &self.group_object
    }

    /// Returns the attribute holding a user's public keys.
    #[must_use]
    pub fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    /// Returns the attribute holding the lookup identity.
    #[must_use]
    pub fn user_attribute(&self) -> &str {
        &self.user_attribute
    }

    /// Returns the suffix appended to supplied usernames before querying.
    #[must_use]
    pub fn user_postfix(&self) -> &str {
        &self.user_postfix
    }

    /// Optional trust-root file for server certificate validation.
    #[must_use]
    pub fn root_ca_file(&self) -> Option<&Path> {
        self.root_ca_file.as_deref()
    }

    /// Returns the service bind identity and credential when configured.
    #[must_use]
    pub fn bind_credentials(&self) -> Option<(&str, &str)> {
        match (&self.bind_dn, &self.bind_pw) {
            (Some(dn), Some(pw)) => Some((dn.as_str(), pw.expose_secret())),
            _ => None,
        }
    }

    /// Overrides the dial timeout in seconds.
    #[must_use]
    pub const fn with_dial_timeout_secs(mut self, seconds: u64) -> Self {
        self.dial_timeout_secs = seconds;
        self
    }

    /// Overrides the group organizational unit name.
    #[must_use]
    pub fn with_group_object(mut self, group_object: impl Into<String>) -> Self {
        self.group_object = group_object.into();
        self
    }

    /// Overrides the public-key attribute name.
    #[must_use]
    pub fn with_key_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.key_attribute = attribute.into();
        self
    }

    /// Overrides the identity attribute name.
    #[must_use]
    pub fn with_user_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.user_attribute = attribute.into();
        self
    }

    /// Overrides the username suffix.
    #[must_use]
    pub fn with_user_postfix(mut self, postfix: impl Into<String>) -> Self {
        self.user_postfix = postfix.into();
        self
    }

    /// Sets the trust-root file path.
    #[must_use]
    pub fn with_root_ca_file(mut self, path: PathBuf) -> Self {
        self.root_ca_file = Some(path);
        self
    }

    /// Sets the service bind identity and credential.
    #[must_use]
    pub fn with_bind(mut self, dn: impl Into<String>, password: SecretString) -> Self {
        self.bind_dn = Some(dn.into());
        self.bind_pw = Some(password);
        self
    }
}

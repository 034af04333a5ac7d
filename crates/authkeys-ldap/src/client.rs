//! Directory client: secure connection establishment, query execution, and
//! result normalization.

use crate::{
    config::AuthkeysConfig,
    member::Member,
    query::{self, SearchMode},
    Error, Result,
};
use async_trait::async_trait;
use ldap3::{DerefAliases, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions};
use native_tls::{Certificate, TlsConnector};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Raw directory entry: an opaque mapping from attribute name to an ordered
/// sequence of string values.
#[derive(Debug, Clone)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (value order preserved from the server).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .map(|values| values.as_slice())
    }
}

/// The normalized output of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Raw public-key values for a single user, in directory order.
    Keys(Vec<String>),
    /// Normalized group members, in directory order.
    Members(Vec<Member>),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<LdapEntry>>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Directory client with a pluggable LDAP backend.
///
/// One connection is opened per [`DirectoryClient::execute`] call, shared by
/// the primary search and every fallback search, and released on every exit
/// path.
pub struct DirectoryClient {
    config: Arc<AuthkeysConfig>,
    connector: Box<dyn LdapConnector>,
}

impl DirectoryClient {
    /// Creates a client that connects to the configured directory.
    #[must_use]
    pub fn new(config: AuthkeysConfig) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(StartTlsConnector::new(config.clone()));
        Self { config, connector }
    }

    #[cfg(test)]
    pub(crate) fn with_connector(config: AuthkeysConfig, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Runs the invocation's lookup: connects, binds when configured,
    /// executes the mode-appropriate search, and normalizes the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`], [`Error::Tls`], or [`Error::Bind`] for
    /// transport and authentication failures, and [`Error::Query`] when the
    /// directory rejects the search, returns no entries, or returns an
    /// ambiguous single-user result.
    pub async fn execute(&self, mode: &SearchMode) -> Result<LookupOutcome> {
        let mut session = self.connector.connect().await?;
        let outcome = self.run(&mut *session, mode).await;
        if let Err(err) = session.unbind().await {
            debug!("failed to release directory session: {err}");
        }
        outcome
    }

    async fn run(&self, session: &mut dyn LdapSession, mode: &SearchMode) -> Result<LookupOutcome> {
        if let Some((bind_dn, password)) = self.config.bind_credentials() {
            session.simple_bind(bind_dn, password).await?;
        }

        let plan = query::build_search(mode, &self.config)?;
        let entries = session
            .search(&plan.base_dn, &plan.filter, &plan.attributes)
            .await?;

        if entries.is_empty() {
            return Err(Error::Query(
                "no entries returned from the directory".to_string(),
            ));
        }

        match mode {
            SearchMode::SingleUser { username } => {
                if entries.len() > 1 {
                    // Refuse to guess among multiple matches for a
                    // security-sensitive key lookup.
                    return Err(Error::Query(format!(
                        "ambiguous result: {} entries match `{username}`",
                        entries.len()
                    )));
                }
                let keys = entries[0]
                    .values(self.config.key_attribute())
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                Ok(LookupOutcome::Keys(keys))
            }
            SearchMode::GroupMembers {
                group,
                minimal_attributes,
            } => {
                let mut members = Vec::with_capacity(entries.len());
                for entry in &entries {
                    members.push(
                        self.normalize_member(session, entry, group, *minimal_attributes)
                            .await?,
                    );
                }
                Ok(LookupOutcome::Members(members))
            }
        }
    }

    async fn normalize_member(
        &self,
        session: &mut dyn LdapSession,
        entry: &LdapEntry,
        group: &str,
        minimal_attributes: bool,
    ) -> Result<Member> {
        let user_attribute = self.config.user_attribute();

        let raw_member_of: Vec<String> = if minimal_attributes {
            // The group-listing entry carries no memberOf in this mode; ask
            // the directory about this member directly, over the same
            // connection.
            let identity = entry.first(user_attribute).ok_or_else(|| {
                Error::Query(format!(
                    "entry `{}` is missing the `{user_attribute}` attribute",
                    entry.dn
                ))
            })?;
            let plan = query::build_membership_lookup(identity, &self.config);
            let results = session
                .search(&plan.base_dn, &plan.filter, &plan.attributes)
                .await?;
            results
                .into_iter()
                .last()
                .and_then(|mut e| e.attributes.remove(query::MEMBER_OF))
                .unwrap_or_default()
        } else {
            entry
                .values(query::MEMBER_OF)
                .map(<[String]>::to_vec)
                .unwrap_or_default()
        };

        let mut groups: Vec<String> = raw_member_of
            .iter()
            .filter_map(|value| crate::dn::member_group_name(value))
            .map(str::to_string)
            .collect();
        if groups.is_empty() {
            // Every returned member reports membership in at least the group
            // it was found through.
            groups.push(group.to_string());
        }

        Ok(Member::from_entry(entry, user_attribute, groups))
    }
}

/// Real connector: TCP dial with a bounded timeout, StartTLS upgrade, and
/// optional trust-root override.
struct StartTlsConnector {
    config: Arc<AuthkeysConfig>,
}

impl StartTlsConnector {
    fn new(config: Arc<AuthkeysConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for StartTlsConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = build_connection_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url())
            .await
            .map_err(classify_connect_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(StartTlsSession {
            inner: ldap,
            // The dial timeout doubles as the per-operation deadline so a
            // stalled directory cannot hang the invocation.
            operation_timeout: self.config.dial_timeout(),
        }))
    }
}

struct StartTlsSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl LdapSession for StartTlsSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = timeout(self.operation_timeout, self.inner.simple_bind(dn, password))
            .await
            .map_err(|_| Error::Bind("bind timed out".to_string()))?
            .map_err(|err| Error::Bind(err.to_string()))?;
        result.success().map_err(|err| Error::Bind(err.to_string()))?;
        Ok(())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<LdapEntry>> {
        let attributes: Vec<&str> = attributes.iter().map(String::as_str).collect();
        let search = self
            .inner
            .with_search_options(SearchOptions::new().deref(DerefAliases::Never))
            .search(base_dn, Scope::Subtree, filter, attributes);
        let result = timeout(self.operation_timeout, search)
            .await
            .map_err(|_| Error::Query("search timed out".to_string()))?
            .map_err(|err| Error::Query(err.to_string()))?;
        let (entries, _) = result
            .success()
            .map_err(|err| Error::Query(err.to_string()))?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| LdapEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| Error::Connection("unbind timed out".to_string()))?
            .map_err(|err| Error::Connection(err.to_string()))?;
        Ok(())
    }
}

fn build_connection_settings(config: &AuthkeysConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(config.dial_timeout())
        .set_starttls(true);

    if let Some(ca_path) = config.root_ca_file() {
        let pem = fs::read(ca_path).map_err(|err| {
            Error::Tls(format!("unable to read trust root {}: {err}", ca_path.display()))
        })?;
        let certificate = Certificate::from_pem(&pem).map_err(|err| {
            Error::Tls(format!("invalid trust root {}: {err}", ca_path.display()))
        })?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::Tls(format!("unable to build TLS connector: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn classify_connect_error(err: ldap3::LdapError) -> Error {
    match err {
        ldap3::LdapError::NativeTLS { source } => Error::Tls(source.to_string()),
        other => {
            warn!("directory connection failed: {other}");
            Error::Connection(other.to_string())
        }
    }
}

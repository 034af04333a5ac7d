//! Error types for directory lookups.
//!
//! Every failure is terminal for the invocation: nothing is retried and
//! nothing is recoverable locally. The variants classify which stage of the
//! lookup failed so the caller can report it.

use thiserror::Error;

/// Main error type for authkeys operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The directory host was unreachable or the dial timed out.
    #[error("connection failed: {0}")]
    Connection(String),

    /// TLS negotiation failed, the server certificate was invalid, or the
    /// configured trust root could not be loaded.
    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    /// The directory rejected the service bind.
    #[error("directory bind rejected: {0}")]
    Bind(String),

    /// The directory rejected the search, returned no entries, returned an
    /// ambiguous single-user result, or the output could not be serialized.
    #[error("directory query failed: {0}")]
    Query(String),

    /// The configuration was malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns a short label for the stage that failed, for diagnostics.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connect",
            Self::Tls(_) => "tls",
            Self::Bind(_) => "bind",
            Self::Query(_) => "query",
            Self::Config(_) => "config",
        }
    }
}

/// Specialized result type for authkeys operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels() {
        assert_eq!(Error::Connection("t".to_string()).stage(), "connect");
        assert_eq!(Error::Tls("t".to_string()).stage(), "tls");
        assert_eq!(Error::Bind("t".to_string()).stage(), "bind");
        assert_eq!(Error::Query("t".to_string()).stage(), "query");
        assert_eq!(Error::Config("t".to_string()).stage(), "config");
    }

    #[test]
    fn display_includes_cause() {
        let err = Error::Query("no entries returned".to_string());
        assert_eq!(err.to_string(), "directory query failed: no entries returned");
    }
}

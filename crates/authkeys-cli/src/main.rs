//! authkeys - look up a user's SSH keys, or a group's members, in LDAP.
//!
//! Intended as the backend for an `AuthorizedKeysCommand` integration:
//! `authkeys <username>` prints the keys the directory holds for that user,
//! one per line; `authkeys --group <name>` prints the group's member roster
//! as a JSON document. Stdout carries nothing but the lookup output;
//! diagnostics go to stderr.

use anyhow::Context;
use authkeys_ldap::{write_outcome, AuthkeysConfig, DirectoryClient, SearchMode};
use clap::Parser;
use std::io;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "authkeys")]
#[command(version)]
#[command(about = "Look up a user's SSH keys or a group's members in LDAP", long_about = None)]
struct Cli {
    /// List members of this LDAP group
    #[arg(long, conflicts_with = "username")]
    group: Option<String>,

    /// Use minimal attributes (for LDAP that does not populate memberOf on
    /// group listings)
    #[arg(long)]
    min: bool,

    /// Configuration file path
    #[arg(
        short,
        long,
        env = "AUTHKEYS_CONFIG",
        default_value = "/etc/authkeys.json"
    )]
    config: String,

    /// LDAP username whose keys should be printed
    #[arg(required_unless_present = "group")]
    username: Option<String>,
}

impl Cli {
    fn search_mode(&self) -> anyhow::Result<SearchMode> {
        // clap's `requires` is not enforced for boolean flags, so check here.
        if self.min && self.group.is_none() {
            anyhow::bail!("--min is only valid together with --group");
        }
        match (&self.group, &self.username) {
            (Some(group), _) => Ok(SearchMode::GroupMembers {
                group: group.clone(),
                minimal_attributes: self.min,
            }),
            (None, Some(username)) => Ok(SearchMode::SingleUser {
                username: username.clone(),
            }),
            (None, None) => anyhow::bail!("either --group or a username is required"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let config = AuthkeysConfig::from_file(&cli.config)
        .with_context(|| format!("unable to load configuration from {}", cli.config))?;
    debug!("loaded configuration from {}", cli.config);
    let mode = cli.search_mode()?;

    let client = DirectoryClient::new(config);
    let outcome = client
        .execute(&mode)
        .await
        .map_err(|err| anyhow::anyhow!("lookup failed during {}: {err}", err.stage()))?;

    write_outcome(io::stdout().lock(), &outcome)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_selects_single_user_mode() {
        let cli = Cli::try_parse_from(["authkeys", "alice"]).unwrap();
        assert_eq!(
            cli.search_mode().unwrap(),
            SearchMode::SingleUser {
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn group_flag_selects_group_mode() {
        let cli = Cli::try_parse_from(["authkeys", "--group", "admins", "--min"]).unwrap();
        assert_eq!(
            cli.search_mode().unwrap(),
            SearchMode::GroupMembers {
                group: "admins".to_string(),
                minimal_attributes: true,
            }
        );
    }

    #[test]
    fn group_and_username_together_are_a_usage_error() {
        assert!(Cli::try_parse_from(["authkeys", "--group", "admins", "alice"]).is_err());
    }

    #[test]
    fn missing_target_is_a_usage_error() {
        assert!(Cli::try_parse_from(["authkeys"]).is_err());
    }

    #[test]
    fn min_requires_group() {
        let cli = Cli::try_parse_from(["authkeys", "--min", "alice"]).unwrap();
        assert!(cli.search_mode().is_err());
    }

    #[test]
    fn config_path_defaults_to_etc() {
        let cli = Cli::try_parse_from(["authkeys", "alice"]).unwrap();
        assert_eq!(cli.config, "/etc/authkeys.json");
    }
}

//! Runtime configuration for talking to the `snow` CLI
//!
//! Configuration is grouped into logical sections:
//! - [`ServiceCredentials`]: service-account PAT credentials from the environment
//! - [`SnowCliOptions`]: connection selection and verbosity for every `snow` call

/// Environment variable holding the service-account PAT
pub const ENV_SA_PAT: &str = "SA_PAT";
/// Environment variable holding the service-account user
pub const ENV_SA_USER: &str = "SA_USER";
/// Environment variable holding the service-account role
pub const ENV_SA_ROLE: &str = "SA_ROLE";
/// Environment variable holding the Snowflake account identifier
pub const ENV_SNOWFLAKE_ACCOUNT: &str = "SNOWFLAKE_ACCOUNT";
/// Environment variable read by `snow` for password-style authenticators
pub const ENV_SNOWFLAKE_PASSWORD: &str = "SNOWFLAKE_PASSWORD";
/// Default named connection
pub const ENV_DEFAULT_CONNECTION: &str = "SNOWFLAKE_DEFAULT_CONNECTION_NAME";
/// Interactive Snowflake user, used to suggest per-user names
pub const ENV_SNOWFLAKE_USER: &str = "SNOWFLAKE_USER";
/// Role used for DDL
pub const ENV_SA_ADMIN_ROLE: &str = "SA_ADMIN_ROLE";
/// Utility database holding network rules and policies
pub const ENV_SNOW_UTILS_DB: &str = "SNOW_UTILS_DB";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
/// Prefix for derived external volume names
pub const ENV_EXTVOLUME_PREFIX: &str = "EXTVOLUME_PREFIX";

/// Service-account credentials used to connect without a named connection
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceCredentials {
    pub pat: Option<String>,
    pub user: Option<String>,
    pub account: Option<String>,
    pub role: Option<String>,
}

impl ServiceCredentials {
    /// Read credentials from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup (empty values count as unset)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            pat: get(ENV_SA_PAT),
            user: get(ENV_SA_USER),
            account: get(ENV_SNOWFLAKE_ACCOUNT),
            role: get(ENV_SA_ROLE),
        }
    }

    /// True when a PAT, user and account are all present
    pub fn is_complete(&self) -> bool {
        self.pat.is_some() && self.user.is_some() && self.account.is_some()
    }
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("pat", &self.pat.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("account", &self.account)
            .field("role", &self.role)
            .finish()
    }
}

/// How a `snow` invocation authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode<'a> {
    /// Temporary connection using the service-account PAT
    ServiceAccount {
        account: &'a str,
        user: &'a str,
        role: Option<&'a str>,
        pat: &'a str,
    },
    /// Named connection from `config.toml`, or the CLI default when `None`
    Named(Option<&'a str>),
}

/// Options applied to every `snow` invocation
#[derive(Debug, Clone, Default)]
pub struct SnowCliOptions {
    /// Named connection (falls back to the CLI's default)
    pub connection: Option<String>,
    /// Forward `--verbose` to the CLI
    pub verbose: bool,
    /// Forward `--debug` and log every statement
    pub debug: bool,
    /// Ignore service-account credentials and use the named connection
    pub force_user_connection: bool,
    pub credentials: ServiceCredentials,
}

impl SnowCliOptions {
    /// A PAT is set but service-account mode cannot be used for lack of a user or account
    pub fn has_partial_credentials(&self) -> bool {
        !self.force_user_connection
            && self.credentials.pat.is_some()
            && !self.credentials.is_complete()
    }

    /// Decide how to authenticate
    pub fn connection_mode(&self) -> ConnectionMode<'_> {
        let creds = &self.credentials;
        if !self.force_user_connection {
            if let Some(pat) = creds.pat.as_deref() {
                if let (Some(user), Some(account)) = (creds.user.as_deref(), creds.account.as_deref()) {
                    return ConnectionMode::ServiceAccount {
                        account,
                        user,
                        role: creds.role.as_deref(),
                        pat,
                    };
                }
            }
        }
        ConnectionMode::Named(self.connection.as_deref())
    }

    /// Connection and verbosity flags placed after `snow sql`
    pub fn flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = match self.connection_mode() {
            ConnectionMode::ServiceAccount {
                account,
                user,
                role,
                ..
            } => {
                let mut f = vec![
                    "--temporary-connection".into(),
                    "--account".into(),
                    account.into(),
                    "--user".into(),
                    user.into(),
                    "--authenticator".into(),
                    "PROGRAMMATIC_ACCESS_TOKEN".into(),
                ];
                if let Some(role) = role {
                    f.extend(["--role".into(), role.into()]);
                }
                f
            }
            ConnectionMode::Named(Some(conn)) => vec!["-c".into(), conn.into()],
            ConnectionMode::Named(None) => Vec::new(),
        };
        if self.debug {
            flags.push("--debug".into());
        } else if self.verbose {
            flags.push("--verbose".into());
        }
        flags
    }

    /// Value for `SNOWFLAKE_PASSWORD` when service-account mode is active
    pub fn password_env(&self) -> Option<&str> {
        match self.connection_mode() {
            ConnectionMode::ServiceAccount { pat, .. } => Some(pat),
            ConnectionMode::Named(_) => None,
        }
    }
}

/// Current OS user, lowercased, for prefixing resource names
pub fn current_username() -> Option<String> {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .map(|u| u.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn creds(pairs: &[(&str, &str)]) -> ServiceCredentials {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceCredentials::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_service_account_flags() {
        let opts = SnowCliOptions {
            connection: Some("dev".into()),
            credentials: creds(&[
                ("SA_PAT", "tok"),
                ("SA_USER", "SVC"),
                ("SNOWFLAKE_ACCOUNT", "ORG-ACCT"),
                ("SA_ROLE", "SVC_ROLE"),
            ]),
            ..Default::default()
        };
        assert_eq!(
            opts.flags(),
            [
                "--temporary-connection",
                "--account",
                "ORG-ACCT",
                "--user",
                "SVC",
                "--authenticator",
                "PROGRAMMATIC_ACCESS_TOKEN",
                "--role",
                "SVC_ROLE"
            ]
        );
        assert_eq!(opts.password_env(), Some("tok"));
    }

    #[test]
    fn test_partial_credentials_fall_back_to_connection() {
        let opts = SnowCliOptions {
            connection: Some("dev".into()),
            debug: true,
            credentials: creds(&[("SA_PAT", "tok"), ("SA_USER", "SVC")]),
            ..Default::default()
        };
        assert_eq!(opts.flags(), ["-c", "dev", "--debug"]);
        assert_eq!(opts.password_env(), None);
        assert!(opts.has_partial_credentials());
        assert_eq!(opts.connection_mode(), ConnectionMode::Named(Some("dev")));
    }

    #[test]
    fn test_partial_credentials_only_with_pat() {
        let none = SnowCliOptions::default();
        assert!(!none.has_partial_credentials());

        let user_only = SnowCliOptions {
            credentials: creds(&[("SA_USER", "SVC")]),
            ..Default::default()
        };
        assert!(!user_only.has_partial_credentials());

        let forced = SnowCliOptions {
            force_user_connection: true,
            credentials: creds(&[("SA_PAT", "tok")]),
            ..Default::default()
        };
        assert!(!forced.has_partial_credentials());
    }

    #[test]
    fn test_force_user_connection() {
        let opts = SnowCliOptions {
            connection: Some("dev".into()),
            verbose: true,
            force_user_connection: true,
            credentials: creds(&[
                ("SA_PAT", "tok"),
                ("SA_USER", "SVC"),
                ("SNOWFLAKE_ACCOUNT", "ACCT"),
            ]),
            ..Default::default()
        };
        assert_eq!(opts.flags(), ["-c", "dev", "--verbose"]);
        assert_eq!(opts.password_env(), None);
        assert!(!opts.has_partial_credentials());
    }

    #[test]
    fn test_empty_values_are_unset() {
        let c = creds(&[("SA_PAT", ""), ("SA_USER", "SVC")]);
        assert!(c.pat.is_none());
        assert!(!c.is_complete());
    }

    #[test]
    fn test_debug_redacts_pat() {
        let c = creds(&[("SA_PAT", "super-secret")]);
        let shown = format!("{c:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("<redacted>"));
    }
}

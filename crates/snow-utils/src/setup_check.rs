//! Pre-flight check for the snow-utils role and database
//!
//! Every other tool assumes a service role and a utility database with
//! `NETWORKS` and `POLICIES` schemas. This module probes for them and can
//! create them from a built-in script run as `ACCOUNTADMIN`.

use crate::network::sql::as_role;
use crate::snow::{Check, SqlExecutor, row_value};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use snow_utils_common::defaults::{
    DEFAULT_ADMIN_ROLE, DEFAULT_NETWORK_SCHEMA, DEFAULT_POLICY_SCHEMA, DEFAULT_SA_ROLE,
    DEFAULT_SNOW_UTILS_DB,
};
use tracing::{debug, info, instrument};

/// Role and database suggested for `snowflake_user`
///
/// A known user gets `{USER}_SNOW_UTILS_SA` and `{USER}_SNOW_UTILS` so that
/// several people can share one account.
pub fn suggested_names(snowflake_user: Option<&str>) -> (String, String) {
    match snowflake_user.map(str::trim).filter(|u| !u.is_empty()) {
        Some(user) => {
            let user = user.to_uppercase();
            (format!("{user}_{DEFAULT_SA_ROLE}"), format!("{user}_{DEFAULT_SNOW_UTILS_DB}"))
        }
        None => (DEFAULT_SA_ROLE.to_string(), DEFAULT_SNOW_UTILS_DB.to_string()),
    }
}

/// What was found in the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetupStatus {
    pub database_exists: bool,
    pub role_exists: bool,
}

impl SetupStatus {
    pub fn ready(&self) -> bool {
        self.database_exists && self.role_exists
    }
}

/// Document printed by `--suggest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub user: Option<String>,
    pub suggested_role: String,
    pub suggested_database: String,
    pub role_exists: bool,
    pub database_exists: bool,
    pub ready: bool,
}

/// Script that creates the role, database, schemas and grants
pub fn setup_script(role: &str, database: &str) -> String {
    let networks = format!("{database}.{DEFAULT_NETWORK_SCHEMA}");
    let policies = format!("{database}.{DEFAULT_POLICY_SCHEMA}");
    as_role(
        DEFAULT_ADMIN_ROLE,
        &[
            format!("CREATE ROLE IF NOT EXISTS {role}\n    COMMENT = 'snow-utils service role';"),
            format!("GRANT ROLE {role} TO ROLE SYSADMIN;"),
            format!("CREATE DATABASE IF NOT EXISTS {database}\n    COMMENT = 'snow-utils network rules and policies';"),
            format!("CREATE SCHEMA IF NOT EXISTS {networks};"),
            format!("CREATE SCHEMA IF NOT EXISTS {policies};"),
            format!("GRANT USAGE ON DATABASE {database} TO ROLE {role};"),
            format!("GRANT USAGE ON SCHEMA {networks} TO ROLE {role};"),
            format!("GRANT USAGE ON SCHEMA {policies} TO ROLE {role};"),
            format!("GRANT CREATE NETWORK RULE ON SCHEMA {networks} TO ROLE {role};"),
            format!("GRANT CREATE AUTHENTICATION POLICY ON SCHEMA {policies} TO ROLE {role};"),
            format!("GRANT CREATE NETWORK POLICY ON ACCOUNT TO ROLE {role};"),
            format!("GRANT CREATE EXTERNAL VOLUME ON ACCOUNT TO ROLE {role};"),
            format!("GRANT CREATE USER ON ACCOUNT TO ROLE {role};"),
        ],
    )
}

/// Probes run against the active connection
pub struct SetupChecker<'a, E> {
    exec: &'a E,
}

impl<'a, E: SqlExecutor> SetupChecker<'a, E> {
    pub fn new(exec: &'a E) -> Self {
        Self { exec }
    }

    pub async fn database_exists(&self, database: &str) -> Result<bool> {
        let rows = self
            .exec
            .query(&format!("SHOW DATABASES LIKE '{database}'"), Check::Strict)
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn role_exists(&self, role: &str) -> Result<bool> {
        let rows = self
            .exec
            .query(&format!("SHOW ROLES LIKE '{role}'"), Check::Strict)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Whether the connected user can assume `role`
    ///
    /// `CURRENT_AVAILABLE_ROLES()` returns a JSON array serialised as a string.
    pub async fn user_has_role(&self, role: &str) -> Result<bool> {
        let rows = self
            .exec
            .query("SELECT CURRENT_AVAILABLE_ROLES() AS roles", Check::Strict)
            .await?;
        let roles = match rows.first().and_then(|r| row_value(r, "roles")) {
            Some(Value::String(s)) => serde_json::from_str::<Vec<String>>(s).unwrap_or_default(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        debug!(count = roles.len(), "Available roles");
        Ok(roles.iter().any(|r| r.eq_ignore_ascii_case(role)))
    }

    #[instrument(skip_all, fields(role = %role, database = %database))]
    pub async fn check(&self, role: &str, database: &str) -> Result<SetupStatus> {
        let status = SetupStatus {
            database_exists: self.database_exists(database).await?,
            role_exists: self.role_exists(role).await?,
        };
        info!(ready = status.ready(), "Setup check complete");
        Ok(status)
    }

    pub async fn suggest(&self, user: Option<&str>, role: &str, database: &str) -> Result<Suggestion> {
        let (suggested_role, suggested_database) = suggested_names(user);
        let status = self.check(role, database).await?;
        Ok(Suggestion {
            user: user.map(str::to_uppercase),
            suggested_role,
            suggested_database,
            role_exists: status.role_exists,
            database_exists: status.database_exists,
            ready: status.ready(),
        })
    }

    /// Create the role, database and schemas
    #[instrument(skip_all, fields(role = %role, database = %database))]
    pub async fn run_setup(&self, role: &str, database: &str) -> Result<()> {
        self.exec
            .run_script(&setup_script(role, database), Check::Strict)
            .await
            .context("Setup failed")?;
        info!("Setup complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingExecutor;
    use serde_json::json;

    #[test]
    fn test_suggested_names() {
        assert_eq!(
            suggested_names(Some("alice")),
            ("ALICE_SNOW_UTILS_SA".to_string(), "ALICE_SNOW_UTILS".to_string())
        );
        assert_eq!(
            suggested_names(Some("  ")),
            ("SNOW_UTILS_SA".to_string(), "SNOW_UTILS".to_string())
        );
        assert_eq!(suggested_names(None).1, "SNOW_UTILS");
    }

    #[test]
    fn test_setup_script() {
        let script = setup_script("SA", "DB");
        assert!(script.starts_with("USE ROLE ACCOUNTADMIN;\n"));
        assert!(script.contains("CREATE SCHEMA IF NOT EXISTS DB.NETWORKS;"));
        assert!(script.contains("CREATE SCHEMA IF NOT EXISTS DB.POLICIES;"));
        assert!(script.contains("GRANT CREATE NETWORK RULE ON SCHEMA DB.NETWORKS TO ROLE SA;"));
    }

    #[tokio::test]
    async fn test_check_missing_role() {
        let exec = RecordingExecutor::new().respond("SHOW DATABASES LIKE 'DB'", json!([{"name": "DB"}]));
        let status = SetupChecker::new(&exec).check("SA", "DB").await.unwrap();
        assert_eq!(
            status,
            SetupStatus {
                database_exists: true,
                role_exists: false
            }
        );
        assert!(!status.ready());
    }

    #[tokio::test]
    async fn test_user_has_role_parses_string_array() {
        let exec = RecordingExecutor::new().respond(
            "CURRENT_AVAILABLE_ROLES",
            json!([{"ROLES": "[\"PUBLIC\",\"sa\"]"}]),
        );
        let checker = SetupChecker::new(&exec);
        assert!(checker.user_has_role("SA").await.unwrap());
        assert!(!checker.user_has_role("OTHER").await.unwrap());
    }

    #[tokio::test]
    async fn test_suggest() {
        let exec = RecordingExecutor::new()
            .respond("SHOW DATABASES", json!([{"name": "X"}]))
            .respond("SHOW ROLES", json!([{"name": "Y"}]));
        let suggestion = SetupChecker::new(&exec)
            .suggest(Some("bob"), "BOB_SNOW_UTILS_SA", "BOB_SNOW_UTILS")
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&suggestion).unwrap(),
            json!({
                "user": "BOB",
                "suggested_role": "BOB_SNOW_UTILS_SA",
                "suggested_database": "BOB_SNOW_UTILS",
                "role_exists": true,
                "database_exists": true,
                "ready": true
            })
        );
    }

    #[tokio::test]
    async fn test_run_setup_failure() {
        let exec = RecordingExecutor::new().fail_on("CREATE ROLE");
        let err = SetupChecker::new(&exec).run_setup("SA", "DB").await.unwrap_err();
        assert_eq!(err.to_string(), "Setup failed");
    }
}

//! Service-user PAT lifecycle: create, rotate, remove, verify

use super::sql;
use crate::error::PreconditionError;
use crate::network::{NetworkReconciler, UserNetwork};
use crate::output::ProgressReporter;
use crate::probe::Probe;
use crate::snow::{Check, LoginCheck, SqlExecutor, row_str};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use snow_utils_common::defaults::{
    DEFAULT_ADMIN_ROLE, DEFAULT_NETWORK_SCHEMA, DEFAULT_PAT_EXPIRY_DAYS, DEFAULT_PAT_MAX_EXPIRY_DAYS,
};
use snow_utils_common::naming::{default_pat_name, user_network_policy, user_network_rule};
use tracing::{info, instrument};

/// Who gets the PAT and how it is constrained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatConfig {
    pub user: String,
    /// Role the PAT is restricted to
    pub role: String,
    pub database: String,
    pub pat_name: String,
    pub admin_role: String,
    pub default_expiry_days: u32,
    pub max_expiry_days: u32,
}

impl PatConfig {
    pub fn new(user: impl Into<String>, role: impl Into<String>, database: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            pat_name: default_pat_name(&user),
            user,
            role: role.into(),
            database: database.into(),
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
            default_expiry_days: DEFAULT_PAT_EXPIRY_DAYS,
            max_expiry_days: DEFAULT_PAT_MAX_EXPIRY_DAYS,
        }
    }

    pub fn resources(&self) -> PatResources {
        PatResources {
            network_rule: format!(
                "{}.{DEFAULT_NETWORK_SCHEMA}.{}",
                self.database,
                user_network_rule(&self.user)
            ),
            network_policy: user_network_policy(&self.user),
            auth_policy: sql::auth_policy_fqn(&self.database, &self.user),
        }
    }
}

/// Snowflake objects that guard a service user's PAT
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatResources {
    pub network_rule: String,
    pub network_policy: String,
    pub auth_policy: String,
}

/// How a token was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatAction {
    Created,
    Rotated,
    /// Existing PAT removed and a new one added
    Recreated,
}

/// A token returned by `ADD PAT` or `ROTATE PAT`
#[derive(Clone)]
pub struct IssuedPat {
    pub action: PatAction,
    /// Absent only in dry-run
    pub token: Option<String>,
}

impl std::fmt::Debug for IssuedPat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedPat")
            .field("action", &self.action)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What `remove` did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveOutcome {
    pub pat_removed: bool,
    pub policies_removed: bool,
    pub user_dropped: bool,
}

/// PAT operations for one service user
pub struct PatManager<'a, E, R> {
    exec: &'a E,
    reporter: &'a R,
    config: &'a PatConfig,
    dry_run: bool,
}

impl<'a, E: SqlExecutor, R: ProgressReporter> PatManager<'a, E, R> {
    pub fn new(exec: &'a E, reporter: &'a R, config: &'a PatConfig) -> Self {
        Self {
            exec,
            reporter,
            config,
            dry_run: false,
        }
    }

    /// Accept a missing token in `ADD PAT` results (the executor only records)
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn network(&self) -> NetworkReconciler<'a, E> {
        NetworkReconciler::new(self.exec, self.config.admin_role.clone())
    }

    pub async fn setup_service_user(&self) -> Result<()> {
        let c = self.config;
        self.exec
            .run_script(&sql::service_user_sql(&c.admin_role, &c.user, &c.role), Check::Strict)
            .await
            .with_context(|| format!("Failed to set up service user {}", c.user))?;
        self.reporter
            .success(&format!("Service user {} configured with role {}", c.user, c.role));
        Ok(())
    }

    pub async fn setup_network(&self, cidrs: &[String]) -> Result<UserNetwork> {
        let network = self
            .network()
            .setup_for_user(&self.config.user, &self.config.database, cidrs)
            .await?;
        self.reporter.success(&format!("Network rule: {}", network.network_rule));
        self.reporter.success(&format!("Network policy: {}", network.network_policy));
        Ok(network)
    }

    /// Create or update the authentication policy and set it on the user
    ///
    /// Any existing policy is unset first so the final `SET` cannot collide.
    pub async fn setup_auth_policy(&self) -> Result<()> {
        let c = self.config;
        self.exec
            .run_script(&sql::unset_auth_policy_sql(&c.admin_role, &c.user), Check::Lenient)
            .await?;
        self.exec
            .run_script(
                &sql::auth_policy_sql(
                    &c.admin_role,
                    &c.user,
                    &c.database,
                    c.default_expiry_days,
                    c.max_expiry_days,
                ),
                Check::Strict,
            )
            .await
            .context("Failed to set up authentication policy")?;
        self.reporter.success("Authentication policy configured");
        Ok(())
    }

    /// Existing PAT with the configured name (compared case-insensitively)
    pub async fn find_pat(&self) -> Result<Probe<String>> {
        let rows = self
            .exec
            .query(&sql::show_pats_sql(&self.config.user), Check::Strict)
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| row_str(r, "name"))
            .find(|name| name.eq_ignore_ascii_case(&self.config.pat_name))
            .map_or(Probe::NotFound, |name| Probe::Found(name.to_string())))
    }

    /// Issue a token: rotate when `rotate` and the PAT exists, otherwise
    /// (re)create it
    pub async fn issue(&self, rotate: bool) -> Result<IssuedPat> {
        let c = self.config;
        let existing = self.find_pat().await?.is_found();

        let (action, statement) = match (existing, rotate) {
            (true, true) => (PatAction::Rotated, sql::rotate_pat_sql(&c.user, &c.pat_name)),
            (true, false) => {
                self.exec
                    .query(&sql::remove_pat_sql(&c.user, &c.pat_name), Check::Strict)
                    .await?;
                self.reporter
                    .success(&format!("Removed existing PAT '{}'", c.pat_name));
                (PatAction::Recreated, sql::add_pat_sql(&c.user, &c.pat_name, &c.role))
            }
            (false, _) => (PatAction::Created, sql::add_pat_sql(&c.user, &c.pat_name, &c.role)),
        };

        let rows = self.exec.query(&statement, Check::Strict).await?;
        let token = rows
            .first()
            .and_then(|r| row_str(r, "token_secret"))
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        if token.is_none() && !self.dry_run {
            return Err(anyhow!("Failed to get PAT token from response"));
        }
        info!(user = %c.user, pat = %c.pat_name, action = %action, "PAT issued");
        self.reporter.success(&format!("PAT {action} successfully"));
        Ok(IssuedPat { action, token })
    }

    /// Full setup: service user, network, authentication policy, token
    #[instrument(skip_all, fields(user = %self.config.user))]
    pub async fn create(&self, cidrs: &[String], rotate: bool) -> Result<(UserNetwork, IssuedPat)> {
        self.reporter.step("Step 1: Create service user");
        self.setup_service_user().await?;

        self.reporter
            .step(&format!("Step 2: Network rule and policy ({} CIDRs)", cidrs.len()));
        let network = self.setup_network(cidrs).await?;

        self.reporter.step("Step 3: Authentication policy");
        self.setup_auth_policy().await?;

        self.reporter.step("Step 4: Create or rotate PAT");
        let issued = self.issue(rotate).await?;
        Ok((network, issued))
    }

    /// Rotate an existing PAT, leaving policies untouched
    #[instrument(skip_all, fields(user = %self.config.user))]
    pub async fn rotate(&self) -> Result<IssuedPat> {
        if self.find_pat().await?.is_not_found() {
            return Err(PreconditionError::PatNotFound {
                user: self.config.user.clone(),
                pat: self.config.pat_name.clone(),
            }
            .into());
        }
        self.issue(true).await
    }

    /// Remove the PAT and, unless `pat_only`, its policies; optionally
    /// drop the user
    #[instrument(skip_all, fields(user = %self.config.user))]
    pub async fn remove(&self, pat_only: bool, drop_user: bool) -> Result<RemoveOutcome> {
        let c = self.config;
        let mut outcome = RemoveOutcome::default();

        self.reporter.step("Step 1: Remove PAT");
        match self.find_pat().await? {
            Probe::Found(name) => {
                self.exec
                    .query(&sql::remove_pat_sql(&c.user, &name), Check::Strict)
                    .await?;
                self.reporter.success(&format!("Removed PAT '{name}'"));
                outcome.pat_removed = true;
            }
            _ => self
                .reporter
                .warning(&format!("PAT '{}' not found for user {}", c.pat_name, c.user)),
        }

        if !pat_only {
            self.reporter.step("Step 2: Remove network policy");
            self.network().cleanup_for_user(&c.user, &c.database).await?;
            self.reporter.success("Network policy and rule removed");

            self.reporter.step("Step 3: Remove authentication policy");
            self.exec
                .run_script(
                    &sql::remove_auth_policy_sql(&c.admin_role, &c.user, &c.database),
                    Check::Lenient,
                )
                .await?;
            self.reporter.success("Authentication policy removed");
            outcome.policies_removed = true;
        }

        if drop_user {
            self.reporter.step("Step 4: Drop service user");
            self.exec
                .run_script(&sql::drop_user_sql(&c.admin_role, &c.user), Check::Strict)
                .await?;
            self.reporter.success(&format!("Service user {} dropped", c.user));
            outcome.user_dropped = true;
        }

        Ok(outcome)
    }

    /// Log in with `token` and run a trivial query
    pub async fn verify(&self, token: &str) -> Result<()> {
        let account = self
            .exec
            .current_account()
            .await?
            .context("Could not determine Snowflake account from connection test")?;
        self.exec
            .login(&LoginCheck {
                user: &self.config.user,
                account: &account,
                role: &self.config.role,
                token,
            })
            .await
            .context("Connection verification failed")?;
        self.reporter.success("Connection verified successfully");
        Ok(())
    }
}

//! `snow` CLI subprocess adapter

use super::error::SqlError;
use super::executor::{Check, LoginCheck, Row, SqlExecutor, parse_rows, row_str};
use crate::config::{ENV_SNOWFLAKE_PASSWORD, SnowCliOptions};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default executable name
pub const SNOW_PROGRAM: &str = "snow";

/// Runs SQL by shelling out to the Snowflake CLI
#[derive(Debug, Clone)]
pub struct SnowCli {
    program: String,
    options: SnowCliOptions,
}

impl SnowCli {
    pub fn new(options: SnowCliOptions) -> Self {
        if options.has_partial_credentials() {
            warn!("SA_PAT set but SA_USER or SNOWFLAKE_ACCOUNT missing, using named connection");
        }
        Self {
            program: SNOW_PROGRAM.to_string(),
            options,
        }
    }

    pub fn options(&self) -> &SnowCliOptions {
        &self.options
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(pat) = self.options.password_env() {
            cmd.env(ENV_SNOWFLAKE_PASSWORD, pat);
        }
        cmd
    }

    fn sql_args(&self, tail: &[&str]) -> Vec<String> {
        let mut args = vec!["sql".to_string()];
        args.extend(self.options.flags());
        args.extend(tail.iter().map(|s| s.to_string()));
        args
    }

    fn spawn_error(&self, source: std::io::Error) -> SqlError {
        SqlError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    fn io_error(&self, source: std::io::Error) -> SqlError {
        SqlError::Io {
            program: self.program.clone(),
            source,
        }
    }

    fn check_output(&self, output: &Output, check: Check) -> Result<bool, SqlError> {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if self.options.debug && !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "snow stderr");
        }
        if output.status.success() {
            return Ok(true);
        }
        match check {
            Check::Strict => Err(SqlError::Failed {
                code: output.status.code(),
                stderr: stderr.into_owned(),
            }),
            Check::Lenient => {
                debug!(code = ?output.status.code(), stderr = %stderr.trim(), "Ignoring snow failure");
                Ok(false)
            }
        }
    }
}

impl SqlExecutor for SnowCli {
    async fn query(&self, sql: &str, check: Check) -> Result<Vec<Row>, SqlError> {
        let args = self.sql_args(&["--query", sql, "--format", "json"]);
        debug!(sql = %sql, "Running query");

        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !self.check_output(&output, check)? {
            return Ok(Vec::new());
        }
        Ok(parse_rows(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn run_script(&self, script: &str, check: Check) -> Result<(), SqlError> {
        let args = self.sql_args(&["--stdin"]);
        debug!(script = %script, "Running script");

        let mut child = self
            .command(&args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| self.io_error(e))?;
            // Dropping closes the pipe so the CLI sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.io_error(e))?;

        if self.options.debug {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                debug!(stdout = %stdout.trim(), "snow stdout");
            }
        }
        self.check_output(&output, check)?;
        Ok(())
    }

    async fn current_account(&self) -> Result<Option<String>, SqlError> {
        let mut args = vec!["connection".to_string(), "test".to_string()];
        if let Some(conn) = &self.options.connection {
            args.extend(["-c".to_string(), conn.clone()]);
        }
        args.extend(["--format".to_string(), "json".to_string()]);

        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !self.check_output(&output, Check::Lenient)? {
            warn!("Could not determine account from 'snow connection test'");
            return Ok(None);
        }
        let rows = parse_rows(&String::from_utf8_lossy(&output.stdout));
        Ok(rows
            .first()
            .and_then(|row| row_str(row, "Account"))
            .map(str::to_string))
    }

    async fn login(&self, login: &LoginCheck<'_>) -> Result<(), SqlError> {
        let args = self.sql_args(&[
            "-x",
            "--user",
            login.user,
            "--account",
            login.account,
            "--role",
            login.role,
            "-q",
            "SELECT current_timestamp()",
        ]);
        debug!(user = %login.user, role = %login.role, "Verifying PAT login");

        let output = self
            .command(&args)
            .env(ENV_SNOWFLAKE_PASSWORD, login.token)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        self.check_output(&output, Check::Strict)?;
        Ok(())
    }
}

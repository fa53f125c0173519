//! An executor that records SQL instead of running it

use super::error::SqlError;
use super::executor::{Check, LoginCheck, Row, SqlExecutor};
use std::sync::Mutex;

/// Records every statement and script it is asked to run
///
/// Reads return no rows, so a reconciler driven through this executor plans
/// as if nothing exists yet.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    statements: Mutex<Vec<String>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, sql: &str) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(sql.trim_end().to_string());
        }
    }

    /// Everything recorded so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Recorded SQL joined into one printable plan
    pub fn plan(&self) -> String {
        self.statements().join("\n\n")
    }
}

impl SqlExecutor for DryRunExecutor {
    async fn query(&self, sql: &str, _check: Check) -> Result<Vec<Row>, SqlError> {
        self.record(sql);
        Ok(Vec::new())
    }

    async fn run_script(&self, script: &str, _check: Check) -> Result<(), SqlError> {
        self.record(script);
        Ok(())
    }

    async fn current_account(&self) -> Result<Option<String>, SqlError> {
        Ok(None)
    }

    async fn login(&self, _login: &LoginCheck<'_>) -> Result<(), SqlError> {
        Ok(())
    }
}

//! In-memory fakes for the executor and cloud seams

use crate::aws::{AccountId, CloudApi};
use crate::probe::Ensured;
use crate::snow::{Check, LoginCheck, Row, SqlError, SqlExecutor, parse_rows};
use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// One call made against a [`RecordingExecutor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(String),
    Script(String),
    CurrentAccount,
    Login { user: String, token: String },
}

/// Executor that records calls and replies from canned responses
///
/// Responses and failures are matched by substring against the SQL text,
/// first registration wins.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<Vec<(String, Vec<Row>)>>,
    failures: Mutex<Vec<String>>,
    account: Option<String>,
    login_fails: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to SQL containing `pattern` with the rows in `json`
    pub fn respond(self, pattern: &str, json: Value) -> Self {
        let rows = parse_rows(&json.to_string());
        self.responses.lock().unwrap().push((pattern.to_string(), rows));
        self
    }

    /// Fail SQL containing `pattern`
    pub fn fail_on(self, pattern: &str) -> Self {
        self.failures.lock().unwrap().push(pattern.to_string());
        self
    }

    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    pub fn with_failing_login(mut self) -> Self {
        self.login_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// SQL text of every query and script, in order
    pub fn sql(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query(s) | Call::Script(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Scripts only, concatenated
    pub fn script_text(&self) -> String {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Script(s) => Some(s),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Position of the first recorded SQL containing `pattern`
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.sql().iter().position(|s| s.contains(pattern))
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.sql().iter().filter(|s| s.contains(pattern)).count()
    }

    fn failure(&self, sql: &str, check: Check) -> Result<bool, SqlError> {
        let fails = self.failures.lock().unwrap().iter().any(|p| sql.contains(p.as_str()));
        match (fails, check) {
            (false, _) => Ok(false),
            (true, Check::Lenient) => Ok(true),
            (true, Check::Strict) => Err(SqlError::Failed {
                code: Some(1),
                stderr: format!("injected failure for: {sql}"),
            }),
        }
    }
}

impl SqlExecutor for RecordingExecutor {
    async fn query(&self, sql: &str, check: Check) -> Result<Vec<Row>, SqlError> {
        self.calls.lock().unwrap().push(Call::Query(sql.to_string()));
        if self.failure(sql, check)? {
            return Ok(Vec::new());
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .find(|(p, _)| sql.contains(p.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn run_script(&self, script: &str, check: Check) -> Result<(), SqlError> {
        self.calls.lock().unwrap().push(Call::Script(script.to_string()));
        self.failure(script, check).map(|_| ())
    }

    async fn current_account(&self) -> Result<Option<String>, SqlError> {
        self.calls.lock().unwrap().push(Call::CurrentAccount);
        Ok(self.account.clone())
    }

    async fn login(&self, login: &LoginCheck<'_>) -> Result<(), SqlError> {
        self.calls.lock().unwrap().push(Call::Login {
            user: login.user.to_string(),
            token: login.token.to_string(),
        });
        if self.login_fails {
            return Err(SqlError::Failed {
                code: Some(1),
                stderr: "Incorrect username or password was specified.".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CloudState {
    buckets: HashSet<String>,
    policies: HashSet<String>,
    roles: HashMap<String, String>,
    failures: HashSet<String>,
    log: Vec<String>,
    role_misses: u32,
}

/// In-memory AWS account
#[derive(Debug)]
pub struct FakeCloud {
    account: String,
    state: Mutex<CloudState>,
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new("123456789012")
    }
}

impl FakeCloud {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            state: Mutex::new(CloudState::default()),
        }
    }

    /// Make an operation (`ensure_role`, `delete_bucket`, ...) fail
    pub fn fail_on(self, operation: &str) -> Self {
        self.state.lock().unwrap().failures.insert(operation.to_string());
        self
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.state.lock().unwrap().buckets.insert(bucket.to_string());
        self
    }

    pub fn with_role(self, role: &str, trust: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .roles
            .insert(role.to_string(), trust.to_string());
        self
    }

    /// Report roles as missing for the first `n` visibility checks
    pub fn with_role_propagation_delay(self, n: u32) -> Self {
        self.state.lock().unwrap().role_misses = n;
        self
    }

    /// Mutating operations in call order, as `operation:target`
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state.lock().unwrap().buckets.contains(bucket)
    }

    pub fn has_policy(&self, arn: &str) -> bool {
        self.state.lock().unwrap().policies.contains(arn)
    }

    pub fn role_trust(&self, role: &str) -> Option<String> {
        self.state.lock().unwrap().roles.get(role).cloned()
    }

    fn enter(&self, operation: &str, target: &str) -> Result<std::sync::MutexGuard<'_, CloudState>> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("{operation}:{target}"));
        if state.failures.contains(operation) {
            bail!("injected {operation} failure for {target}");
        }
        Ok(state)
    }
}

impl CloudApi for FakeCloud {
    async fn account_id(&self) -> Result<AccountId> {
        if self.state.lock().unwrap().failures.contains("account_id") {
            bail!("injected account_id failure");
        }
        Ok(AccountId::new(self.account.clone()))
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<bool> {
        let mut state = self.enter("ensure_bucket", bucket)?;
        Ok(state.buckets.insert(bucket.to_string()))
    }

    async fn delete_bucket(&self, bucket: &str, _force: bool) -> Result<()> {
        let mut state = self.enter("delete_bucket", bucket)?;
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn ensure_policy(&self, _name: &str, arn: &str, _document: &str) -> Result<Ensured> {
        let mut state = self.enter("ensure_policy", arn)?;
        if state.policies.insert(arn.to_string()) {
            Ok(Ensured::created(arn))
        } else {
            Ok(Ensured::existing(arn))
        }
    }

    async fn delete_policy(&self, arn: &str) -> Result<()> {
        let mut state = self.enter("delete_policy", arn)?;
        state.policies.remove(arn);
        Ok(())
    }

    async fn ensure_role(&self, name: &str, trust_policy: &str, _policy_arn: &str) -> Result<Ensured> {
        let mut state = self.enter("ensure_role", name)?;
        let arn = format!("arn:aws:iam::{}:role/{name}", self.account);
        if state.roles.contains_key(name) {
            return Ok(Ensured::existing(arn));
        }
        state.roles.insert(name.to_string(), trust_policy.to_string());
        if state.failures.contains("attach_role_policy") {
            state.log.push(format!("attach_role_policy:{name}"));
            state.roles.remove(name);
            bail!("injected attach_role_policy failure for {name}");
        }
        Ok(Ensured::created(arn))
    }

    async fn role_exists(&self, name: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.role_misses > 0 {
            state.role_misses -= 1;
            return false;
        }
        state.roles.contains_key(name)
    }

    async fn update_trust_policy(&self, role: &str, trust_policy: &str) -> Result<()> {
        let mut state = self.enter("update_trust_policy", role)?;
        match state.roles.get_mut(role) {
            Some(trust) => {
                *trust = trust_policy.to_string();
                Ok(())
            }
            None => bail!("role {role} not found"),
        }
    }

    async fn trust_policy(&self, role: &str) -> Result<Option<Value>> {
        let state = self.state.lock().unwrap();
        match state.roles.get(role) {
            Some(trust) => Ok(Some(serde_json::from_str(trust)?)),
            None => Ok(None),
        }
    }

    async fn delete_role(&self, role: &str, _policy_arn: Option<&str>) -> Result<()> {
        let mut state = self.enter("delete_role", role)?;
        state.roles.remove(role);
        Ok(())
    }
}

//! Idempotent reconciliation of network rules, policies and user assignment
//!
//! Every DDL statement runs as the admin role in its own `USE ROLE` script.
//! Reads go through the active connection's role.

use super::sql::{self, NetworkPolicySpec, NetworkRuleSpec};
use crate::snow::{Check, Row, SqlExecutor, row_str};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use snow_utils_common::defaults::DEFAULT_NETWORK_SCHEMA;
use snow_utils_common::naming::{companion_policy, user_network_policy, user_network_rule};
use snow_utils_common::{NetworkMode, NetworkType};
use tracing::{debug, info, warn};

/// Property in `DESC NETWORK POLICY` output listing the attached rules
const RULE_LIST_PROPERTY: &str = "ALLOWED_NETWORK_RULE_LIST";

/// Network objects provisioned for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNetwork {
    pub network_rule: String,
    pub network_policy: String,
}

/// Applies network rule and policy changes through a [`SqlExecutor`]
pub struct NetworkReconciler<'a, E> {
    exec: &'a E,
    admin_role: String,
}

impl<'a, E: SqlExecutor> NetworkReconciler<'a, E> {
    pub fn new(exec: &'a E, admin_role: impl Into<String>) -> Self {
        Self {
            exec,
            admin_role: admin_role.into(),
        }
    }

    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }

    async fn apply(&self, statements: &[String]) -> Result<()> {
        let script = sql::as_role(&self.admin_role, statements);
        self.exec.run_script(&script, Check::Strict).await?;
        Ok(())
    }

    /// Statements whose target may legitimately be absent
    async fn apply_lenient(&self, statements: &[String]) -> Result<()> {
        let script = sql::as_role(&self.admin_role, statements);
        self.exec.run_script(&script, Check::Lenient).await?;
        Ok(())
    }

    /// Rules attached to `policy`, or `None` if the policy does not exist
    pub async fn policy_rules(&self, policy: &str) -> Result<Option<Vec<String>>> {
        let rows = self
            .exec
            .query(&sql::describe_policy_sql(policy), Check::Lenient)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let rules = rows
            .iter()
            .find(|row| row_str(row, "name").is_some_and(|n| n.eq_ignore_ascii_case(RULE_LIST_PROPERTY)))
            .and_then(|row| row_str(row, "value"))
            .map(parse_rule_list)
            .unwrap_or_default();
        Ok(Some(rules))
    }

    /// Create a rule
    ///
    /// Without `force` an existing rule is left untouched. With `force` the
    /// rule is replaced; if its companion policy references it, the policy's
    /// rule list is emptied first and restored afterwards, even when the
    /// replace fails.
    pub async fn create_rule(&self, spec: &NetworkRuleSpec, force: bool) -> Result<String> {
        spec.validate()?;
        let fqn = spec.fqn();

        let mut statements = sql::ensure_container_sql(&spec.database, &spec.schema);
        statements.push(sql::create_rule_sql(spec, force));

        if !force {
            self.apply(&statements).await?;
            info!(rule = %fqn, "Network rule ensured");
            return Ok(fqn);
        }

        let attachment = match companion_policy(&spec.name) {
            Some(policy) => match self.policy_rules(&policy).await? {
                Some(rules) if contains_rule(&rules, &fqn) => Some((policy, rules)),
                _ => None,
            },
            None => None,
        };

        if let Some((policy, _)) = &attachment {
            debug!(policy = %policy, rule = %fqn, "Detaching rule before replace");
            self.apply(&[sql::set_policy_rules_sql(policy, &[])]).await?;
        }

        let created = self.apply(&statements).await;

        if let Some((policy, rules)) = &attachment {
            debug!(policy = %policy, rule = %fqn, "Reattaching rules");
            let reattached = self.apply(&[sql::set_policy_rules_sql(policy, rules)]).await;
            if let Err(e) = &reattached {
                warn!(policy = %policy, error = %e, "Failed to reattach rules");
            }
            created.with_context(|| format!("Failed to replace network rule {fqn}"))?;
            reattached?;
        } else {
            created.with_context(|| format!("Failed to replace network rule {fqn}"))?;
        }

        info!(rule = %fqn, "Network rule replaced");
        Ok(fqn)
    }

    /// Replace a rule's value list
    pub async fn update_rule(&self, fqn: &str, values: &[String]) -> Result<()> {
        self.apply(&[sql::update_rule_values_sql(fqn, values)]).await?;
        info!(rule = %fqn, count = values.len(), "Network rule updated");
        Ok(())
    }

    /// Drop a rule, first removing it from its companion policy
    pub async fn delete_rule(&self, fqn: &str) -> Result<()> {
        let name = fqn.rsplit('.').next().unwrap_or(fqn);
        let mut statements = Vec::new();
        if let Some(policy) = companion_policy(name) {
            if let Some(rules) = self.policy_rules(&policy).await? {
                if contains_rule(&rules, fqn) {
                    let remaining: Vec<String> = rules
                        .into_iter()
                        .filter(|r| !r.eq_ignore_ascii_case(fqn))
                        .collect();
                    statements.push(sql::set_policy_rules_sql(&policy, &remaining));
                }
            }
        }
        statements.push(sql::drop_rule_sql(fqn));
        self.apply(&statements).await?;
        info!(rule = %fqn, "Network rule dropped");
        Ok(())
    }

    pub async fn list_rules(&self, database: &str, schema: &str) -> Result<Vec<Row>> {
        Ok(self
            .exec
            .query(&sql::list_rules_sql(database, schema), Check::Strict)
            .await?)
    }

    pub async fn create_policy(&self, spec: &NetworkPolicySpec, force: bool) -> Result<String> {
        self.apply(&[sql::create_policy_sql(spec, force)]).await?;
        info!(policy = %spec.name, "Network policy ensured");
        Ok(spec.name.clone())
    }

    /// Add rules to an existing policy
    pub async fn alter_policy(&self, policy: &str, rules: &[String]) -> Result<()> {
        self.apply(&[sql::add_policy_rules_sql(policy, rules)]).await?;
        info!(policy = %policy, count = rules.len(), "Network policy altered");
        Ok(())
    }

    /// Drop a policy, unsetting it from `user` first when given
    pub async fn delete_policy(&self, policy: &str, user: Option<&str>) -> Result<()> {
        if let Some(user) = user {
            self.apply_lenient(&[sql::unassign_policy_sql(user)]).await?;
        }
        self.apply(&[sql::drop_policy_sql(policy)]).await?;
        info!(policy = %policy, "Network policy dropped");
        Ok(())
    }

    pub async fn list_policies(&self) -> Result<Vec<Row>> {
        Ok(self.exec.query(sql::list_policies_sql(), Check::Strict).await?)
    }

    pub async fn assign_policy(&self, policy: &str, user: &str) -> Result<()> {
        self.apply(&[sql::assign_policy_sql(user, policy)]).await?;
        info!(policy = %policy, user = %user, "Network policy assigned");
        Ok(())
    }

    /// Provision `<USER>_NETWORK_RULE` and `<USER>_NETWORK_POLICY` and assign
    /// the policy to the user
    pub async fn setup_for_user(&self, user: &str, database: &str, values: &[String]) -> Result<UserNetwork> {
        let rule = NetworkRuleSpec {
            name: user_network_rule(user),
            database: database.to_string(),
            schema: DEFAULT_NETWORK_SCHEMA.to_string(),
            mode: NetworkMode::Ingress,
            value_type: NetworkType::Ipv4,
            values: values.to_vec(),
            comment: Some(format!("PAT access for {user}")),
        };
        let fqn = self.create_rule(&rule, true).await?;

        let policy = user_network_policy(user);
        match self.policy_rules(&policy).await? {
            None => {
                let spec = NetworkPolicySpec {
                    name: policy.clone(),
                    rules: vec![fqn.clone()],
                    comment: Some(format!("PAT access for {user}")),
                };
                self.create_policy(&spec, false).await?;
            }
            Some(rules) if !contains_rule(&rules, &fqn) => {
                self.alter_policy(&policy, std::slice::from_ref(&fqn)).await?;
            }
            Some(_) => debug!(policy = %policy, "Policy already references rule"),
        }

        self.assign_policy(&policy, user).await?;
        Ok(UserNetwork {
            network_rule: fqn,
            network_policy: policy,
        })
    }

    /// Remove the per-user network objects created by [`setup_for_user`](Self::setup_for_user)
    pub async fn cleanup_for_user(&self, user: &str, database: &str) -> Result<UserNetwork> {
        let network = UserNetwork {
            network_rule: format!("{database}.{DEFAULT_NETWORK_SCHEMA}.{}", user_network_rule(user)),
            network_policy: user_network_policy(user),
        };
        self.apply_lenient(&[sql::unassign_policy_sql(user)]).await?;
        self.apply(&[
            sql::drop_policy_sql(&network.network_policy),
            sql::drop_rule_sql(&network.network_rule),
        ])
        .await?;
        info!(user = %user, "User network objects removed");
        Ok(network)
    }
}

fn contains_rule(rules: &[String], fqn: &str) -> bool {
    rules.iter().any(|r| r.eq_ignore_ascii_case(fqn))
}

/// Parse the rule list reported by `DESC NETWORK POLICY`
///
/// Snowflake reports a JSON array of `{"fullyQualifiedRuleName": ...}`
/// objects; a plain comma-separated list is also accepted.
pub fn parse_rule_list(value: &str) -> Vec<String> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(value) {
        return items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(map) => map
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("fullyQualifiedRuleName"))
                    .and_then(|(_, v)| v.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .collect();
    }
    value
        .trim_matches(|c| c == '[' || c == ']' || c == '(' || c == ')')
        .split(',')
        .map(|s| s.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

//! SQL text for network rules and policies

use crate::snow::{quote, quote_list};
use snow_utils_common::defaults::DEFAULT_COMMENT;
use snow_utils_common::{InvalidModeType, NetworkMode, NetworkType, validate_mode_type};

/// Desired state of a network rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRuleSpec {
    pub name: String,
    pub database: String,
    pub schema: String,
    pub mode: NetworkMode,
    pub value_type: NetworkType,
    pub values: Vec<String>,
    pub comment: Option<String>,
}

impl NetworkRuleSpec {
    /// `database.schema.name`
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.name)
    }

    pub fn validate(&self) -> Result<(), InvalidModeType> {
        validate_mode_type(self.mode, self.value_type)
    }

    fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or(DEFAULT_COMMENT)
    }
}

/// Desired state of a network policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPolicySpec {
    pub name: String,
    /// Fully-qualified rule names
    pub rules: Vec<String>,
    pub comment: Option<String>,
}

/// Prefix a set of statements with `USE ROLE`
pub fn as_role(role: &str, statements: &[String]) -> String {
    let mut script = format!("USE ROLE {role};\n");
    for stmt in statements {
        script.push_str(stmt);
        script.push('\n');
    }
    script
}

/// Create the database and schema a rule lives in
pub fn ensure_container_sql(database: &str, schema: &str) -> Vec<String> {
    vec![
        format!("CREATE DATABASE IF NOT EXISTS {database};"),
        format!("CREATE SCHEMA IF NOT EXISTS {database}.{schema};"),
    ]
}

pub fn create_rule_sql(spec: &NetworkRuleSpec, force: bool) -> String {
    let create = if force {
        "CREATE OR REPLACE NETWORK RULE"
    } else {
        "CREATE NETWORK RULE IF NOT EXISTS"
    };
    format!(
        "{create} {fqn}\n    MODE = {mode}\n    TYPE = {value_type}\n    VALUE_LIST = {values}\n    COMMENT = {comment};",
        fqn = spec.fqn(),
        mode = spec.mode,
        value_type = spec.value_type,
        values = quote_list(&spec.values),
        comment = quote(spec.comment()),
    )
}

pub fn update_rule_values_sql(fqn: &str, values: &[String]) -> String {
    format!("ALTER NETWORK RULE {fqn} SET VALUE_LIST = {};", quote_list(values))
}

pub fn drop_rule_sql(fqn: &str) -> String {
    format!("DROP NETWORK RULE IF EXISTS {fqn};")
}

pub fn list_rules_sql(database: &str, schema: &str) -> String {
    format!("SHOW NETWORK RULES IN SCHEMA {database}.{schema}")
}

pub fn create_policy_sql(spec: &NetworkPolicySpec, force: bool) -> String {
    let create = if force {
        "CREATE OR REPLACE NETWORK POLICY"
    } else {
        "CREATE NETWORK POLICY IF NOT EXISTS"
    };
    format!(
        "{create} {name}\n    ALLOWED_NETWORK_RULE_LIST = {rules}\n    COMMENT = {comment};",
        name = spec.name,
        rules = quote_list(&spec.rules),
        comment = quote(spec.comment.as_deref().unwrap_or(DEFAULT_COMMENT)),
    )
}

pub fn add_policy_rules_sql(policy: &str, rules: &[String]) -> String {
    format!(
        "ALTER NETWORK POLICY {policy} ADD ALLOWED_NETWORK_RULE_LIST = {};",
        quote_list(rules)
    )
}

/// Replace a policy's rule list wholesale (an empty list detaches every rule)
pub fn set_policy_rules_sql(policy: &str, rules: &[String]) -> String {
    format!(
        "ALTER NETWORK POLICY IF EXISTS {policy} SET ALLOWED_NETWORK_RULE_LIST = {};",
        quote_list(rules)
    )
}

pub fn describe_policy_sql(policy: &str) -> String {
    format!("DESC NETWORK POLICY {policy}")
}

pub fn drop_policy_sql(policy: &str) -> String {
    format!("DROP NETWORK POLICY IF EXISTS {policy};")
}

pub fn list_policies_sql() -> &'static str {
    "SHOW NETWORK POLICIES"
}

pub fn assign_policy_sql(user: &str, policy: &str) -> String {
    format!("ALTER USER {user} SET NETWORK_POLICY = {};", quote(policy))
}

pub fn unassign_policy_sql(user: &str) -> String {
    format!("ALTER USER IF EXISTS {user} UNSET NETWORK_POLICY;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule() -> NetworkRuleSpec {
        NetworkRuleSpec {
            name: "SVC_NETWORK_RULE".into(),
            database: "MY_DB".into(),
            schema: "NETWORKS".into(),
            mode: NetworkMode::Ingress,
            value_type: NetworkType::Ipv4,
            values: vec!["10.0.0.1/32".into(), "192.0.2.0/24".into()],
            comment: None,
        }
    }

    #[test]
    fn test_create_rule_sql() {
        assert_eq!(
            create_rule_sql(&rule(), true),
            "CREATE OR REPLACE NETWORK RULE MY_DB.NETWORKS.SVC_NETWORK_RULE\n    \
             MODE = INGRESS\n    \
             TYPE = IPV4\n    \
             VALUE_LIST = ('10.0.0.1/32', '192.0.2.0/24')\n    \
             COMMENT = 'Created by snow-utils';"
        );
        assert!(create_rule_sql(&rule(), false).starts_with("CREATE NETWORK RULE IF NOT EXISTS "));
    }

    #[test]
    fn test_comment_is_escaped() {
        let spec = NetworkRuleSpec {
            comment: Some("ops' rule".into()),
            ..rule()
        };
        assert!(create_rule_sql(&spec, true).ends_with("COMMENT = 'ops'' rule';"));
    }

    #[test]
    fn test_policy_sql() {
        let spec = NetworkPolicySpec {
            name: "SVC_NETWORK_POLICY".into(),
            rules: vec!["MY_DB.NETWORKS.SVC_NETWORK_RULE".into()],
            comment: None,
        };
        assert_eq!(
            create_policy_sql(&spec, false),
            "CREATE NETWORK POLICY IF NOT EXISTS SVC_NETWORK_POLICY\n    \
             ALLOWED_NETWORK_RULE_LIST = ('MY_DB.NETWORKS.SVC_NETWORK_RULE')\n    \
             COMMENT = 'Created by snow-utils';"
        );
        assert_eq!(
            set_policy_rules_sql("P", &[]),
            "ALTER NETWORK POLICY IF EXISTS P SET ALLOWED_NETWORK_RULE_LIST = ();"
        );
        assert_eq!(
            add_policy_rules_sql("P", &["A.B.C".into()]),
            "ALTER NETWORK POLICY P ADD ALLOWED_NETWORK_RULE_LIST = ('A.B.C');"
        );
    }

    #[test]
    fn test_user_assignment_sql() {
        assert_eq!(
            assign_policy_sql("SVC", "SVC_NETWORK_POLICY"),
            "ALTER USER SVC SET NETWORK_POLICY = 'SVC_NETWORK_POLICY';"
        );
        assert_eq!(unassign_policy_sql("SVC"), "ALTER USER IF EXISTS SVC UNSET NETWORK_POLICY;");
    }

    #[test]
    fn test_as_role() {
        let script = as_role("ACCOUNTADMIN", &ensure_container_sql("DB", "NETWORKS"));
        assert_eq!(
            script,
            "USE ROLE ACCOUNTADMIN;\nCREATE DATABASE IF NOT EXISTS DB;\nCREATE SCHEMA IF NOT EXISTS DB.NETWORKS;\n"
        );
    }
}

//! SQL text for service users, authentication policies and PATs

use crate::network::sql::as_role;
use snow_utils_common::defaults::DEFAULT_POLICY_SCHEMA;
use snow_utils_common::naming::user_auth_policy;

/// `db.POLICIES.<USER>_AUTH_POLICY`
pub fn auth_policy_fqn(database: &str, user: &str) -> String {
    format!("{database}.{DEFAULT_POLICY_SCHEMA}.{}", user_auth_policy(user))
}

pub fn service_user_sql(admin_role: &str, user: &str, role: &str) -> String {
    as_role(
        admin_role,
        &[
            format!(
                "CREATE USER IF NOT EXISTS {user}\n    TYPE = SERVICE\n    COMMENT = 'Service user for PAT access';"
            ),
            format!("GRANT ROLE {role} TO USER {user};"),
        ],
    )
}

pub fn unset_auth_policy_sql(admin_role: &str, user: &str) -> String {
    as_role(admin_role, &[format!("ALTER USER IF EXISTS {user} UNSET AUTHENTICATION POLICY;")])
}

/// PAT-only authentication with bounded expiry and enforced network policy
pub fn auth_policy_sql(
    admin_role: &str,
    user: &str,
    database: &str,
    default_expiry_days: u32,
    max_expiry_days: u32,
) -> String {
    let fqn = auth_policy_fqn(database, user);
    as_role(
        admin_role,
        &[
            format!("CREATE SCHEMA IF NOT EXISTS {database}.{DEFAULT_POLICY_SCHEMA};"),
            format!(
                "CREATE OR ALTER AUTHENTICATION POLICY {fqn}
    AUTHENTICATION_METHODS = ('PROGRAMMATIC_ACCESS_TOKEN')
    PAT_POLICY = (
        default_expiry_in_days = {default_expiry_days},
        max_expiry_in_days = {max_expiry_days},
        network_policy_evaluation = ENFORCED_REQUIRED
    );"
            ),
            format!("ALTER USER {user} SET AUTHENTICATION POLICY {fqn};"),
        ],
    )
}

pub fn remove_auth_policy_sql(admin_role: &str, user: &str, database: &str) -> String {
    as_role(
        admin_role,
        &[
            format!("ALTER USER IF EXISTS {user} UNSET AUTHENTICATION POLICY;"),
            format!("DROP AUTHENTICATION POLICY IF EXISTS {};", auth_policy_fqn(database, user)),
        ],
    )
}

pub fn show_pats_sql(user: &str) -> String {
    format!("SHOW USER PATS FOR USER {user}")
}

pub fn add_pat_sql(user: &str, pat_name: &str, role: &str) -> String {
    format!("ALTER USER IF EXISTS {user} ADD PAT {pat_name} ROLE_RESTRICTION = {role}")
}

pub fn rotate_pat_sql(user: &str, pat_name: &str) -> String {
    format!("ALTER USER IF EXISTS {user} ROTATE PAT {pat_name}")
}

pub fn remove_pat_sql(user: &str, pat_name: &str) -> String {
    format!("ALTER USER IF EXISTS {user} REMOVE PAT {pat_name}")
}

pub fn drop_user_sql(admin_role: &str, user: &str) -> String {
    as_role(admin_role, &[format!("DROP USER IF EXISTS {user};")])
}

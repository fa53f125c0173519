//! Name normalisation for AWS resources and Snowflake identifiers
//!
//! AWS names are lowercase and hyphenated; Snowflake unquoted identifiers
//! are uppercase and underscored. The same logical name is rendered in both
//! styles so resources created by one run can be found again by another.

use thiserror::Error;

/// Errors raised while deriving resource names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// Virtual-hosted S3 TLS certificates do not cover dotted names
    #[error("Bucket names cannot contain dots: '{0}'")]
    DottedBucket(String),

    /// Name normalised to nothing
    #[error("Name '{0}' contains no usable characters")]
    Empty(String),
}

fn collapse(s: &str, sep: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == sep && out.ends_with(sep) {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(sep).to_string()
}

fn aws_fragment(s: &str) -> String {
    s.to_lowercase()
        .replace('_', "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

fn sql_fragment(s: &str) -> String {
    s.replace(['-', ' '], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Render `name` as an AWS resource name, optionally prefixed
///
/// ```
/// use snow_utils_common::naming::to_aws_name;
/// assert_eq!(to_aws_name("My_Data Lake", Some("alice")), "alice-my-datalake");
/// ```
pub fn to_aws_name(name: &str, prefix: Option<&str>) -> String {
    let base = collapse(&aws_fragment(name), '-');
    match prefix.map(aws_fragment).filter(|p| !p.is_empty()) {
        Some(p) => format!("{p}-{base}"),
        None => base,
    }
}

/// Render `name` as an uppercase Snowflake identifier, optionally prefixed
pub fn to_sql_identifier(name: &str, prefix: Option<&str>) -> String {
    let mut base = collapse(&sql_fragment(name), '_');
    if base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert(0, '_');
    }
    let full = match prefix.map(sql_fragment).filter(|p| !p.is_empty()) {
        Some(p) => format!("{p}_{base}"),
        None => base,
    };
    full.to_uppercase()
}

/// Generate a fresh external id for a bucket's trust relationship
///
/// Format: `{PREFIX}_{BUCKET}_EXT_{8 HEX}`. A new value is produced on every
/// call.
pub fn generate_external_id(bucket: &str, prefix: Option<&str>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    to_sql_identifier(&format!("{bucket}_ext_{suffix}"), prefix)
}

/// Reject bucket names that cannot be served over virtual-hosted TLS
pub fn validate_bucket_name(bucket: &str) -> Result<(), NamingError> {
    if bucket.contains('.') {
        return Err(NamingError::DottedBucket(bucket.to_string()));
    }
    if to_aws_name(bucket, None).is_empty() {
        return Err(NamingError::Empty(bucket.to_string()));
    }
    Ok(())
}

/// Network rule created for a user's PAT access
pub fn user_network_rule(user: &str) -> String {
    format!("{}_NETWORK_RULE", user.to_uppercase())
}

/// Network policy created for a user's PAT access
pub fn user_network_policy(user: &str) -> String {
    format!("{}_NETWORK_POLICY", user.to_uppercase())
}

/// Authentication policy created for a user's PAT access
pub fn user_auth_policy(user: &str) -> String {
    format!("{}_AUTH_POLICY", user.to_uppercase())
}

/// Default PAT name for a service user
pub fn default_pat_name(user: &str) -> String {
    format!("{}_PAT", user.to_uppercase())
}

/// Policy name paired with a rule following the `*_NETWORK_RULE` convention
pub fn companion_policy(rule_name: &str) -> Option<String> {
    let upper = rule_name.to_uppercase();
    upper
        .strip_suffix("_NETWORK_RULE")
        .map(|stem| format!("{stem}_NETWORK_POLICY"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_aws_name() {
        assert_eq!(to_aws_name("Iceberg_Demo", None), "iceberg-demo");
        assert_eq!(to_aws_name("--a__b--", None), "a-b");
        assert_eq!(to_aws_name("demo", Some("K_Sampath")), "k-sampath-demo");
        assert_eq!(to_aws_name("demo", Some("")), "demo");
        assert_eq!(to_aws_name("x!@#y", None), "xy");
    }

    #[test]
    fn test_to_sql_identifier() {
        assert_eq!(
            to_sql_identifier("iceberg-demo_external_volume", None),
            "ICEBERG_DEMO_EXTERNAL_VOLUME"
        );
        assert_eq!(to_sql_identifier("1st bucket", None), "_1ST_BUCKET");
        assert_eq!(to_sql_identifier("demo", Some("alice-b")), "ALICE_B_DEMO");
        assert_eq!(to_sql_identifier("__a--b__", None), "A_B");
    }

    #[test]
    fn test_generate_external_id_unique() {
        let a = generate_external_id("demo", Some("alice"));
        let b = generate_external_id("demo", Some("alice"));
        assert_ne!(a, b, "external ids must differ per call");
        assert!(a.starts_with("ALICE_DEMO_EXT_"), "got {a}");
        assert_eq!(a.len(), "ALICE_DEMO_EXT_".len() + 8);
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("my-bucket").is_ok());
        assert_eq!(
            validate_bucket_name("my.bucket"),
            Err(NamingError::DottedBucket("my.bucket".to_string()))
        );
        assert!(matches!(validate_bucket_name("!!!"), Err(NamingError::Empty(_))));
    }

    #[test]
    fn test_user_object_names() {
        assert_eq!(user_network_rule("svc"), "SVC_NETWORK_RULE");
        assert_eq!(user_network_policy("svc"), "SVC_NETWORK_POLICY");
        assert_eq!(user_auth_policy("svc"), "SVC_AUTH_POLICY");
        assert_eq!(default_pat_name("svc"), "SVC_PAT");
    }

    #[test]
    fn test_companion_policy() {
        assert_eq!(
            companion_policy("app_network_rule").as_deref(),
            Some("APP_NETWORK_POLICY")
        );
        assert_eq!(companion_policy("allow_github"), None);
    }
}

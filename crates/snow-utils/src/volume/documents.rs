//! IAM policy and trust documents for the external volume role

use serde_json::{Value, json};

/// Trust statement id used once the Snowflake identity is known
pub const SNOWFLAKE_TRUST_SID: &str = "SnowflakeAccess";

/// Placeholder principal shown in dry-run plans
pub const SNOWFLAKE_USER_PLACEHOLDER: &str = "<SNOWFLAKE_IAM_USER_ARN>";

pub fn policy_arn(account_id: &str, policy_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:policy/{policy_name}")
}

pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

/// Object read/write on the bucket's keys plus listing the bucket
pub fn s3_access_policy(bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": [
                    "s3:PutObject",
                    "s3:GetObject",
                    "s3:GetObjectVersion",
                    "s3:DeleteObject",
                    "s3:DeleteObjectVersion",
                ],
                "Resource": format!("arn:aws:s3:::{bucket}/*"),
            },
            {
                "Effect": "Allow",
                "Action": ["s3:ListBucket", "s3:GetBucketLocation"],
                "Resource": format!("arn:aws:s3:::{bucket}"),
                "Condition": {"StringLike": {"s3:prefix": ["*"]}},
            },
        ],
    })
}

/// Trust the owning account, gated on the external id
///
/// Used until the volume exists and Snowflake has assigned its IAM user.
pub fn initial_trust_policy(account_id: &str, external_id: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {"AWS": format!("arn:aws:iam::{account_id}:root")},
                "Action": "sts:AssumeRole",
                "Condition": {"StringEquals": {"sts:ExternalId": external_id}},
            }
        ],
    })
}

/// Trust only Snowflake's IAM user for this volume
pub fn snowflake_trust_policy(snowflake_user_arn: &str, external_id: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": SNOWFLAKE_TRUST_SID,
                "Effect": "Allow",
                "Principal": {"AWS": snowflake_user_arn},
                "Action": "sts:AssumeRole",
                "Condition": {"StringEquals": {"sts:ExternalId": external_id}},
            }
        ],
    })
}

/// AWS principals named anywhere in a trust document
pub fn trust_principals(document: &Value) -> Vec<String> {
    let statements = match document.get("Statement") {
        Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => return Vec::new(),
    };
    statements
        .into_iter()
        .filter_map(|s| s.get("Principal").and_then(|p| p.get("AWS")))
        .flat_map(|aws| match aws {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            _ => Vec::new(),
        })
        .collect()
}

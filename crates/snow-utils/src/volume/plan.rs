//! Dry-run plan for `create`

use super::config::ExternalVolumeConfig;
use super::documents::{
    SNOWFLAKE_USER_PLACEHOLDER, initial_trust_policy, policy_arn, role_arn, s3_access_policy,
    snowflake_trust_policy,
};
use super::snowflake::{create_volume_sql, describe_volume_sql, verify_volume_sql};
use serde_json::Value;
use std::fmt::Write;

fn pretty(doc: &Value) -> String {
    serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string())
}

fn section(out: &mut String, title: &str) {
    let rule = "─".repeat(60);
    let _ = writeln!(out, "{rule}\n{title}\n{rule}");
}

/// Everything `create` would do, with documents and SQL in full
///
/// `account_id` may be a placeholder when no AWS credentials are available.
pub fn render_create_plan(config: &ExternalVolumeConfig, account_id: &str, force: bool) -> String {
    let role_arn = role_arn(account_id, &config.role_name);
    let mut out = String::new();

    section(&mut out, "Step 1: Create S3 bucket with versioning");
    let _ = writeln!(out, "Bucket: {}", config.bucket_name);
    let _ = writeln!(out, "Region: {}", config.region);
    let _ = writeln!(out, "Versioning: Enabled\n");

    section(&mut out, "Step 2: Create IAM Policy");
    let _ = writeln!(out, "Policy Name: {}", config.policy_name);
    let _ = writeln!(out, "Policy ARN:  {}\n", policy_arn(account_id, &config.policy_name));
    let _ = writeln!(out, "Policy Document:\n{}\n", pretty(&s3_access_policy(&config.bucket_name)));

    section(&mut out, "Step 3: Create IAM Role with Trust Policy");
    let _ = writeln!(out, "Role Name: {}", config.role_name);
    let _ = writeln!(out, "Role ARN:  {role_arn}\n");
    let _ = writeln!(
        out,
        "Initial Trust Policy (before Snowflake IAM user is known):\n{}\n",
        pretty(&initial_trust_policy(account_id, &config.external_id))
    );
    let _ = writeln!(
        out,
        "Final Trust Policy (after external volume creation):\n{}\n",
        pretty(&snowflake_trust_policy(SNOWFLAKE_USER_PLACEHOLDER, &config.external_id))
    );

    section(&mut out, "Step 4: Create Snowflake External Volume");
    let _ = writeln!(out, "{}\n", create_volume_sql(config, &role_arn, force));

    section(&mut out, "Step 5-7: Post-creation steps");
    let _ = writeln!(out, "-- Retrieve Snowflake IAM user ARN");
    let _ = writeln!(out, "{};\n", describe_volume_sql(&config.volume_name));
    let _ = writeln!(out, "-- Update IAM trust policy with actual Snowflake IAM user ARN");
    let _ = writeln!(out, "-- Verify external volume");
    let _ = writeln!(out, "{};", verify_volume_sql(&config.volume_name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::config::VolumeOverrides;
    use snow_utils_common::defaults::ACCOUNT_ID_PLACEHOLDER;

    #[test]
    fn test_plan_with_placeholder_account() {
        let config = ExternalVolumeConfig::resolve(
            "lake",
            None,
            "us-east-1",
            true,
            VolumeOverrides {
                external_id: Some("LAKE_EXT_12345678".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let plan = render_create_plan(&config, ACCOUNT_ID_PLACEHOLDER, false);

        assert!(plan.contains("Policy ARN:  arn:aws:iam::<AWS_ACCOUNT_ID>:policy/lake-snowflake-policy"));
        assert!(plan.contains("\"arn:aws:iam::<AWS_ACCOUNT_ID>:root\""));
        assert!(plan.contains(SNOWFLAKE_USER_PLACEHOLDER));
        assert!(plan.contains("CREATE EXTERNAL VOLUME IF NOT EXISTS LAKE_EXTERNAL_VOLUME"));
        assert!(plan.contains("STORAGE_AWS_EXTERNAL_ID = 'LAKE_EXT_12345678'"));
        assert!(plan.contains("DESC EXTERNAL VOLUME LAKE_EXTERNAL_VOLUME;"));
        assert!(plan.contains("SELECT SYSTEM$VERIFY_EXTERNAL_VOLUME('LAKE_EXTERNAL_VOLUME');"));
    }
}

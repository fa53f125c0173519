//! AWS integration tests - actually call AWS APIs
//!
//! These tests are marked `#[ignore]` and only run with:
//! ```text
//! AWS_PROFILE=your_profile cargo test --test aws_integration -- --ignored
//! ```

use snow_utils::aws::{AwsCloud, CloudApi};
use snow_utils::volume::documents::{initial_trust_policy, policy_arn, s3_access_policy, trust_principals};
use snow_utils_test_utils::{get_test_region, test_bucket_name, test_run_id};

/// Bucket create is idempotent and delete with force empties versions
#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_bucket_lifecycle() {
    let cloud = AwsCloud::new(&get_test_region(), None).await;
    let bucket = test_bucket_name();

    assert!(cloud.ensure_bucket(&bucket).await.expect("Should create bucket"));
    assert!(
        !cloud.ensure_bucket(&bucket).await.expect("Second ensure should succeed"),
        "Existing bucket should not be reported as created"
    );

    cloud
        .delete_bucket(&bucket, true)
        .await
        .expect("Should delete bucket");
}

/// Policy and role are created once, trust is readable, and delete
/// tolerates resources that are already gone
#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_policy_and_role_lifecycle() {
    let cloud = AwsCloud::new(&get_test_region(), None).await;
    let account = cloud.account_id().await.expect("AWS credentials required");

    let run_id = test_run_id();
    let policy_name = format!("snow-utils-{run_id}-policy");
    let role_name = format!("snow-utils-{run_id}-role");
    let arn = policy_arn(&account, &policy_name);

    let policy = cloud
        .ensure_policy(&policy_name, &arn, &s3_access_policy("snow-utils-test").to_string())
        .await
        .expect("Should create policy");
    assert!(policy.created);

    let trust = initial_trust_policy(&account, "SNOW_UTILS_TEST_EXT").to_string();
    let role = cloud
        .ensure_role(&role_name, &trust, &policy.id)
        .await
        .expect("Should create role");
    assert!(role.created);
    assert!(role.id.ends_with(&format!(":role/{role_name}")));
    assert!(cloud.role_exists(&role_name).await);

    let again = cloud
        .ensure_role(&role_name, &trust, &policy.id)
        .await
        .expect("Second ensure should succeed");
    assert!(!again.created);

    let doc = cloud
        .trust_policy(&role_name)
        .await
        .expect("Should read trust policy")
        .expect("Role should have a trust policy");
    assert!(
        trust_principals(&doc)
            .iter()
            .any(|p| p.contains(account.as_str()))
    );

    cloud
        .delete_role(&role_name, Some(&policy.id))
        .await
        .expect("Should delete role");
    assert!(!cloud.role_exists(&role_name).await);
    cloud.delete_policy(&policy.id).await.expect("Should delete policy");

    cloud
        .delete_role(&role_name, Some(&policy.id))
        .await
        .expect("Deleting a missing role should succeed");
    cloud
        .delete_policy(&policy.id)
        .await
        .expect("Deleting a missing policy should succeed");
}

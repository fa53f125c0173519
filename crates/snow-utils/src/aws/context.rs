//! AWS configuration for one external volume region
//!
//! The SDK config is loaded once and the IAM, S3 and STS clients for a
//! command are all built from it. IAM is global, so the region only
//! matters for the bucket and the storage location Snowflake writes to.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::types::BucketLocationConstraint;
use snow_utils_common::defaults::{DEFAULT_REGION, US_EAST_1};
use std::sync::Arc;

#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load credentials through the default provider chain for `region`
    ///
    /// A blank region falls back to the default volume region.
    pub async fn new(region: &str) -> Self {
        let region = normalize_region(region);
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .load()
            .await;
        Self::from_sdk_config(config, region)
    }

    /// Wrap an already loaded config
    pub fn from_sdk_config(config: SdkConfig, region: impl Into<String>) -> Self {
        Self {
            config: Arc::new(config),
            region: region.into(),
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// LocationConstraint for CreateBucket; us-east-1 must omit it
    pub fn bucket_location(&self) -> Option<BucketLocationConstraint> {
        (self.region != US_EAST_1).then(|| BucketLocationConstraint::from(self.region.as_str()))
    }

    pub fn iam_client(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(self.sdk_config())
    }

    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }

    pub fn sts_client(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(self.sdk_config())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

fn normalize_region(region: &str) -> String {
    let region = region.trim();
    if region.is_empty() {
        DEFAULT_REGION.to_string()
    } else {
        region.to_lowercase()
    }
}

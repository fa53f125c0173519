//! The cloud resource seam used by the external volume workflow

use super::account::{AccountId, get_current_account_id};
use super::context::AwsContext;
use super::iam::IamClient;
use super::s3::S3Client;
use crate::probe::{Ensured, Probe};
use anyhow::Result;
use serde_json::Value;
use std::future::Future;

/// Trait for the AWS operations the external volume workflow needs.
pub trait CloudApi: Send + Sync {
    /// Account of the active credentials
    fn account_id(&self) -> impl Future<Output = Result<AccountId>> + Send;

    /// Create the bucket if absent; `true` when created by this call
    fn ensure_bucket(&self, bucket: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Delete a bucket, emptying all versions first when `force` is set
    fn delete_bucket(&self, bucket: &str, force: bool) -> impl Future<Output = Result<()>> + Send;

    /// Create a managed policy if absent
    fn ensure_policy(
        &self,
        name: &str,
        arn: &str,
        document: &str,
    ) -> impl Future<Output = Result<Ensured>> + Send;

    fn delete_policy(&self, arn: &str) -> impl Future<Output = Result<()>> + Send;

    /// Create a role with the given trust policy and attach a policy, if absent
    fn ensure_role(
        &self,
        name: &str,
        trust_policy: &str,
        policy_arn: &str,
    ) -> impl Future<Output = Result<Ensured>> + Send;

    /// Whether the role is visible yet (used while waiting for propagation)
    fn role_exists(&self, name: &str) -> impl Future<Output = bool> + Send;

    fn update_trust_policy(
        &self,
        role: &str,
        trust_policy: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Current trust policy document, decoded
    fn trust_policy(&self, role: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Detach `policy_arn` (if given) and delete the role
    fn delete_role(
        &self,
        role: &str,
        policy_arn: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// [`CloudApi`] backed by the AWS SDK
pub struct AwsCloud {
    ctx: AwsContext,
    iam: IamClient,
    s3: S3Client,
}

impl AwsCloud {
    /// Load AWS configuration for `region` and build the clients
    pub async fn new(region: &str, prefix: Option<String>) -> Self {
        let ctx = AwsContext::new(region).await;
        Self::from_context(ctx, prefix)
    }

    pub fn from_context(ctx: AwsContext, prefix: Option<String>) -> Self {
        Self {
            iam: IamClient::from_context(&ctx).with_prefix(prefix.clone()),
            s3: S3Client::from_context(&ctx).with_prefix(prefix),
            ctx,
        }
    }

    pub fn context(&self) -> &AwsContext {
        &self.ctx
    }
}

impl CloudApi for AwsCloud {
    async fn account_id(&self) -> Result<AccountId> {
        get_current_account_id(&self.ctx).await
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<bool> {
        self.s3.ensure_bucket(bucket).await
    }

    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<()> {
        self.s3.delete_bucket(bucket, force).await
    }

    async fn ensure_policy(&self, name: &str, arn: &str, document: &str) -> Result<Ensured> {
        self.iam.ensure_policy(name, arn, document).await
    }

    async fn delete_policy(&self, arn: &str) -> Result<()> {
        self.iam.delete_policy(arn).await
    }

    async fn ensure_role(&self, name: &str, trust_policy: &str, policy_arn: &str) -> Result<Ensured> {
        self.iam.ensure_role(name, trust_policy, policy_arn).await
    }

    async fn role_exists(&self, name: &str) -> bool {
        matches!(self.iam.probe_role(name).await, Ok(Probe::Found(_)))
    }

    async fn update_trust_policy(&self, role: &str, trust_policy: &str) -> Result<()> {
        self.iam.update_trust_policy(role, trust_policy).await
    }

    async fn trust_policy(&self, role: &str) -> Result<Option<Value>> {
        self.iam.trust_policy(role).await
    }

    async fn delete_role(&self, role: &str, policy_arn: Option<&str>) -> Result<()> {
        self.iam.delete_role(role, policy_arn).await
    }
}

//! Identity of the AWS account the volume's IAM objects live in

use super::context::AwsContext;
use anyhow::{Context, Result};
use snow_utils_common::{MaskKind, Masker};
use tracing::info;

/// 12-digit AWS account id, as used in policy and role ARNs
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(s: impl Into<String>) -> Self {
        AccountId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// STS GetCallerIdentity for the context's credentials
///
/// Needs no IAM permissions, so a failure means the credentials are
/// missing or expired.
pub async fn get_current_account_id(ctx: &AwsContext) -> Result<AccountId> {
    let identity = ctx
        .sts_client()
        .get_caller_identity()
        .send()
        .await
        .context("Failed to get AWS caller identity - check credentials")?;

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    info!(
        account_id = %Masker::enabled().mask(account, MaskKind::AccountId),
        region = %ctx.region(),
        "AWS account validated"
    );
    Ok(AccountId::new(account))
}

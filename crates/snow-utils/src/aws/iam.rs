//! IAM role and policy management for Snowflake external volumes

use super::context::AwsContext;
use super::error::{is_not_found, probe_result};
use crate::probe::{Ensured, Probe};
use anyhow::{Context, Result, bail};
use aws_sdk_iam::Client;
use serde_json::Value;
use snow_utils_common::tags;
use tracing::{debug, info, warn};

/// Description attached to roles created for external volumes
pub const ROLE_DESCRIPTION: &str = "IAM role for Snowflake external volume access";

/// Description attached to S3 access policies
pub const POLICY_DESCRIPTION: &str = "S3 access for a Snowflake external volume";

/// IAM client for managing the external volume role and policy
pub struct IamClient {
    client: Client,
    prefix: Option<String>,
}

fn iam_tags(prefix: Option<&str>) -> Result<Vec<aws_sdk_iam::types::Tag>> {
    tags::standard_tags(prefix)
        .into_iter()
        .map(|(key, value)| {
            aws_sdk_iam::types::Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to build IAM tag: {}", e))
        })
        .collect()
}

impl IamClient {
    /// Create an IAM client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.iam_client(),
            prefix: None,
        }
    }

    /// Record the naming prefix in resource tags
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Check whether a role exists, returning its ARN
    pub async fn probe_role(&self, role_name: &str) -> Result<Probe<String>> {
        let probe = probe_result(self.client.get_role().role_name(role_name).send().await)
            .context("Failed to get IAM role")?;
        Ok(probe.map(|resp| {
            resp.role()
                .map(|r| r.arn().to_string())
                .unwrap_or_default()
        }))
    }

    /// Check whether a managed policy exists
    pub async fn probe_policy(&self, policy_arn: &str) -> Result<Probe<()>> {
        let probe = probe_result(self.client.get_policy().policy_arn(policy_arn).send().await)
            .context("Failed to get IAM policy")?;
        Ok(probe.map(|_| ()))
    }

    /// Create a managed policy unless one with this ARN already exists
    pub async fn ensure_policy(
        &self,
        policy_name: &str,
        policy_arn: &str,
        document: &str,
    ) -> Result<Ensured> {
        match self.probe_policy(policy_arn).await? {
            Probe::Found(()) => {
                info!(policy = %policy_name, "IAM policy already exists");
                return Ok(Ensured::existing(policy_arn));
            }
            Probe::Denied(reason) => {
                bail!("IAM policy '{}' exists but is not accessible: {}", policy_name, reason)
            }
            Probe::NotFound => {}
        }

        info!(policy = %policy_name, "Creating IAM policy");
        let resp = self
            .client
            .create_policy()
            .policy_name(policy_name)
            .policy_document(document)
            .description(POLICY_DESCRIPTION)
            .set_tags(Some(iam_tags(self.prefix.as_deref())?))
            .send()
            .await
            .context("Failed to create IAM policy")?;

        let arn = resp
            .policy()
            .and_then(|p| p.arn())
            .unwrap_or(policy_arn)
            .to_string();
        debug!(policy = %policy_name, "IAM policy created");
        Ok(Ensured::created(arn))
    }

    /// Create a role with `trust_policy` and attach `policy_arn`, unless it exists
    pub async fn ensure_role(
        &self,
        role_name: &str,
        trust_policy: &str,
        policy_arn: &str,
    ) -> Result<Ensured> {
        match self.probe_role(role_name).await? {
            Probe::Found(arn) => {
                info!(role = %role_name, "IAM role already exists");
                return Ok(Ensured::existing(arn));
            }
            Probe::Denied(reason) => {
                bail!("IAM role '{}' exists but is not accessible: {}", role_name, reason)
            }
            Probe::NotFound => {}
        }

        info!(role = %role_name, "Creating IAM role");
        let resp = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(trust_policy)
            .description(ROLE_DESCRIPTION)
            .set_tags(Some(iam_tags(self.prefix.as_deref())?))
            .send()
            .await
            .context("Failed to create IAM role")?;

        let arn = resp
            .role()
            .map(|r| r.arn().to_string())
            .context("CreateRole returned no role")?;

        let attached = self
            .client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await;
        if let Err(e) = attached {
            // Never reported as created, so rollback would miss it
            if let Err(cleanup) = self.delete_role(role_name, None).await {
                warn!(error = ?cleanup, role = %role_name, "Failed to remove IAM role after attach failure");
            }
            return Err(e).context("Failed to attach policy to IAM role");
        }

        debug!(role = %role_name, "IAM role created and policy attached");
        Ok(Ensured::created(arn))
    }

    /// Replace a role's trust policy
    pub async fn update_trust_policy(&self, role_name: &str, trust_policy: &str) -> Result<()> {
        info!(role = %role_name, "Updating IAM role trust policy");
        self.client
            .update_assume_role_policy()
            .role_name(role_name)
            .policy_document(trust_policy)
            .send()
            .await
            .context("Failed to update IAM role trust policy")?;
        Ok(())
    }

    /// Fetch and decode a role's trust policy
    ///
    /// IAM returns the document URL-encoded.
    pub async fn trust_policy(&self, role_name: &str) -> Result<Option<Value>> {
        let resp = self
            .client
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .context("Failed to get IAM role")?;

        let Some(encoded) = resp.role().and_then(|r| r.assume_role_policy_document()) else {
            return Ok(None);
        };
        let decoded = urlencoding::decode(encoded).context("Trust policy is not valid UTF-8")?;
        let doc = serde_json::from_str(&decoded).context("Trust policy is not valid JSON")?;
        Ok(Some(doc))
    }

    /// Detach the policy and delete the role; a missing role is not an error
    pub async fn delete_role(&self, role_name: &str, policy_arn: Option<&str>) -> Result<()> {
        info!(role = %role_name, "Deleting IAM role");

        if let Some(policy_arn) = policy_arn {
            if let Err(e) = self
                .client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await
            {
                debug!(error = ?e, "Failed to detach policy (may already be detached)");
            }
        }

        match self.client.delete_role().role_name(role_name).send().await {
            Ok(_) => {
                info!(role = %role_name, "IAM role deleted");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(role = %role_name, "IAM role already deleted");
                Ok(())
            }
            Err(e) => {
                warn!(error = ?e, role = %role_name, "Failed to delete IAM role");
                Err(e).context("Failed to delete IAM role")
            }
        }
    }

    /// Delete a managed policy; a missing policy is not an error
    pub async fn delete_policy(&self, policy_arn: &str) -> Result<()> {
        match self.client.delete_policy().policy_arn(policy_arn).send().await {
            Ok(_) => {
                info!("IAM policy deleted");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!("IAM policy already deleted");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to delete IAM policy"),
        }
    }
}

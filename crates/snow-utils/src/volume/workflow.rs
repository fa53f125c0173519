//! External volume provisioning workflow
//!
//! Create is a fixed linear sequence:
//!
//! ```text
//! NotStarted -> BucketCreated -> PolicyCreated -> RoleCreated -> VolumeCreated
//!            -> IdentityRetrieved -> TrustUpdated -> Verified -> Done
//! ```
//!
//! The volume has to exist before trust can be finalised: Snowflake only
//! assigns the IAM user it will assume the role as once the volume object
//! is created. Until then the role trusts the owning account, gated on the
//! external id.
//!
//! On failure, resources created by this run are removed in reverse order
//! and the original error is returned.

use super::config::ExternalVolumeConfig;
use super::documents::{
    initial_trust_policy, policy_arn, s3_access_policy, snowflake_trust_policy, trust_principals,
};
use super::snowflake::{StorageIdentity, Verification, VolumeReconciler};
use crate::aws::CloudApi;
use crate::output::ProgressReporter;
use crate::snow::SqlExecutor;
use crate::wait::{WaitConfig, wait_until};
use anyhow::Result;
use serde::Serialize;
use snow_utils_common::{MaskKind, Masker, ResourceKind};
use std::fmt;
use tracing::{info, instrument, warn};

/// Progress through the create sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    #[default]
    NotStarted,
    BucketCreated,
    PolicyCreated,
    RoleCreated,
    VolumeCreated,
    IdentityRetrieved,
    TrustUpdated,
    Verified,
    Done,
}

/// Outcome of removing one resource during rollback or delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CleanupResult {
    Removed,
    Failed { error: String },
}

impl CleanupResult {
    pub fn is_removed(&self) -> bool {
        matches!(self, CleanupResult::Removed)
    }
}

/// A resource this run created, with the identifier needed to remove it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedResource {
    pub kind: ResourceKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Replace an existing volume
    pub force: bool,
    pub skip_verify: bool,
}

/// Successful create
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    pub account_id: String,
    pub role_arn: String,
    pub policy_arn: String,
    pub storage: StorageIdentity,
    /// `None` when verification was skipped or returned nothing
    pub verification: Option<Verification>,
    pub verified: bool,
    pub created: Vec<CreatedResource>,
    pub state: VolumeState,
}

/// Failed create
///
/// Displays as the original error; the rollback record is kept alongside.
#[derive(Debug)]
pub struct CreateFailed {
    pub state: VolumeState,
    pub rollback: Vec<(ResourceKind, CleanupResult)>,
    pub error: anyhow::Error,
}

impl fmt::Display for CreateFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for CreateFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Names removed by a delete
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub removed: Vec<CreatedResource>,
}

#[derive(Debug, Default)]
struct Run {
    state: VolumeState,
    created: Vec<CreatedResource>,
    policy_arn: Option<String>,
}

impl Run {
    fn advance(&mut self, state: VolumeState) {
        info!(state = %state, "External volume workflow advanced");
        self.state = state;
    }

    fn track(&mut self, created: bool, kind: ResourceKind, id: &str) {
        if created {
            self.created.push(CreatedResource {
                kind,
                id: id.to_string(),
            });
        }
    }
}

/// Drives the create, delete and trust-update flows
pub struct VolumeWorkflow<'a, C, E, R> {
    cloud: &'a C,
    exec: &'a E,
    reporter: &'a R,
    masker: Masker,
    wait: WaitConfig,
}

impl<'a, C, E, R> VolumeWorkflow<'a, C, E, R>
where
    C: CloudApi,
    E: SqlExecutor,
    R: ProgressReporter,
{
    pub fn new(cloud: &'a C, exec: &'a E, reporter: &'a R, masker: Masker) -> Self {
        Self {
            cloud,
            exec,
            reporter,
            masker,
            wait: WaitConfig::default(),
        }
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    fn volumes(&self) -> VolumeReconciler<'a, E> {
        VolumeReconciler::new(self.exec)
    }

    /// Create bucket, policy, role and volume, then finalise trust
    #[instrument(skip_all, fields(volume = %config.volume_name))]
    pub async fn create(
        &self,
        config: &ExternalVolumeConfig,
        options: CreateOptions,
    ) -> Result<CreateOutcome, CreateFailed> {
        let mut run = Run::default();
        match self.run_create(config, options, &mut run).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.reporter.failure(&format!("Failed at {}: {error:#}", run.state));
                let rollback = self.rollback(&run.created, run.policy_arn.as_deref()).await;
                Err(CreateFailed {
                    state: run.state,
                    rollback,
                    error,
                })
            }
        }
    }

    async fn run_create(
        &self,
        config: &ExternalVolumeConfig,
        options: CreateOptions,
        run: &mut Run,
    ) -> Result<CreateOutcome> {
        let account = self.cloud.account_id().await?;
        let policy_arn = policy_arn(&account, &config.policy_name);
        self.reporter
            .detail("AWS Account ID", &self.masker.mask(&account, MaskKind::AccountId));

        self.reporter.step("Step 1: Create S3 Bucket");
        let created = self.cloud.ensure_bucket(&config.bucket_name).await?;
        run.track(created, ResourceKind::S3Bucket, &config.bucket_name);
        self.report_ensured(created, "S3 bucket", &config.bucket_name);
        run.advance(VolumeState::BucketCreated);

        self.reporter.step("Step 2: Create IAM Policy");
        let document = s3_access_policy(&config.bucket_name).to_string();
        let policy = self
            .cloud
            .ensure_policy(&config.policy_name, &policy_arn, &document)
            .await?;
        run.track(policy.created, ResourceKind::IamPolicy, &policy.id);
        run.policy_arn = Some(policy.id.clone());
        self.report_ensured(policy.created, "IAM policy", &config.policy_name);
        run.advance(VolumeState::PolicyCreated);

        self.reporter.step("Step 3: Create IAM Role");
        let trust = initial_trust_policy(&account, &config.external_id).to_string();
        let role = self
            .cloud
            .ensure_role(&config.role_name, &trust, &policy.id)
            .await?;
        run.track(role.created, ResourceKind::IamRole, &config.role_name);
        self.report_ensured(role.created, "IAM role", &config.role_name);
        let role_arn = role.id;
        run.advance(VolumeState::RoleCreated);

        let cloud = self.cloud;
        let role_name = config.role_name.as_str();
        if wait_until(&self.wait, move || cloud.role_exists(role_name), "IAM role").await {
            self.reporter.success("IAM role is available");
        } else {
            self.reporter.warning("IAM role propagation timeout, proceeding anyway...");
        }

        self.reporter.step("Step 4: Create Snowflake External Volume");
        let volumes = self.volumes();
        let existed = volumes.exists(&config.volume_name).await?;
        volumes.create(config, &role_arn, options.force).await?;
        run.track(!existed, ResourceKind::ExternalVolume, &config.volume_name);
        self.report_ensured(!existed || options.force, "external volume", &config.volume_name);
        run.advance(VolumeState::VolumeCreated);

        self.reporter.step("Step 5: Retrieve Snowflake IAM User");
        let storage = volumes.describe(&config.volume_name).await?;
        self.reporter.detail(
            "Snowflake IAM User ARN",
            &self.masker.mask(&storage.iam_user_arn, MaskKind::Arn),
        );
        run.advance(VolumeState::IdentityRetrieved);

        self.reporter.step("Step 6: Update IAM Trust Policy");
        let external_id = storage.external_id.as_deref().unwrap_or(&config.external_id);
        self.reporter
            .detail("External ID", &self.masker.mask(external_id, MaskKind::ExternalId));
        let trust = snowflake_trust_policy(&storage.iam_user_arn, external_id).to_string();
        self.cloud.update_trust_policy(&config.role_name, &trust).await?;
        self.reporter.success("Trust policy updated");
        run.advance(VolumeState::TrustUpdated);

        let principal = storage.iam_user_arn.as_str();
        let trusted = wait_until(
            &self.wait,
            move || async move {
                match cloud.trust_policy(role_name).await {
                    Ok(Some(doc)) => trust_principals(&doc).iter().any(|p| p.contains(principal)),
                    _ => false,
                }
            },
            "trust policy",
        )
        .await;
        if trusted {
            self.reporter.success("Trust policy is updated");
        } else {
            self.reporter.warning("Trust policy propagation timeout, proceeding anyway...");
        }

        let mut verification = None;
        if !options.skip_verify {
            self.reporter.step("Step 7: Verify External Volume");
            verification = self.verify_volume(&config.volume_name).await;
            run.advance(VolumeState::Verified);
        }
        let verified = verification.as_ref().is_some_and(|v| v.success);

        run.advance(VolumeState::Done);
        Ok(CreateOutcome {
            account_id: account.to_string(),
            role_arn,
            policy_arn,
            storage,
            verification,
            verified,
            created: run.created.clone(),
            state: run.state,
        })
    }

    /// Verify and report; a failure here is reported, not returned
    pub async fn verify_volume(&self, volume: &str) -> Option<Verification> {
        match self.volumes().verify(volume).await {
            Ok(Some(v)) => {
                if v.success {
                    self.reporter.success("External volume verified successfully");
                } else {
                    self.reporter.failure("External volume verification failed");
                }
                if let Some(result) = &v.storage_location_selection_result {
                    self.reporter.detail("storageLocationSelectionResult", result);
                }
                if let Some(raw) = &v.raw {
                    self.reporter.detail("Verification result", raw);
                }
                Some(v)
            }
            Ok(None) => {
                self.reporter.warning("Could not verify external volume");
                None
            }
            Err(e) => {
                self.reporter.warning(&format!("Verification failed: {e:#}"));
                None
            }
        }
    }

    /// Remove `created` in reverse order, continuing past failures
    ///
    /// `attached_policy` is detached from a role before the role is deleted.
    pub async fn rollback(
        &self,
        created: &[CreatedResource],
        attached_policy: Option<&str>,
    ) -> Vec<(ResourceKind, CleanupResult)> {
        if created.is_empty() {
            return Vec::new();
        }
        self.reporter.step("Rolling back created resources");

        let mut results = Vec::with_capacity(created.len());

        for resource in created.iter().rev() {
            let outcome = match resource.kind {
                ResourceKind::ExternalVolume => self.volumes().drop(&resource.id).await,
                ResourceKind::IamRole => self.cloud.delete_role(&resource.id, attached_policy).await,
                ResourceKind::IamPolicy => self.cloud.delete_policy(&resource.id).await,
                ResourceKind::S3Bucket => self.cloud.delete_bucket(&resource.id, false).await,
            };
            let result = match outcome {
                Ok(()) => {
                    self.reporter.success(&format!("Removed {} {}", resource.kind, resource.id));
                    CleanupResult::Removed
                }
                Err(e) => {
                    warn!(kind = %resource.kind, id = %resource.id, error = ?e, "Rollback step failed");
                    self.reporter
                        .warning(&format!("Failed to remove {} {}: {e:#}", resource.kind, resource.id));
                    CleanupResult::Failed {
                        error: format!("{e:#}"),
                    }
                }
            };
            results.push((resource.kind, result));
        }
        results
    }

    /// Drop the volume, role and policy, and optionally the bucket
    #[instrument(skip_all, fields(volume = %config.volume_name))]
    pub async fn delete(
        &self,
        config: &ExternalVolumeConfig,
        delete_bucket: bool,
        force: bool,
    ) -> Result<DeleteOutcome> {
        let account = self.cloud.account_id().await?;
        let policy_arn = policy_arn(&account, &config.policy_name);
        let mut removed = Vec::new();

        self.reporter.step("Step 1: Drop External Volume");
        self.volumes().drop(&config.volume_name).await?;
        self.reporter
            .success(&format!("Dropped external volume: {}", config.volume_name));
        removed.push(CreatedResource {
            kind: ResourceKind::ExternalVolume,
            id: config.volume_name.clone(),
        });

        self.reporter.step("Step 2: Delete IAM Role");
        self.cloud.delete_role(&config.role_name, Some(&policy_arn)).await?;
        self.reporter.success(&format!("Deleted IAM role: {}", config.role_name));
        removed.push(CreatedResource {
            kind: ResourceKind::IamRole,
            id: config.role_name.clone(),
        });

        self.reporter.step("Step 3: Delete IAM Policy");
        self.cloud.delete_policy(&policy_arn).await?;
        self.reporter.success(&format!("Deleted IAM policy: {}", config.policy_name));
        removed.push(CreatedResource {
            kind: ResourceKind::IamPolicy,
            id: policy_arn,
        });

        if delete_bucket {
            self.reporter.step("Step 4: Delete S3 Bucket");
            self.cloud.delete_bucket(&config.bucket_name, force).await?;
            self.reporter.success(&format!("Deleted S3 bucket: {}", config.bucket_name));
            removed.push(CreatedResource {
                kind: ResourceKind::S3Bucket,
                id: config.bucket_name.clone(),
            });
        }

        Ok(DeleteOutcome { removed })
    }

    /// Re-sync the role's trust policy with the volume's current identity
    pub async fn update_trust(&self, role_name: &str, volume_name: &str) -> Result<StorageIdentity> {
        let storage = self.volumes().describe(volume_name).await?;
        self.reporter.detail(
            "Snowflake IAM User ARN",
            &self.masker.mask(&storage.iam_user_arn, MaskKind::Arn),
        );
        let external_id = storage.external_id.as_deref().unwrap_or_default();
        let trust = snowflake_trust_policy(&storage.iam_user_arn, external_id).to_string();
        self.cloud.update_trust_policy(role_name, &trust).await?;
        self.reporter.success("Trust policy updated successfully");
        Ok(storage)
    }

    fn report_ensured(&self, created: bool, what: &str, name: &str) {
        if created {
            self.reporter.success(&format!("Created {what}: {name}"));
        } else {
            self.reporter.success(&format!("Using existing {what}: {name}"));
        }
    }
}

//! Structured result document emitted by `--output json`

use serde::Serialize;

/// Outcome recorded in a result document
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProvisioningStatus {
    Success,
    DryRun,
    Failed,
    Rotated,
    Removed,
}

/// Result of a provisioning command
///
/// `details` is flattened into the top-level object so each tool controls
/// its own resource layout. `token` is only present when a secret was issued
/// by this call.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningResult<T> {
    pub status: ProvisioningStatus,
    #[serde(flatten)]
    pub details: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ProvisioningResult<T> {
    /// Create a successful result
    pub fn success(details: T) -> Self {
        Self::with_status(ProvisioningStatus::Success, details)
    }

    /// Create a dry-run result
    pub fn dry_run(details: T) -> Self {
        Self::with_status(ProvisioningStatus::DryRun, details)
    }

    /// Create a failed result carrying the error message
    pub fn failed(details: T, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(ProvisioningStatus::Failed, details)
        }
    }

    pub fn with_status(status: ProvisioningStatus, details: T) -> Self {
        Self {
            status,
            details,
            token: None,
            error: None,
        }
    }

    /// Attach a freshly issued secret
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, ProvisioningStatus::Failed)
    }
}

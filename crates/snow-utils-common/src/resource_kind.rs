//! Resources an external volume run creates
//!
//! Teardown must follow dependency order: the volume references the IAM
//! role, the role carries the policy, and the bucket goes last because it
//! may still hold data. Variants are declared in that order.

/// Types of resources an external volume run creates
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    /// Snowflake external volume (references the IAM role)
    ExternalVolume,
    /// IAM role trusted by Snowflake
    IamRole,
    /// Customer-managed IAM policy attached to the role
    IamPolicy,
    /// S3 bucket backing the external volume
    S3Bucket,
}

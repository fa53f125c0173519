//! External volumes backed by S3 with a cross-account IAM role

pub mod config;
pub mod documents;
pub mod plan;
pub mod snowflake;
pub mod workflow;

pub use config::{ExternalVolumeConfig, VolumeOverrides, resolve_prefix};
pub use snowflake::{StorageIdentity, Verification, VolumeReconciler};
pub use workflow::{
    CleanupResult, CreateFailed, CreateOptions, CreateOutcome, CreatedResource, DeleteOutcome,
    VolumeState, VolumeWorkflow,
};

//! snow-utils-common - Shared types and utilities
//!
//! Types shared by the network, external volume, PAT and setup-check tools.
//! Nothing here talks to Snowflake or AWS.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`exit_code`]: Process exit codes
//! - [`mask`]: Redaction of account ids, IPs, ARNs and external ids
//! - [`naming`]: AWS and Snowflake name normalisation
//! - [`network`]: Network rule modes, types and their compatibility table
//! - [`resource_kind`]: Managed resource types and teardown order
//! - [`result`]: JSON result document
//! - [`tags`]: AWS resource tag constants

pub mod defaults;
pub mod exit_code;
pub mod mask;
pub mod naming;
pub mod network;
pub mod resource_kind;
pub mod result;
pub mod tags;

// Re-export commonly used types
pub use exit_code::ExitCode;
pub use mask::{MaskKind, Masker};
pub use network::{InvalidModeType, NetworkMode, NetworkType, validate_mode_type};
pub use resource_kind::ResourceKind;
pub use result::{ProvisioningResult, ProvisioningStatus};

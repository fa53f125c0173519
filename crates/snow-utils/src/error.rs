//! Precondition errors raised before any external call is made
//!
//! These map to exit code 1; everything else that escapes a command maps
//! to exit code 2.

use snow_utils_common::NetworkType;
use thiserror::Error;

/// A required input is missing or inconsistent
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// A required value was not supplied by flag or environment
    #[error("{0} is required")]
    Missing(&'static str),

    /// Presets only produce IPv4 CIDRs
    #[error("IP presets (--allow-local, --allow-gh, --allow-google) require type IPV4, got {0}")]
    PresetsRequireIpv4(NetworkType),

    /// Rule would be created with an empty VALUE_LIST
    #[error("No values for network rule '{0}': pass --values or enable a preset")]
    NoValues(String),

    /// Rotation requested for a PAT that does not exist
    #[error("PAT '{pat}' not found for user '{user}'")]
    PatNotFound { user: String, pat: String },

    /// No token could be found for verification
    #[error("No token available: pass --password, set SA_PAT, or create a PAT first")]
    MissingToken,

    /// Either a bucket or an explicit role/volume pair is needed
    #[error("Provide --bucket, or both --role-name and --volume-name")]
    MissingVolumeTarget,

    /// User answered no at a confirmation prompt
    #[error("Aborted")]
    Declined,

    /// Destructive action without a terminal to confirm on
    #[error("Confirmation required but stdin is not a terminal; re-run with --yes")]
    NeedsConfirmation,
}

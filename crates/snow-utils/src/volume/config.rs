//! Resolved names for one external volume and its AWS resources

use crate::config::current_username;
use serde::Serialize;
use snow_utils_common::naming::{
    NamingError, generate_external_id, to_aws_name, to_sql_identifier, validate_bucket_name,
};

/// Explicit names that replace the derived defaults
#[derive(Debug, Clone, Default)]
pub struct VolumeOverrides {
    pub role_name: Option<String>,
    pub policy_name: Option<String>,
    pub volume_name: Option<String>,
    pub storage_location: Option<String>,
    pub external_id: Option<String>,
}

/// Every name the create, delete and verify flows act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalVolumeConfig {
    pub bucket_name: String,
    pub role_name: String,
    pub policy_name: String,
    pub volume_name: String,
    pub storage_location_name: String,
    pub external_id: String,
    pub region: String,
    pub allow_writes: bool,
}

impl ExternalVolumeConfig {
    /// Derive names from a base bucket name
    ///
    /// AWS names are lowercased and hyphenated, the volume name is an
    /// uppercase SQL identifier; all carry `prefix` unless overridden.
    pub fn resolve(
        bucket: &str,
        prefix: Option<&str>,
        region: &str,
        allow_writes: bool,
        overrides: VolumeOverrides,
    ) -> Result<Self, NamingError> {
        validate_bucket_name(bucket)?;
        Ok(Self {
            bucket_name: to_aws_name(bucket, prefix),
            role_name: overrides
                .role_name
                .unwrap_or_else(|| to_aws_name(&format!("{bucket}-snowflake-role"), prefix)),
            policy_name: overrides
                .policy_name
                .unwrap_or_else(|| to_aws_name(&format!("{bucket}-snowflake-policy"), prefix)),
            volume_name: overrides
                .volume_name
                .unwrap_or_else(|| to_sql_identifier(&format!("{bucket}_external_volume"), prefix)),
            storage_location_name: overrides
                .storage_location
                .unwrap_or_else(|| to_aws_name(&format!("{bucket}-s3-{region}"), prefix)),
            external_id: overrides
                .external_id
                .unwrap_or_else(|| generate_external_id(bucket, prefix)),
            region: region.to_string(),
            allow_writes,
        })
    }
}

/// Prefix for derived names: none with `--no-prefix`, else the explicit
/// value, else the OS user name
pub fn resolve_prefix(no_prefix: bool, explicit: Option<String>) -> Option<String> {
    if no_prefix {
        return None;
    }
    explicit.filter(|p| !p.trim().is_empty()).or_else(current_username)
}

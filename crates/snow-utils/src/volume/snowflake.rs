//! Snowflake side of an external volume: create, describe, verify, drop

use super::config::ExternalVolumeConfig;
use crate::snow::{Check, Row, SqlExecutor, quote, row_str};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

const VERIFY_FUNCTION: &str = "SYSTEM$VERIFY_EXTERNAL_VOLUME";

/// Identity Snowflake assigned to a volume's storage location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageIdentity {
    pub iam_user_arn: String,
    pub external_id: Option<String>,
}

/// Result of `SYSTEM$VERIFY_EXTERNAL_VOLUME`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_location_selection_result: Option<String>,
    /// Raw result when it was not JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

pub fn create_volume_sql(config: &ExternalVolumeConfig, role_arn: &str, force: bool) -> String {
    let create = if force {
        "CREATE OR REPLACE EXTERNAL VOLUME"
    } else {
        "CREATE EXTERNAL VOLUME IF NOT EXISTS"
    };
    let allow_writes = if config.allow_writes { "TRUE" } else { "FALSE" };
    format!(
        "{create} {volume}
    STORAGE_LOCATIONS = (
        (
            NAME = {location}
            STORAGE_PROVIDER = 'S3'
            STORAGE_BASE_URL = {url}
            STORAGE_AWS_ROLE_ARN = {role_arn}
            STORAGE_AWS_EXTERNAL_ID = {external_id}
        )
    )
    ALLOW_WRITES = {allow_writes};",
        volume = config.volume_name,
        location = quote(&config.storage_location_name),
        url = quote(&format!("s3://{}/", config.bucket_name)),
        role_arn = quote(role_arn),
        external_id = quote(&config.external_id),
    )
}

pub fn describe_volume_sql(volume: &str) -> String {
    format!("DESC EXTERNAL VOLUME {volume}")
}

pub fn verify_volume_sql(volume: &str) -> String {
    format!("SELECT {VERIFY_FUNCTION}({})", quote(volume))
}

pub fn drop_volume_sql(volume: &str) -> String {
    format!("DROP EXTERNAL VOLUME IF EXISTS {volume};")
}

pub fn show_volume_sql(volume: &str) -> String {
    format!("SHOW EXTERNAL VOLUMES LIKE {}", quote(volume))
}

/// Extract the storage identity from `DESC EXTERNAL VOLUME` rows
///
/// Storage locations are nested JSON in `property_value`; rows whose JSON
/// does not parse are skipped.
pub fn parse_storage_identity(rows: &[Row]) -> Result<StorageIdentity> {
    let mut iam_user_arn = None;
    let mut external_id = None;

    for row in rows {
        let parent = row_str(row, "parent_property").unwrap_or_default();
        let property = row_str(row, "property").unwrap_or_default();
        if parent != "STORAGE_LOCATIONS" || !property.starts_with("STORAGE_LOCATION_") {
            continue;
        }
        let Some(value) = row_str(row, "property_value") else {
            continue;
        };
        let location: Value = match serde_json::from_str(value) {
            Ok(v) => v,
            Err(e) => {
                debug!(property = %property, error = %e, "Skipping unparseable storage location");
                continue;
            }
        };
        if let Some(arn) = location.get("STORAGE_AWS_IAM_USER_ARN").and_then(Value::as_str) {
            iam_user_arn = Some(arn.to_string());
        }
        if let Some(id) = location.get("STORAGE_AWS_EXTERNAL_ID").and_then(Value::as_str) {
            external_id = Some(id.to_string());
        }
    }

    match iam_user_arn {
        Some(iam_user_arn) => Ok(StorageIdentity {
            iam_user_arn,
            external_id,
        }),
        None => bail!("Could not find STORAGE_AWS_IAM_USER_ARN in external volume description"),
    }
}

/// Extract the verification result from the first row
pub fn parse_verification(rows: &[Row]) -> Option<Verification> {
    let row = rows.first()?;
    let raw = row
        .iter()
        .find(|(k, _)| k.to_uppercase().contains(VERIFY_FUNCTION))
        .and_then(|(_, v)| v.as_str())?;

    match serde_json::from_str::<Value>(raw) {
        Ok(doc) => Some(Verification {
            success: doc.get("success").and_then(Value::as_bool).unwrap_or(false),
            storage_location_selection_result: doc
                .get("storageLocationSelectionResult")
                .and_then(Value::as_str)
                .map(str::to_string),
            raw: None,
        }),
        Err(_) => Some(Verification {
            success: raw.to_lowercase().contains("success"),
            storage_location_selection_result: None,
            raw: Some(raw.to_string()),
        }),
    }
}

/// External volume operations through a [`SqlExecutor`]
pub struct VolumeReconciler<'a, E> {
    exec: &'a E,
}

impl<'a, E: SqlExecutor> VolumeReconciler<'a, E> {
    pub fn new(exec: &'a E) -> Self {
        Self { exec }
    }

    pub async fn exists(&self, volume: &str) -> Result<bool> {
        let rows = self.exec.query(&show_volume_sql(volume), Check::Lenient).await?;
        Ok(rows
            .iter()
            .any(|r| row_str(r, "name").is_some_and(|n| n.eq_ignore_ascii_case(volume))))
    }

    pub async fn create(&self, config: &ExternalVolumeConfig, role_arn: &str, force: bool) -> Result<()> {
        self.exec
            .run_script(&create_volume_sql(config, role_arn, force), Check::Strict)
            .await
            .with_context(|| format!("Failed to create external volume {}", config.volume_name))?;
        info!(volume = %config.volume_name, "External volume created");
        Ok(())
    }

    pub async fn describe(&self, volume: &str) -> Result<StorageIdentity> {
        let rows = self
            .exec
            .query(&describe_volume_sql(volume), Check::Strict)
            .await
            .with_context(|| {
                format!("Failed to describe external volume '{volume}'. Verify the volume exists and you have access")
            })?;
        if rows.is_empty() {
            bail!("No data returned when describing external volume '{volume}'");
        }
        parse_storage_identity(&rows)
    }

    /// Raw `DESC EXTERNAL VOLUME` rows
    pub async fn describe_rows(&self, volume: &str) -> Result<Vec<Row>> {
        Ok(self.exec.query(&describe_volume_sql(volume), Check::Strict).await?)
    }

    /// `None` when Snowflake returned nothing usable
    pub async fn verify(&self, volume: &str) -> Result<Option<Verification>> {
        let rows = self.exec.query(&verify_volume_sql(volume), Check::Strict).await?;
        Ok(parse_verification(&rows))
    }

    pub async fn drop(&self, volume: &str) -> Result<()> {
        self.exec.run_script(&drop_volume_sql(volume), Check::Strict).await?;
        info!(volume = %volume, "External volume dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snow::parse_rows;
    use crate::volume::config::VolumeOverrides;
    use serde_json::json;

    fn config() -> ExternalVolumeConfig {
        ExternalVolumeConfig::resolve(
            "lake",
            None,
            "us-west-2",
            true,
            VolumeOverrides {
                external_id: Some("LAKE_EXT_ABCD1234".into()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn rows(value: Value) -> Vec<Row> {
        parse_rows(&value.to_string())
    }

    #[test]
    fn test_create_volume_sql() {
        let sql = create_volume_sql(&config(), "arn:aws:iam::123456789012:role/lake-snowflake-role", false);
        assert!(sql.starts_with("CREATE EXTERNAL VOLUME IF NOT EXISTS LAKE_EXTERNAL_VOLUME\n"));
        assert!(sql.contains("NAME = 'lake-s3-us-west-2'"));
        assert!(sql.contains("STORAGE_BASE_URL = 's3://lake/'"));
        assert!(sql.contains("STORAGE_AWS_EXTERNAL_ID = 'LAKE_EXT_ABCD1234'"));
        assert!(sql.ends_with("ALLOW_WRITES = TRUE;"));

        let read_only = ExternalVolumeConfig {
            allow_writes: false,
            ..config()
        };
        let sql = create_volume_sql(&read_only, "arn", true);
        assert!(sql.starts_with("CREATE OR REPLACE EXTERNAL VOLUME"));
        assert!(sql.ends_with("ALLOW_WRITES = FALSE;"));
    }

    #[test]
    fn test_parse_storage_identity() {
        let location = json!({
            "NAME": "lake-s3-us-west-2",
            "STORAGE_AWS_IAM_USER_ARN": "arn:aws:iam::999999999999:user/abc",
            "STORAGE_AWS_EXTERNAL_ID": "LAKE_EXT_ABCD1234",
        });
        let rows = rows(json!([
            {"parent_property": "", "property": "ALLOW_WRITES", "property_value": "true"},
            {"parent_property": "STORAGE_LOCATIONS", "property": "STORAGE_LOCATION_1", "property_value": location.to_string()},
            {"parent_property": "STORAGE_LOCATIONS", "property": "ACTIVE", "property_value": "lake-s3-us-west-2"},
        ]));
        let identity = parse_storage_identity(&rows).unwrap();
        assert_eq!(identity.iam_user_arn, "arn:aws:iam::999999999999:user/abc");
        assert_eq!(identity.external_id.as_deref(), Some("LAKE_EXT_ABCD1234"));
    }

    #[test]
    fn test_parse_storage_identity_skips_bad_json() {
        let rows = rows(json!([
            {"parent_property": "STORAGE_LOCATIONS", "property": "STORAGE_LOCATION_1", "property_value": "{not json"},
        ]));
        let err = parse_storage_identity(&rows).unwrap_err();
        assert!(err.to_string().contains("STORAGE_AWS_IAM_USER_ARN"));
    }

    #[test]
    fn test_parse_verification() {
        let result = json!({"success": true, "storageLocationSelectionResult": "PASSED"}).to_string();
        let parsed = parse_verification(&rows(json!([{"SYSTEM$VERIFY_EXTERNAL_VOLUME('LAKE_EXTERNAL_VOLUME')": result}])))
            .unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.storage_location_selection_result.as_deref(), Some("PASSED"));

        let raw = parse_verification(&rows(json!([{"system$verify_external_volume('v')": "not json"}]))).unwrap();
        assert!(!raw.success);
        assert_eq!(raw.raw.as_deref(), Some("not json"));

        assert!(parse_verification(&[]).is_none());
        assert!(parse_verification(&rows(json!([{"other": "x"}]))).is_none());
    }

    #[tokio::test]
    async fn test_exists_matches_name() {
        let exec = crate::testing::RecordingExecutor::new()
            .respond("SHOW EXTERNAL VOLUMES LIKE 'LAKE_EXTERNAL_VOLUME'", json!([{"name": "LAKE_EXTERNAL_VOLUME"}]));
        let volumes = VolumeReconciler::new(&exec);
        assert!(volumes.exists("LAKE_EXTERNAL_VOLUME").await.unwrap());
        assert!(!volumes.exists("OTHER").await.unwrap());
    }
}

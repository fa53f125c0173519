//! S3 bucket management for external volume storage

use super::context::AwsContext;
use super::error::{is_not_found, probe_result};
use crate::probe::Probe;
use anyhow::{Context, Result, bail};
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration, Delete,
    ObjectIdentifier, Tag, Tagging, VersioningConfiguration,
};
use snow_utils_common::tags;
use tracing::{debug, info};

/// DeleteObjects accepts at most this many keys per request
const DELETE_BATCH: usize = 1000;

/// S3 client for the external volume bucket
pub struct S3Client {
    client: Client,
    region: String,
    location: Option<BucketLocationConstraint>,
    prefix: Option<String>,
}

impl S3Client {
    /// Create an S3 client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
            region: ctx.region().to_string(),
            location: ctx.bucket_location(),
            prefix: None,
        }
    }

    /// Record the naming prefix in bucket tags
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// HEAD the bucket: 404 is NotFound, 403 is Denied
    pub async fn probe_bucket(&self, bucket: &str) -> Result<Probe<()>> {
        let probe = probe_result(self.client.head_bucket().bucket(bucket).send().await)
            .context("Failed to check bucket")?;
        Ok(probe.map(|_| ()))
    }

    /// Create a versioned bucket unless we already own one with this name
    ///
    /// Returns `true` when this call created the bucket.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<bool> {
        match self.probe_bucket(bucket).await? {
            Probe::Found(()) => {
                info!(bucket = %bucket, "S3 bucket already exists");
                return Ok(false);
            }
            Probe::Denied(reason) => bail!(
                "Bucket '{}' exists but you don't have access to it ({}). Choose another name.",
                bucket,
                reason
            ),
            Probe::NotFound => {}
        }

        info!(bucket = %bucket, region = %self.region, "Creating S3 bucket");

        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(location) = self.location.clone() {
            let create_config = CreateBucketConfiguration::builder()
                .location_constraint(location)
                .build();
            request = request.create_bucket_configuration(create_config);
        }
        request.send().await.context("Failed to create bucket")?;

        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .context("Failed to enable bucket versioning")?;

        let tag_set = tags::standard_tags(self.prefix.as_deref())
            .into_iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|e| anyhow::anyhow!("Failed to build S3 tag: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;
        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(
                Tagging::builder()
                    .set_tag_set(Some(tag_set))
                    .build()
                    .map_err(|e| anyhow::anyhow!("Failed to build bucket tagging: {}", e))?,
            )
            .send()
            .await
            .context("Failed to tag bucket")?;

        debug!(bucket = %bucket, "S3 bucket created with versioning enabled");
        Ok(true)
    }

    /// Delete every object version and delete marker in the bucket
    async fn empty_bucket(&self, bucket: &str) -> Result<usize> {
        let mut deleted = 0;
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.clone())
                .set_version_id_marker(version_marker.clone())
                .send()
                .await
                .context("Failed to list object versions")?;

            let versions = response
                .versions()
                .iter()
                .filter_map(|v| v.key().map(|k| (k, v.version_id())));
            let markers = response
                .delete_markers()
                .iter()
                .filter_map(|m| m.key().map(|k| (k, m.version_id())));

            let ids = versions
                .chain(markers)
                .map(|(key, version)| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .set_version_id(version.map(str::to_string))
                        .build()
                        .map_err(|e| anyhow::anyhow!("Failed to build object identifier: {}", e))
                })
                .collect::<Result<Vec<_>>>()?;

            for batch in ids.chunks(DELETE_BATCH) {
                debug!(bucket = %bucket, count = batch.len(), "Deleting object versions");
                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(
                        Delete::builder()
                            .set_objects(Some(batch.to_vec()))
                            .quiet(true)
                            .build()
                            .map_err(|e| anyhow::anyhow!("Failed to build delete request: {}", e))?,
                    )
                    .send()
                    .await
                    .context("Failed to delete object versions")?;
                deleted += batch.len();
            }

            if response.is_truncated() == Some(true) {
                key_marker = response.next_key_marker().map(str::to_string);
                version_marker = response.next_version_id_marker().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(deleted)
    }

    /// Delete a bucket; with `force`, empty it of all versions first
    ///
    /// A missing bucket is not an error.
    pub async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<()> {
        info!(bucket = %bucket, force, "Deleting S3 bucket");

        if force {
            match self.empty_bucket(bucket).await {
                Ok(n) => debug!(bucket = %bucket, deleted = n, "Bucket emptied"),
                Err(e) => {
                    if let Some(sdk) = e.downcast_ref::<aws_sdk_s3::error::SdkError<
                        aws_sdk_s3::operation::list_object_versions::ListObjectVersionsError,
                    >>() {
                        if is_not_found(sdk) {
                            debug!(bucket = %bucket, "Bucket already deleted");
                            return Ok(());
                        }
                    }
                    return Err(e);
                }
            }
        }

        match self.client.delete_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket = %bucket, "S3 bucket deleted");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!(bucket = %bucket, "Bucket already deleted");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to delete bucket"),
        }
    }
}

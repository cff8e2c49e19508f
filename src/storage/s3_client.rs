//! S3-compatible object store client
//!
//! Wraps the AWS SDK for S3 so the rest of the crate never touches
//! `aws_sdk_s3` types directly. Works against MinIO, Cloudflare R2,
//! Backblaze B2, or real S3 depending on `StorageConfig`.

use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use aws_types::region::Region;

use crate::config::StorageConfig;
use crate::error::{Result, ShareError};

use super::types::ObjectMetadata;

#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let region_provider =
            RegionProviderChain::first_try(Region::new(config.region.clone()))
                .or_default_provider();
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .endpoint_url(&config.endpoint)
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "cryptshare-config",
            ));
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }

    /// Store an object with an explicit content type. `user_metadata` is
    /// attached for diagnostics only and is never interpreted by the server.
    pub async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        user_metadata: Option<(&str, &str)>,
    ) -> Result<()> {
        let len = data.len() as i64;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(len)
            .body(ByteStream::from(data));

        if let Some((meta_key, meta_value)) = user_metadata {
            request = request.metadata(meta_key, meta_value);
        }

        request
            .send()
            .await
            .map_err(|e| ShareError::Internal(format!("s3 put_object {key}: {e}")))?;
        Ok(())
    }

    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(aws_sdk_s3::error::SdkError::ServiceError(e)) if e.err().is_not_found() => {
                Ok(false)
            }
            Err(e) => Err(ShareError::Internal(format!("s3 head_object {key}: {e}"))),
        }
    }

    pub async fn head_object(&self, key: &str) -> Result<ObjectMetadata> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ShareError::Internal(format!("s3 head_object {key}: {e}")))?;

        Ok(ObjectMetadata {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0),
            last_modified: output
                .last_modified()
                .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0)),
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(str::to_string),
        })
    }

    /// Stream an object's bytes to the caller. Verifies existence first so
    /// the reader never starts on a missing key (`DownloadChunk` step 3).
    pub async fn get_object_stream(&self, key: &str) -> Result<ByteStream> {
        if !self.object_exists(key).await? {
            return Err(ShareError::NotFound);
        }

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ShareError::Internal(format!("s3 get_object {key}: {e}")))?;

        Ok(output.body)
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ShareError::Internal(format!("s3 delete_object {key}: {e}")))?;
        Ok(())
    }

    /// Bulk delete, chunked to stay under S3's 1000-object-per-request cap.
    /// Individual failures are reported in the returned list of keys that
    /// could not be confirmed deleted; the caller decides whether to retry
    /// or record an orphan.
    pub async fn delete_objects(&self, keys: &[String]) -> Result<Vec<String>> {
        let mut failed = Vec::new();

        for batch in keys.chunks(1000) {
            let objects: Vec<ObjectIdentifier> = batch
                .iter()
                .filter_map(|key| ObjectIdentifier::builder().key(key).build().ok())
                .collect();

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| ShareError::Internal(format!("build delete batch: {e}")))?;

            match self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
            {
                Ok(output) => {
                    for err in output.errors() {
                        if let Some(key) = err.key() {
                            failed.push(key.to_string());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "s3 bulk delete request failed");
                    failed.extend(batch.iter().cloned());
                }
            }
        }

        Ok(failed)
    }
}

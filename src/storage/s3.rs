// mongo-blob-backup/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::{BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{BlobEntry, BlobStore};
use crate::config::{Credentials, DEFAULT_S3_REGION};
use crate::errors::{AppError, Result};

/// S3-compatible object storage (AWS, DigitalOcean Spaces, MinIO).
///
/// The container is the bucket; the account name and key are the access key
/// id and secret.
pub struct S3BlobStore {
    credentials: Credentials,
    endpoint: Option<String>,
    region: String,
}

fn storage_error<E>(what: String, err: E) -> AppError
where
    E: std::error::Error,
{
    AppError::Storage(format!("{}: {}", what, DisplayErrorContext(err)))
}

impl S3BlobStore {
    pub fn new(credentials: Credentials, endpoint: Option<String>, region: String) -> Self {
        S3BlobStore {
            credentials,
            endpoint,
            region,
        }
    }

    async fn client(&self) -> Result<s3::Client> {
        let (access_key_id, secret_access_key) = self.credentials.require()?;
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                access_key_id,
                secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        Ok(s3::Client::new(&sdk_config))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn ensure_container(&self, container: &str, public_read: bool) -> Result<()> {
        let client = self.client().await?;
        if client.head_bucket().bucket(container).send().await.is_ok() {
            debug!("Bucket {} already exists", container);
            return Ok(());
        }

        let mut request = client.create_bucket().bucket(container);
        if public_read {
            request = request.acl(BucketCannedAcl::PublicRead);
        }
        if self.region != DEFAULT_S3_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!("Created bucket {} (public read: {})", container, public_read);
                Ok(())
            }
            Err(e) => {
                let already_ours = e
                    .as_service_error()
                    .map(|se| se.is_bucket_already_owned_by_you())
                    .unwrap_or(false);
                if already_ours {
                    Ok(())
                } else {
                    Err(storage_error(format!("Failed to create bucket {}", container), e))
                }
            }
        }
    }

    async fn upload(&self, container: &str, blob_name: &str, source: &Path) -> Result<()> {
        let client = self.client().await?;
        let body = ByteStream::from_path(source).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create ByteStream from file {}: {}",
                source.display(),
                e
            ))
        })?;

        client
            .put_object()
            .bucket(container)
            .key(blob_name)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                storage_error(
                    format!(
                        "Failed to upload {} to bucket {} with key {}",
                        source.display(),
                        container,
                        blob_name
                    ),
                    e,
                )
            })?;
        Ok(())
    }

    async fn list(&self, container: &str) -> Result<Vec<BlobEntry>> {
        let client = self.client().await?;
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = client
                .list_objects_v2()
                .bucket(container)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| storage_error(format!("Failed to list bucket {}", container), e))?;

            entries.extend(page.contents().iter().filter_map(|object| {
                object.key().map(|key| BlobEntry {
                    name: key.to_string(),
                    size: object.size().and_then(|size| u64::try_from(size).ok()),
                })
            }));

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        Ok(entries)
    }

    async fn download(&self, container: &str, blob_name: &str, destination: &Path) -> Result<()> {
        let client = self.client().await?;
        let mut object = client
            .get_object()
            .bucket(container)
            .key(blob_name)
            .send()
            .await
            .map_err(|e| {
                storage_error(format!("Failed to get object s3://{}/{}", container, blob_name), e)
            })?;

        let mut output_file = File::create(destination).await?;
        let mut total_bytes_downloaded = 0;
        while let Some(bytes_chunk) = object.body.try_next().await.map_err(|e| {
            AppError::Storage(format!("Failed while downloading {}: {}", blob_name, e))
        })? {
            output_file.write_all(&bytes_chunk).await?;
            total_bytes_downloaded += bytes_chunk.len();
        }
        output_file.flush().await?;

        debug!(
            "Downloaded {} bytes from s3://{}/{} to {}",
            total_bytes_downloaded,
            container,
            blob_name,
            destination.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_request() {
        let store = S3BlobStore::new(
            Credentials {
                account: Some("AKIAEXAMPLE".to_string()),
                key: None,
            },
            Some("http://127.0.0.1:9".to_string()),
            DEFAULT_S3_REGION.to_string(),
        );
        let err = store.list("mbtafyi").await.unwrap_err();
        assert!(matches!(err, AppError::MissingCredentials("account key")));
    }
}

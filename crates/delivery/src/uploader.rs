//! Remote blob storage

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

/// Uploads one artifact to remote storage
///
/// The retry queue treats every error the same way; there is no transient
/// versus permanent distinction at this seam.
#[async_trait]
pub trait Uploader: Send + Sync + 'static {
    async fn upload(&self, artifact: &Path) -> Result<()>;
}

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

/// S3 uploader storing artifacts under their base file name
pub struct S3Uploader {
    client: Client,
    bucket: String,
}

impl S3Uploader {
    pub async fn new(settings: &S3Settings) -> Result<Self> {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "rwmod-monitor",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(&settings.endpoint)
            .credentials_provider(credentials)
            .load()
            .await;

        // Most self-hosted S3 services do not support virtual-hosted buckets
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            bucket: settings.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Object key for an artifact: its base file name
pub fn object_key(artifact: &Path) -> Result<String> {
    artifact
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| anyhow!("Artifact has no usable file name: {}", artifact.display()))
}

#[async_trait]
impl Uploader for S3Uploader {
    async fn upload(&self, artifact: &Path) -> Result<()> {
        let key = object_key(artifact)?;
        let body = ByteStream::from_path(artifact)
            .await
            .with_context(|| format!("Failed to open file: {}", artifact.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to upload {} to S3: {}", key, DisplayErrorContext(&e)))?;

        Ok(())
    }
}

/// 署名付きアップロードURLの発行
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::presigning::PresigningConfig;
use thiserror::Error;

use crate::domain::AppError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignerError {
    #[error("Invalid presigning config: {0}")]
    InvalidConfig(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),
}

impl From<SignerError> for AppError {
    fn from(err: SignerError) -> Self {
        AppError::internal(err.to_string())
    }
}

/// 署名対象のPUTリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub content_length: u64,
    pub expires_in: Duration,
}

#[async_trait]
pub trait UploadSigner: Send + Sync {
    /// PUT用の署名付きURLを発行
    async fn presign_put(&self, target: &UploadTarget) -> Result<String, SignerError>;
}

/// UploadSignerのS3実装
#[derive(Debug, Clone)]
pub struct S3UploadSigner {
    client: S3Client,
}

impl S3UploadSigner {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UploadSigner for S3UploadSigner {
    async fn presign_put(&self, target: &UploadTarget) -> Result<String, SignerError> {
        let config = PresigningConfig::expires_in(target.expires_in)
            .map_err(|e| SignerError::InvalidConfig(e.to_string()))?;
        let content_length = i64::try_from(target.content_length)
            .map_err(|e| SignerError::InvalidConfig(e.to_string()))?;

        // Content-Type/Content-Lengthは署名に含まれ、アップロード時に一致が必要
        let presigned = self
            .client
            .put_object()
            .bucket(&target.bucket)
            .key(&target.key)
            .content_type(&target.content_type)
            .content_length(content_length)
            .presigned(config)
            .await
            .map_err(|e| SignerError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

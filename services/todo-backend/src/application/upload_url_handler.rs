/// アップロードURL発行ハンドラー
///
/// クエリの `contentType` / `contentLength` を検証し、
/// ユーザー配下のキーに対する署名付きPUT URLを返す。
use std::time::Duration;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{ApiRequest, ApiResponse, HandlerOutput};
use crate::domain::AppError;
use crate::infrastructure::{UploadConfig, UploadSigner, UploadTarget};

pub struct UploadUrlHandler<U>
where
    U: UploadSigner,
{
    signer: U,
    config: UploadConfig,
}

impl<U> UploadUrlHandler<U>
where
    U: UploadSigner,
{
    pub fn new(signer: U, config: UploadConfig) -> Self {
        Self { signer, config }
    }

    pub async fn handle(&self, request: ApiRequest) -> Result<HandlerOutput, AppError> {
        let user = request.user_info()?;

        let content_type = request
            .query_parameters
            .get("contentType")
            .map(|s| s.trim())
            .filter(|t| self.config.allowed_types.iter().any(|allowed| allowed == t))
            .ok_or_else(|| {
                AppError::bad_request(format!(
                    "Invalid media type. Allowed types: {}.",
                    self.config.allowed_types.join(", ")
                ))
            })?
            .to_string();

        let content_length = request
            .query_parameters
            .get("contentLength")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|size| (1..=self.config.max_size).contains(size))
            .ok_or_else(|| {
                AppError::bad_request(format!(
                    "File size must be between 1 byte and {}MB.",
                    self.config.max_size as f64 / (1024.0 * 1024.0)
                ))
            })?;

        let key = object_key(&user.user_id, &content_type);
        let target = UploadTarget {
            bucket: self.config.bucket.clone(),
            key: key.clone(),
            content_type,
            content_length,
            expires_in: Duration::from_secs(self.config.expires_in_secs),
        };
        let upload_url = self.signer.presign_put(&target).await?;
        info!(user_id = %user.user_id, key = %key, "upload url issued");

        Ok(HandlerOutput::Response(ApiResponse::created(json!({
            "key": key,
            "uploadUrl": upload_url,
            "message": "Upload url generated successfully",
        }))))
    }
}

/// `users/<userId>/<uuid>.<ext>`（拡張子はMIMEのサブタイプ、無ければ `jpg`）
pub fn object_key(user_id: &str, content_type: &str) -> String {
    let extension = content_type
        .split_once('/')
        .map(|(_, subtype)| subtype)
        .filter(|s| !s.is_empty())
        .unwrap_or("jpg");
    format!("users/{}/{}.{}", user_id, Uuid::new_v4(), extension)
}

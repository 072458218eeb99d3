//! Cognitoユーザープール操作
//!
//! 確認後トリガーで使用する管理者操作を提供する。
//! - カスタム属性 `custom:status` の更新
//! - グループへの追加

use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use thiserror::Error;
use tracing::info;

use crate::domain::AppError;

/// ステータスを保持するカスタム属性名
pub const STATUS_ATTRIBUTE: &str = "custom:status";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentityError {
    #[error("Cognito APIエラー: {0}")]
    AwsSdkError(String),

    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        AppError::internal(err.to_string())
    }
}

/// ユーザープール操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait IdentityOps: Send + Sync {
    /// `custom:status` を設定する
    async fn set_user_status(
        &self,
        user_pool_id: &str,
        username: &str,
        status: &str,
    ) -> Result<(), IdentityError>;

    /// ユーザーをグループに追加する
    async fn add_user_to_group(
        &self,
        user_pool_id: &str,
        username: &str,
        group: &str,
    ) -> Result<(), IdentityError>;
}

/// IdentityOpsのCognito実装
#[derive(Debug, Clone)]
pub struct CognitoIdentityOps {
    client: CognitoClient,
}

impl CognitoIdentityOps {
    pub fn new(client: CognitoClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityOps for CognitoIdentityOps {
    async fn set_user_status(
        &self,
        user_pool_id: &str,
        username: &str,
        status: &str,
    ) -> Result<(), IdentityError> {
        let attribute = AttributeType::builder()
            .name(STATUS_ATTRIBUTE)
            .value(status)
            .build()
            .map_err(|e| IdentityError::InvalidAttribute(e.to_string()))?;

        self.client
            .admin_update_user_attributes()
            .user_pool_id(user_pool_id)
            .username(username)
            .user_attributes(attribute)
            .send()
            .await
            .map_err(|e| IdentityError::AwsSdkError(e.into_service_error().to_string()))?;

        info!(username = %username, status = %status, "ユーザーステータスを更新");
        Ok(())
    }

    async fn add_user_to_group(
        &self,
        user_pool_id: &str,
        username: &str,
        group: &str,
    ) -> Result<(), IdentityError> {
        self.client
            .admin_add_user_to_group()
            .user_pool_id(user_pool_id)
            .username(username)
            .group_name(group)
            .send()
            .await
            .map_err(|e| IdentityError::AwsSdkError(e.into_service_error().to_string()))?;

        info!(username = %username, group = %group, "ユーザーをグループに追加");
        Ok(())
    }
}

//! DB操作ゲートウェイのクライアント
//!
//! CRUD関数・確認後トリガーはストレージに直接触れず、
//! このクライアント経由でDB操作ゲートウェイにペイロードを送る。
//! - 本番: ゲートウェイLambdaの同期呼び出し（`LambdaDbClient`）
//! - テスト: ディスパッチャーをプロセス内で直接呼び出す

use async_trait::async_trait;
use aws_sdk_lambda::Client as LambdaClient;
use aws_sdk_lambda::primitives::Blob;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use super::config::{load_aws_config, ConfigError, DispatcherConfig};
use crate::domain::{AppError, DbPayload};

/// ゲートウェイ呼び出しのエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DbClientError {
    /// Invoke API自体の失敗
    #[error("Invoke failed: {0}")]
    InvokeFailed(String),

    /// 関数内で未処理のエラーが発生した
    #[error("Function error ({error_type}): {message}")]
    FunctionError { error_type: String, message: String },

    /// 応答ペイロードがJSONとして解釈できない
    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),
}

impl From<DbClientError> for AppError {
    fn from(err: DbClientError) -> Self {
        AppError::internal(err.to_string())
    }
}

/// DB操作ゲートウェイ呼び出しの抽象化
#[async_trait]
pub trait DbClient: Send + Sync {
    /// ペイロードを送信し、ゲートウェイの結果を返す
    ///
    /// # 戻り値
    /// * 成功時は`Ok(Value)`（get → `{item}`, update → `{attributes}` など）
    /// * 失敗時はゲートウェイが返した構造化エラーを復元した`Err(AppError)`
    async fn send(&self, payload: &DbPayload) -> Result<Value, AppError>;
}

/// ゲートウェイLambdaを同期呼び出しするクライアント
#[derive(Debug, Clone)]
pub struct LambdaDbClient {
    client: LambdaClient,
    function_name: String,
}

impl LambdaDbClient {
    pub fn new(client: LambdaClient, function_name: impl Into<String>) -> Self {
        Self {
            client,
            function_name: function_name.into(),
        }
    }

    /// `DB_LAMBDA_NAME` と共通AWS設定から作成
    pub async fn from_env() -> Result<Self, ConfigError> {
        let config = DispatcherConfig::from_env()?;
        let aws_config = load_aws_config().await;
        Ok(Self::new(LambdaClient::new(&aws_config), config.function_name))
    }

    /// 呼び出し結果をゲートウェイの結果またはエラーに変換
    ///
    /// ゲートウェイは失敗時もエラーエンベロープを正常な戻り値として返すので、
    /// `success: false` の値はAppErrorに復元する。
    pub fn decode_response(function_error: Option<&str>, payload: &[u8]) -> Result<Value, AppError> {
        let value: Value = if payload.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(payload)
                .map_err(|e| DbClientError::InvalidResponse(e.to_string()))?
        };

        if let Some(error_type) = function_error {
            let message = value
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(DbClientError::FunctionError {
                error_type: error_type.to_string(),
                message,
            }
            .into());
        }

        match AppError::from_envelope(&value) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl DbClient for LambdaDbClient {
    async fn send(&self, payload: &DbPayload) -> Result<Value, AppError> {
        let body = serde_json::to_vec(&json!({ "payload": payload }))
            .map_err(|e| AppError::internal(e.to_string()))?;

        debug!(
            function_name = %self.function_name,
            table = %payload.table,
            action = payload.operation.action(),
            "DB操作ゲートウェイを呼び出し"
        );

        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .payload(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                let err = DbClientError::InvokeFailed(e.into_service_error().to_string());
                error!(function_name = %self.function_name, error = %err, "ゲートウェイ呼び出し失敗");
                err
            })?;

        let bytes = output.payload().map(|b| b.as_ref()).unwrap_or_default();
        Self::decode_response(output.function_error(), bytes)
    }
}

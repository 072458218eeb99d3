/// UserCreatedイベントの発行（EventBridge）
///
/// DB操作ゲートウェイはこのイベントをルール経由で受け取り、
/// `User` テーブルへの `create` に変換する。
use async_trait::async_trait;
use aws_sdk_eventbridge::Client as EventBridgeClient;
use aws_sdk_eventbridge::types::PutEventsRequestEntry;
use thiserror::Error;
use tracing::info;

use crate::domain::{AppError, Record};

/// イベントのsource
pub const USER_EVENT_SOURCE: &str = "app.user";
/// イベントのdetail-type
pub const USER_CREATED_DETAIL_TYPE: &str = "UserCreated";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PublishError {
    #[error("EventBridge APIエラー: {0}")]
    AwsSdkError(String),

    /// PutEventsは成功したがエントリが拒否された
    #[error("Event rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        AppError::internal(err.to_string())
    }
}

#[async_trait]
pub trait UserEventPublisher: Send + Sync {
    /// 作成するユーザーレコードを `detail` としてUserCreatedを発行
    async fn publish_user_created(&self, user: &Record) -> Result<(), PublishError>;
}

#[derive(Debug, Clone)]
pub struct EventBridgePublisher {
    client: EventBridgeClient,
    event_bus_name: String,
}

impl EventBridgePublisher {
    pub fn new(client: EventBridgeClient, event_bus_name: impl Into<String>) -> Self {
        Self {
            client,
            event_bus_name: event_bus_name.into(),
        }
    }
}

#[async_trait]
impl UserEventPublisher for EventBridgePublisher {
    async fn publish_user_created(&self, user: &Record) -> Result<(), PublishError> {
        let detail =
            serde_json::to_string(user).map_err(|e| PublishError::SerializationError(e.to_string()))?;

        let entry = PutEventsRequestEntry::builder()
            .event_bus_name(&self.event_bus_name)
            .source(USER_EVENT_SOURCE)
            .detail_type(USER_CREATED_DETAIL_TYPE)
            .detail(detail)
            .build();

        let output = self
            .client
            .put_events()
            .entries(entry)
            .send()
            .await
            .map_err(|e| PublishError::AwsSdkError(e.into_service_error().to_string()))?;

        if let Some(code) = output.entries().iter().find_map(|e| e.error_code()) {
            let message = output
                .entries()
                .iter()
                .find_map(|e| e.error_message())
                .unwrap_or_default();
            return Err(PublishError::Rejected {
                code: code.to_string(),
                message: message.to_string(),
            });
        }

        info!(
            event_bus = %self.event_bus_name,
            detail_type = USER_CREATED_DETAIL_TYPE,
            "UserCreatedイベントを発行"
        );
        Ok(())
    }
}

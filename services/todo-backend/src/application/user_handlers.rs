/// ユーザープロフィールハンドラー
use super::{ApiRequest, ApiResponse, HandlerOutput};
use crate::domain::{AppError, DbOperation, DbPayload, Key, LogicalTable, UpdateUserInput};
use crate::infrastructure::DbClient;

pub struct UserHandlers<C>
where
    C: DbClient,
{
    db: C,
}

impl<C> UserHandlers<C>
where
    C: DbClient,
{
    pub fn new(db: C) -> Self {
        Self { db }
    }

    /// PUT /v0/users/me
    ///
    /// 認証済みユーザー自身のレコードのみ更新できる。
    pub async fn update_profile(&self, request: ApiRequest) -> Result<HandlerOutput, AppError> {
        let user = request.user_info()?;
        let body = request.json_body()?;
        let values = UpdateUserInput::parse(&body)?.into_values();
        if values.is_empty() {
            return Err(AppError::bad_request("At least one field must be provided"));
        }

        let payload = DbPayload::new(
            LogicalTable::User,
            DbOperation::update(Key::new(user.user_id), values),
        );
        let mut result = self.db.send(&payload).await?;
        let attributes = result
            .get_mut("attributes")
            .map(serde_json::Value::take)
            .unwrap_or_default();

        Ok(HandlerOutput::Response(ApiResponse::ok(attributes)))
    }
}

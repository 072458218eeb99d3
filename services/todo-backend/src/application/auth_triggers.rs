//! 認証トリガー
//!
//! Cognitoユーザープールのライフサイクルフック。
//! - サインアップ前: ユーザー属性の検証、自動確認の無効化
//! - 確認後: ステータス設定、グループ割り当て、ユーザーレコード作成

use serde_json::{json, Map, Value};
use tracing::info;

use super::HandlerOutput;
use crate::domain::schema::USER_STATUS_PENDING;
use crate::domain::{AppError, CreateUserInput, DbOperation, DbPayload, LogicalTable, Record};
use crate::infrastructure::{DbClient, IdentityConfig, IdentityOps, UserEventPublisher};

/// 管理者グループ
pub const ADMIN_GROUP: &str = "admin";
/// 一般ユーザーグループ
pub const USER_GROUP: &str = "user";

fn user_attributes(event: &Value) -> Result<&Map<String, Value>, AppError> {
    event
        .pointer("/request/userAttributes")
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::bad_request("Missing request.userAttributes"))
}

fn attribute<'a>(attrs: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    attrs.get(name).and_then(Value::as_str)
}

/// サインアップ前トリガー
///
/// `name` / `phone_number` / `email` をユーザー作成スキーマで検証し、
/// 自動確認・メール自動検証を無効にしたイベントを返す。
pub fn pre_signup(mut event: Value) -> Result<HandlerOutput, AppError> {
    let attrs = user_attributes(&event)?;

    let mut candidate = Map::new();
    for (attr, field) in [("name", "name"), ("phone_number", "phone"), ("email", "email")] {
        if let Some(value) = attrs.get(attr) {
            candidate.insert(field.to_string(), value.clone());
        }
    }
    CreateUserInput::parse(&Value::Object(candidate))?;

    let Some(obj) = event.as_object_mut() else {
        return Err(AppError::bad_request("Event must be a JSON object"));
    };
    let response = obj.entry("response").or_insert_with(|| json!({}));
    if !response.is_object() {
        *response = json!({});
    }
    response["autoConfirmUser"] = Value::Bool(false);
    response["autoVerifyEmail"] = Value::Bool(false);

    Ok(HandlerOutput::Data(event))
}

/// 作成したユーザーの通知先
pub enum UserSink<C, P>
where
    C: DbClient,
    P: UserEventPublisher,
{
    /// DB操作ゲートウェイに直接 `create` を送る
    Dispatcher(C),
    /// UserCreatedイベントを発行する（ゲートウェイはルール経由で受け取る）
    EventBus(P),
}

impl<C, P> UserSink<C, P>
where
    C: DbClient,
    P: UserEventPublisher,
{
    async fn emit(&self, user: Record) -> Result<(), AppError> {
        match self {
            UserSink::Dispatcher(db) => {
                let payload = DbPayload::new(LogicalTable::User, DbOperation::Create { item: user });
                db.send(&payload).await?;
            }
            UserSink::EventBus(publisher) => publisher.publish_user_created(&user).await?,
        }
        Ok(())
    }
}

/// 確認後トリガー
pub struct PostConfirmationHandler<I, C, P>
where
    I: IdentityOps,
    C: DbClient,
    P: UserEventPublisher,
{
    identity: I,
    sink: UserSink<C, P>,
    config: IdentityConfig,
}

impl<I, C, P> PostConfirmationHandler<I, C, P>
where
    I: IdentityOps,
    C: DbClient,
    P: UserEventPublisher,
{
    pub fn new(identity: I, sink: UserSink<C, P>, config: IdentityConfig) -> Self {
        Self {
            identity,
            sink,
            config,
        }
    }

    /// メールドメインからグループを決定
    pub fn group_for(&self, email: &str) -> &'static str {
        let domain = email
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_ascii_lowercase());
        match (domain, &self.config.admin_email_domain) {
            (Some(domain), Some(admin)) if &domain == admin => ADMIN_GROUP,
            _ => USER_GROUP,
        }
    }

    /// # 処理フロー
    /// 1. `custom:status` を `PENDING` に設定
    /// 2. メールドメインに応じたグループに追加
    /// 3. ユーザーレコードを作成（直接、またはイベント経由）
    pub async fn handle(&self, event: Value) -> Result<HandlerOutput, AppError> {
        let user_pool_id = event
            .get("userPoolId")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::bad_request("Missing userPoolId"))?;
        let username = event
            .get("userName")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::bad_request("Missing userName"))?;
        let attrs = user_attributes(&event)?;
        let sub = attribute(attrs, "sub")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::bad_request("Missing sub attribute"))?;
        // ユーザー名にメールアドレスを使うプールではemail属性が無いこともある
        let email = attribute(attrs, "email").unwrap_or(username);

        let mut candidate = json!({ "name": attribute(attrs, "name"), "email": email });
        if let Some(phone) = attribute(attrs, "phone_number") {
            candidate["phone"] = Value::String(phone.to_string());
        }
        let mut user = CreateUserInput::parse(&candidate)?.into_record();
        user.insert("id".to_string(), Value::String(sub.to_string()));
        user.insert(
            "status".to_string(),
            Value::String(USER_STATUS_PENDING.to_string()),
        );

        let group = self.group_for(email);
        self.identity
            .set_user_status(user_pool_id, username, USER_STATUS_PENDING)
            .await?;
        self.identity
            .add_user_to_group(user_pool_id, username, group)
            .await?;
        self.sink.emit(user).await?;

        info!(user_id = %sub, group = %group, "user confirmed");
        Ok(HandlerOutput::Data(event))
    }
}

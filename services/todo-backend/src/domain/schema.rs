/// Todo/Userの入力スキーマ
///
/// HTTPリクエストのボディ・パスパラメータ・クエリパラメータと
/// 認証トリガーのユーザー属性を検証し、型付きの入力に変換する。
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validation::{expect_object, ObjectValidator};
use super::{AppError, ListFilter, Record};

/// Todoのステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    #[default]
    Pending,
    Progress,
    Completed,
}

impl TodoStatus {
    pub const VALUES: [&'static str; 3] = ["pending", "progress", "completed"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TodoStatus::Pending),
            "progress" => Some(TodoStatus::Progress),
            "completed" => Some(TodoStatus::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::Progress => "progress",
            TodoStatus::Completed => "completed",
        }
    }
}

/// ユーザーのステータス
pub const USER_STATUS_PENDING: &str = "PENDING";

/// Todo作成入力
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoInput {
    pub title: String,
    pub content: String,
    pub status: TodoStatus,
    pub media: Vec<String>,
}

impl CreateTodoInput {
    /// ボディを検証（未知のキーは取り除く）
    pub fn parse(body: &Value) -> Result<Self, AppError> {
        let obj = expect_object(body)?;
        let mut v = ObjectValidator::new(obj);
        let title = v.required_trimmed("title", "Title is required");
        let content = v.required_trimmed("content", "Content is required");
        let status = v.optional_enum("status", &TodoStatus::VALUES);
        let media = v.optional_string_array("media");
        v.finish()?;

        Ok(Self {
            title: title.unwrap_or_default(),
            content: content.unwrap_or_default(),
            status: status
                .as_deref()
                .and_then(TodoStatus::parse)
                .unwrap_or_default(),
            media: media.unwrap_or_default(),
        })
    }

    /// 保存用レコードに変換（所有者が分かる場合は `userId` を付与）
    pub fn into_record(self, user_id: Option<&str>) -> Record {
        let mut record = to_record(&self);
        if let Some(user_id) = user_id {
            record.insert("userId".to_string(), Value::String(user_id.to_string()));
        }
        record
    }
}

/// Todo更新入力（全フィールド任意）
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<String>>,
}

impl UpdateTodoInput {
    pub fn parse(body: &Value) -> Result<Self, AppError> {
        let obj = expect_object(body)?;
        let mut v = ObjectValidator::new(obj);
        let id = v.optional_trimmed("id", "Id is required");
        let title = v.optional_trimmed("title", "Title is required");
        let content = v.optional_trimmed("content", "Content is required");
        let status = v.optional_enum("status", &TodoStatus::VALUES);
        let media = v.optional_string_array("media");
        v.finish()?;

        Ok(Self {
            id,
            title,
            content,
            status: status.as_deref().and_then(TodoStatus::parse),
            media,
        })
    }

    /// 更新対象のフィールド（`id` を除く）
    pub fn into_values(self) -> Record {
        let mut values = to_record(&self);
        values.remove("id");
        values
    }
}

/// パスパラメータの `id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParam {
    pub id: String,
}

impl IdParam {
    pub fn parse(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let obj = string_map_to_record(params);
        let mut v = ObjectValidator::new(&obj);
        let id = v.required_trimmed("id", "Id is required");
        v.finish()?;
        Ok(Self {
            id: id.unwrap_or_default(),
        })
    }
}

/// Todo一覧のクエリパラメータ
pub struct ListTodosQuery;

impl ListTodosQuery {
    pub fn parse(params: &HashMap<String, String>) -> Result<ListFilter, AppError> {
        let obj = string_map_to_record(params);
        let mut v = ObjectValidator::new(&obj);
        let status = v.optional_enum("status", &TodoStatus::VALUES);
        let search = v.optional_trimmed("search", "Search must not be empty");
        let limit = v.optional_coerced_int("limit", 1);
        let offset = v.optional_coerced_int("offset", 0);
        v.finish()?;

        let defaults = ListFilter::default();
        Ok(ListFilter {
            status,
            search,
            limit: limit.map_or(defaults.limit, clamp_u32),
            offset: offset.map_or(defaults.offset, clamp_u32),
        })
    }
}

fn clamp_u32(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// ユーザー作成入力（既知フィールド以外はそのまま通す）
#[derive(Debug, Clone, PartialEq)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub extra: Record,
}

impl CreateUserInput {
    pub fn parse(value: &Value) -> Result<Self, AppError> {
        let obj = expect_object(value)?;
        let mut v = ObjectValidator::new(obj);
        let name = v.required_trimmed("name", "Name is required");
        let phone = v.optional_string("phone");
        let email = v.required_email("email");
        v.finish()?;

        let extra = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "name" | "phone" | "email"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            phone,
            extra,
        })
    }

    /// 保存用レコードに変換
    pub fn into_record(self) -> Record {
        let mut record = self.extra;
        record.insert("name".to_string(), Value::String(self.name));
        record.insert("email".to_string(), Value::String(self.email));
        if let Some(phone) = self.phone {
            record.insert("phone".to_string(), Value::String(phone));
        }
        record
    }
}

/// ユーザープロフィール更新入力（未知のキーは拒否）
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl UpdateUserInput {
    const FIELDS: [&'static str; 4] = ["name", "phone", "profileUrl", "coverUrl"];

    pub fn parse(body: &Value) -> Result<Self, AppError> {
        let obj = expect_object(body)?;
        let mut v = ObjectValidator::new(obj);
        let name = v.optional_trimmed("name", "Name is required");
        let phone = v.optional_string("phone");
        let profile_url = v.optional_url("profileUrl");
        let cover_url = v.optional_url("coverUrl");
        v.reject_unknown_keys(&Self::FIELDS);
        v.finish()?;

        Ok(Self {
            name,
            phone,
            profile_url,
            cover_url,
        })
    }

    pub fn into_values(self) -> Record {
        to_record(&self)
    }
}

fn to_record<T: Serialize>(value: &T) -> Record {
    match serde_json::to_value(value) {
        Ok(Value::Object(record)) => record,
        _ => Record::new(),
    }
}

fn string_map_to_record(params: &HashMap<String, String>) -> Record {
    params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ==================== Todo作成 ====================

    #[test]
    fn test_create_todo_applies_defaults() {
        let input = CreateTodoInput::parse(&json!({"title": "Buy milk", "content": "2%"})).unwrap();

        assert_eq!(input.title, "Buy milk");
        assert_eq!(input.content, "2%");
        assert_eq!(input.status, TodoStatus::Pending);
        assert!(input.media.is_empty());
    }

    #[test]
    fn test_create_todo_empty_title() {
        let err = CreateTodoInput::parse(&json!({"title": "", "content": "x"})).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BadRequest);
        let details = err.details().unwrap();
        assert!(details.iter().any(|d| d.field == "title"));
        assert!(details.iter().all(|d| d.field != "content"));
    }

    #[test]
    fn test_create_todo_strips_unknown_keys() {
        let input = CreateTodoInput::parse(&json!({
            "title": "a",
            "content": "b",
            "status": "completed",
            "media": ["k1"],
            "admin": true
        }))
        .unwrap();
        let record = input.into_record(Some("user-1"));

        assert_eq!(record["status"], "completed");
        assert_eq!(record["media"], json!(["k1"]));
        assert_eq!(record["userId"], "user-1");
        assert!(record.get("admin").is_none());
    }

    // ==================== Todo更新 ====================

    #[test]
    fn test_update_todo_partial() {
        let input = UpdateTodoInput::parse(&json!({"status": "progress"})).unwrap();
        let values = input.into_values();

        assert_eq!(values.len(), 1);
        assert_eq!(values["status"], "progress");
    }

    #[test]
    fn test_update_todo_rejects_bad_status() {
        let err = UpdateTodoInput::parse(&json!({"status": "archived"})).unwrap_err();
        assert_eq!(err.details().unwrap()[0].field, "status");
    }

    #[test]
    fn test_update_todo_values_exclude_id() {
        let input = UpdateTodoInput::parse(&json!({"id": "t1", "title": "x"})).unwrap();
        assert_eq!(input.id.as_deref(), Some("t1"));
        let values = input.into_values();
        assert!(values.get("id").is_none());
        assert_eq!(values["title"], "x");
    }

    // ==================== パス・クエリ ====================

    #[test]
    fn test_id_param() {
        assert_eq!(IdParam::parse(&params(&[("id", " t1 ")])).unwrap().id, "t1");

        let err = IdParam::parse(&params(&[])).unwrap_err();
        assert_eq!(err.details().unwrap()[0].field, "id");
    }

    #[test]
    fn test_list_query_defaults() {
        let filter = ListTodosQuery::parse(&params(&[])).unwrap();
        assert_eq!(filter, ListFilter::default());
    }

    #[test]
    fn test_list_query_values() {
        let filter = ListTodosQuery::parse(&params(&[
            ("status", "completed"),
            ("search", " milk "),
            ("limit", "5"),
            ("offset", "10"),
        ]))
        .unwrap();

        assert_eq!(filter.status.as_deref(), Some("completed"));
        assert_eq!(filter.search.as_deref(), Some("milk"));
        assert_eq!(filter.limit, 5);
        assert_eq!(filter.offset, 10);
    }

    #[test]
    fn test_list_query_rejects_zero_limit() {
        let err = ListTodosQuery::parse(&params(&[("limit", "0")])).unwrap_err();
        assert_eq!(err.details().unwrap()[0].field, "limit");
    }

    // ==================== ユーザー ====================

    #[test]
    fn test_create_user_passthrough() {
        let input = CreateUserInput::parse(&json!({
            "name": "Alice",
            "email": "alice@example.com",
            "id": "sub-1"
        }))
        .unwrap();
        let record = input.into_record();

        assert_eq!(record["name"], "Alice");
        assert_eq!(record["id"], "sub-1");
        assert!(record.get("phone").is_none());
    }

    #[test]
    fn test_create_user_invalid_email_and_name() {
        let err = CreateUserInput::parse(&json!({"name": " ", "email": "nope"})).unwrap_err();
        let fields: Vec<&str> = err
            .details()
            .unwrap()
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert_eq!(fields, vec!["name", "email"]);
    }

    #[test]
    fn test_update_user_is_strict() {
        let err = UpdateUserInput::parse(&json!({"name": "Bob", "email": "b@example.com"}))
            .unwrap_err();
        assert_eq!(err.details().unwrap()[0].code, "unrecognized_keys");
    }

    #[test]
    fn test_update_user_values_use_camel_case() {
        let input = UpdateUserInput::parse(&json!({
            "profileUrl": "https://cdn.example.com/p.png"
        }))
        .unwrap();
        let values = input.into_values();
        assert_eq!(values["profileUrl"], "https://cdn.example.com/p.png");
        assert_eq!(values.len(), 1);
    }
}

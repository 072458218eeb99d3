/// DB操作ゲートウェイのペイロード定義
///
/// `(table, action)` をキーとするタグ付きユニオン。
/// 各アクションは自分のバリアントに属するフィールドのみを受け付ける。
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{AppError, Record};

/// 論理テーブル名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalTable {
    Todo,
    User,
}

impl LogicalTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalTable::Todo => "Todo",
            LogicalTable::User => "User",
        }
    }
}

impl fmt::Display for LogicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalTable {
    type Err = AppError;

    /// 未知のテーブル名は設定欠落として扱う
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Todo" => Ok(LogicalTable::Todo),
            "User" => Ok(LogicalTable::User),
            other => Err(AppError::configuration_missing(format!(
                "Database table name not configured for: {}",
                other
            ))),
        }
    }
}

/// レコードのキー（パーティションキーは `id` のみ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub id: String,
}

impl Key {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

fn default_limit() -> u32 {
    10
}

/// list操作の絞り込み条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// title/contentに対する大文字小文字を区別しない部分一致
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// アクション別の操作
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DbOperation {
    Get {
        key: Key,
    },
    Create {
        item: Record,
    },
    Update {
        key: Key,
        #[serde(rename = "updateExpression")]
        update_expression: String,
        values: Record,
    },
    Delete {
        key: Key,
    },
    List {
        filter: ListFilter,
    },
}

impl DbOperation {
    /// `values` の各フィールドをSETする更新操作
    pub fn update(key: Key, values: Record) -> Self {
        let assignments: Vec<String> = values
            .keys()
            .map(|field| format!("#{} = :{}", field, field))
            .collect();
        DbOperation::Update {
            key,
            update_expression: format!("SET {}", assignments.join(", ")),
            values,
        }
    }

    /// アクション名（ログ出力用）
    pub fn action(&self) -> &'static str {
        match self {
            DbOperation::Get { .. } => "get",
            DbOperation::Create { .. } => "create",
            DbOperation::Update { .. } => "update",
            DbOperation::Delete { .. } => "delete",
            DbOperation::List { .. } => "list",
        }
    }
}

/// DB操作ゲートウェイへのペイロード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbPayload {
    pub table: LogicalTable,
    #[serde(flatten)]
    pub operation: DbOperation,
}

/// 各アクションが受け付けるフィールド
const GET_FIELDS: &[&str] = &["action", "table", "key"];
const CREATE_FIELDS: &[&str] = &["action", "table", "item"];
const UPDATE_FIELDS: &[&str] = &["action", "table", "key", "updateExpression", "values"];
const DELETE_FIELDS: &[&str] = &["action", "table", "key"];
const LIST_FIELDS: &[&str] = &["action", "table", "filter"];

impl DbPayload {
    pub fn new(table: LogicalTable, operation: DbOperation) -> Self {
        Self { table, operation }
    }

    /// Lambdaイベントからペイロードを取り出してパース
    ///
    /// 呼び出し元は `{ "payload": {...} }` で包んで送る。
    /// 包まれていない場合はイベント全体をペイロードとして扱う。
    pub fn from_event(event: Value) -> Result<Self, AppError> {
        match event {
            Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("payload") => {
                let inner = obj.remove("payload").unwrap_or(Value::Null);
                Self::from_value(inner)
            }
            other => Self::from_value(other),
        }
    }

    /// JSON値から厳密にパース
    ///
    /// # エラー
    /// * 未知・未対応のアクション、欠落フィールド、他バリアントのフィールド → `BAD_REQUEST`
    /// * 未知のテーブル → `CONFIGURATION_MISSING`
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            _ => return Err(AppError::bad_request("Payload must be a JSON object")),
        };

        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::bad_request("Missing action"))?
            .to_string();

        let allowed = match action.as_str() {
            "get" => GET_FIELDS,
            "create" => CREATE_FIELDS,
            "update" => UPDATE_FIELDS,
            "delete" => DELETE_FIELDS,
            "list" => LIST_FIELDS,
            other => {
                return Err(AppError::bad_request(format!(
                    "Unsupported action: {}",
                    other
                )));
            }
        };

        let table: LogicalTable = obj
            .get("table")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::bad_request("Missing table"))?
            .parse()?;

        if let Some(field) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(AppError::bad_request(format!(
                "Field '{}' is not allowed for action '{}'",
                field, action
            )));
        }

        let operation = match action.as_str() {
            "get" => DbOperation::Get {
                key: take_key(&mut obj)?,
            },
            "create" => {
                let item = take_object(&mut obj, "item")?;
                check_item_id(&item)?;
                DbOperation::Create { item }
            }
            "update" => {
                let key = take_key(&mut obj)?;
                let update_expression = obj
                    .remove("updateExpression")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| AppError::bad_request("Missing updateExpression"))?;
                let values = take_object(&mut obj, "values")?;
                if values.is_empty() {
                    return Err(AppError::bad_request("values must not be empty"));
                }
                DbOperation::Update {
                    key,
                    update_expression,
                    values,
                }
            }
            "delete" => DbOperation::Delete {
                key: take_key(&mut obj)?,
            },
            _ => DbOperation::List {
                filter: take_filter(&mut obj)?,
            },
        };

        Ok(Self { table, operation })
    }
}

fn take_object(obj: &mut Map<String, Value>, field: &str) -> Result<Record, AppError> {
    match obj.remove(field) {
        Some(Value::Object(record)) => Ok(record),
        Some(_) => Err(AppError::bad_request(format!("{} must be an object", field))),
        None => Err(AppError::bad_request(format!("Missing {}", field))),
    }
}

fn take_key(obj: &mut Map<String, Value>) -> Result<Key, AppError> {
    let key = take_object(obj, "key")?;
    if let Some(field) = key.keys().find(|k| k.as_str() != "id") {
        return Err(AppError::bad_request(format!(
            "Key attribute '{}' is not part of the table key",
            field
        )));
    }
    // 前後の空白も含めて保存時のidと一致させる
    key.get("id")
        .and_then(Value::as_str)
        .filter(|id| is_valid_id(id))
        .map(Key::new)
        .ok_or_else(|| AppError::bad_request("key.id is required"))
}

fn is_valid_id(id: &str) -> bool {
    !id.trim().is_empty()
}

/// 作成時に呼び出し元が指定した `id` を検証する
///
/// 未指定・`null` は採番対象として通す。それ以外は `key.id` と同じ規則で
/// 空でない文字列でなければ `BAD_REQUEST`。
pub fn check_item_id(item: &Record) -> Result<(), AppError> {
    match item.get("id") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(id)) if is_valid_id(id) => Ok(()),
        Some(_) => Err(AppError::bad_request("item.id must be a non-empty string")),
    }
}

fn take_filter(obj: &mut Map<String, Value>) -> Result<ListFilter, AppError> {
    let filter = match obj.remove("filter") {
        None | Some(Value::Null) => ListFilter::default(),
        Some(value) => serde_json::from_value::<ListFilter>(value)
            .map_err(|e| AppError::bad_request(format!("Invalid filter: {}", e)))?,
    };
    if filter.limit == 0 {
        return Err(AppError::bad_request("filter.limit must be positive"));
    }
    Ok(filter)
}

/// 作成・更新時のメタデータ付与
///
/// create時は `id` と `createdAt`、update時は `updatedAt` を補う。
/// 呼び出し元が既に値を持っている場合は上書きしない。
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::Record;

/// レコードIDのフィールド名
pub const ID_FIELD: &str = "id";
/// 作成日時のフィールド名
pub const CREATED_AT_FIELD: &str = "createdAt";
/// 更新日時のフィールド名
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// 現在時刻をISO-8601（UTC、ミリ秒精度、`Z`サフィックス）で取得
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 新しいレコードIDを生成（UUID v4）
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// create操作用のメタデータを付与
///
/// `id` が無ければUUID v4を、`createdAt` が無ければ現在時刻を設定する。
/// `null` は未設定として扱う。
pub fn with_create_metadata(mut item: Record) -> Record {
    if is_absent(&item, ID_FIELD) {
        item.insert(ID_FIELD.to_string(), Value::String(new_record_id()));
    }
    if is_absent(&item, CREATED_AT_FIELD) {
        item.insert(CREATED_AT_FIELD.to_string(), Value::String(now_iso8601()));
    }
    item
}

/// update操作用のメタデータを付与
pub fn with_update_metadata(mut values: Record) -> Record {
    if is_absent(&values, UPDATED_AT_FIELD) {
        values.insert(UPDATED_AT_FIELD.to_string(), Value::String(now_iso8601()));
    }
    values
}

fn is_absent(record: &Record, field: &str) -> bool {
    matches!(record.get(field), None | Some(Value::Null))
}

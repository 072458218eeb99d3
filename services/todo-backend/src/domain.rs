// Domain layer modules
pub mod app_error;
pub mod metadata;
pub mod operation;
pub mod schema;
pub mod user_info;
pub mod validation;

/// 1件のレコード（フィールド名 → スカラー値または配列）
pub type Record = serde_json::Map<String, serde_json::Value>;

// Re-exports
pub use app_error::{AppError, ErrorKind, FieldViolation};
pub use metadata::{with_create_metadata, with_update_metadata};
pub use operation::{check_item_id, DbOperation, DbPayload, Key, ListFilter, LogicalTable};
pub use schema::{
    CreateTodoInput, CreateUserInput, IdParam, ListTodosQuery, TodoStatus, UpdateTodoInput,
    UpdateUserInput,
};
pub use user_info::UserInfo;

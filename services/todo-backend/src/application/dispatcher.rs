/// DB操作ゲートウェイのディスパッチャー
///
/// `(table, action)` ペイロードを受け取り、テーブル名を解決し、
/// メタデータを付与したうえでストレージ操作を1回だけ実行する。
use async_trait::async_trait;
use aws_lambda_events::event::eventbridge::EventBridgeEvent;
use serde_json::{json, Value};
use tracing::info;

use super::TableNameResolver;
use crate::domain::metadata::CREATED_AT_FIELD;
use crate::domain::{
    check_item_id, with_create_metadata, with_update_metadata, AppError, CreateUserInput,
    DbOperation, DbPayload, ListFilter, LogicalTable, Record,
};
use crate::infrastructure::{DbClient, RecordStore, USER_CREATED_DETAIL_TYPE, USER_EVENT_SOURCE};

/// ディスパッチャー
pub struct Dispatcher<S>
where
    S: RecordStore,
{
    store: S,
    resolver: TableNameResolver,
}

impl<S> Dispatcher<S>
where
    S: RecordStore,
{
    pub fn new(store: S, resolver: TableNameResolver) -> Self {
        Self { store, resolver }
    }

    /// ペイロードを実行
    ///
    /// # 戻り値
    /// * get → `{ "item": record | null }`
    /// * create → `{ "item": 保存したレコード }`
    /// * update → `{ "attributes": 更新後のレコード }`
    /// * delete → `{}`
    /// * list → `{ "items": [...], "count": n }`
    pub async fn dispatch(&self, payload: DbPayload) -> Result<Value, AppError> {
        let table = self.resolver.resolve_table(payload.table)?;
        info!(
            table = %payload.table,
            physical_table = %table,
            action = payload.operation.action(),
            "database operation"
        );

        match payload.operation {
            DbOperation::Get { key } => {
                let item = self.store.get(table, &key).await?;
                Ok(json!({ "item": item }))
            }
            DbOperation::Create { item } => {
                // 組み立て済みペイロード（UserCreatedの追加属性など）もここで検証
                check_item_id(&item)?;
                let item = with_create_metadata(item);
                self.store.put_if_absent(table, &item).await?;
                Ok(json!({ "item": item }))
            }
            DbOperation::Update {
                key,
                update_expression,
                values,
            } => {
                // 式はvaluesから組み立て直すので、受け取った式は存在確認のみ
                if update_expression.trim().is_empty() {
                    return Err(AppError::bad_request("Missing updateExpression"));
                }
                if values.is_empty() {
                    return Err(AppError::bad_request("values must not be empty"));
                }
                let values = with_update_metadata(values);
                let attributes = self.store.update_existing(table, &key, &values).await?;
                Ok(json!({ "attributes": attributes }))
            }
            DbOperation::Delete { key } => {
                self.store.delete(table, &key).await?;
                Ok(json!({}))
            }
            DbOperation::List { filter } => {
                let rows = self.store.scan(table).await?;
                let items = apply_list_filter(rows, &filter);
                let count = items.len();
                Ok(json!({ "items": items, "count": count }))
            }
        }
    }

    /// Lambdaイベントを実行
    ///
    /// 直接呼び出しの `{ "payload": {...} }` と、
    /// EventBridge経由のUserCreatedイベントの両方を受け付ける。
    pub async fn handle_event(&self, event: Value) -> Result<Value, AppError> {
        let payload = payload_from_event(event)?;
        self.dispatch(payload).await
    }
}

#[async_trait]
impl<S> DbClient for Dispatcher<S>
where
    S: RecordStore,
{
    async fn send(&self, payload: &DbPayload) -> Result<Value, AppError> {
        self.dispatch(payload.clone()).await
    }
}

/// EventBridgeのUserCreatedイベントかどうか
pub fn is_user_created_event(event: &Value) -> bool {
    event.get("source").and_then(Value::as_str) == Some(USER_EVENT_SOURCE)
        && event.get("detail-type").and_then(Value::as_str) == Some(USER_CREATED_DETAIL_TYPE)
}

/// イベントをペイロードに変換
pub fn payload_from_event(event: Value) -> Result<DbPayload, AppError> {
    if !is_user_created_event(&event) {
        return DbPayload::from_event(event);
    }

    let event: EventBridgeEvent<Value> = serde_json::from_value(event)
        .map_err(|e| AppError::bad_request(format!("Invalid UserCreated event: {}", e)))?;
    let user = CreateUserInput::parse(&event.detail)?;

    Ok(DbPayload::new(
        LogicalTable::User,
        DbOperation::Create {
            item: user.into_record(),
        },
    ))
}

/// list操作の絞り込み・並べ替え・ページング
///
/// `createdAt` の降順（ISO-8601文字列の比較）で並べ、offset/limitで切り出す。
pub fn apply_list_filter(rows: Vec<Record>, filter: &ListFilter) -> Vec<Record> {
    let search = filter.search.as_deref().map(str::to_lowercase);

    let mut matched: Vec<Record> = rows
        .into_iter()
        .filter(|row| match &filter.status {
            Some(status) => row.get("status").and_then(Value::as_str) == Some(status.as_str()),
            None => true,
        })
        .filter(|row| match &search {
            Some(needle) => ["title", "content"].iter().any(|field| {
                row.get(*field)
                    .and_then(Value::as_str)
                    .is_some_and(|text| text.to_lowercase().contains(needle.as_str()))
            }),
            None => true,
        })
        .collect();

    matched.sort_by(|a, b| {
        let a = a.get(CREATED_AT_FIELD).and_then(Value::as_str).unwrap_or_default();
        let b = b.get(CREATED_AT_FIELD).and_then(Value::as_str).unwrap_or_default();
        b.cmp(a)
    });

    matched
        .into_iter()
        .skip(filter.offset as usize)
        .take(filter.limit as usize)
        .collect()
}

/// レコードストア
///
/// DB操作ゲートウェイが1回のディスパッチにつき1回だけ呼び出すストレージ操作。
/// 物理テーブル名は呼び出しごとに渡す（解決はアプリケーション層で行う）。
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::metadata::ID_FIELD;
use crate::domain::{AppError, Key, Record};

/// ストア操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// 同じIDのレコードが既に存在する（条件付き書き込みの失敗）
    #[error("Item with id '{0}' already exists")]
    AlreadyExists(String),

    /// 更新対象のレコードが存在しない
    #[error("Item with id '{0}' not found")]
    NotFound(String),

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),

    /// レコードとDynamoDB属性の相互変換に失敗
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(_) => AppError::conflict(err.to_string()),
            StoreError::NotFound(_) => AppError::not_found(err.to_string()),
            _ => AppError::internal(err.to_string()),
        }
    }
}

impl From<serde_dynamo::Error> for StoreError {
    fn from(err: serde_dynamo::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

/// レコード永続化の抽象化（実際のDynamoDB、テスト用インメモリ）
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// キーでレコードを取得
    ///
    /// # 戻り値
    /// * 見つかった場合は`Ok(Some(Record))`
    /// * 見つからなかった場合は`Ok(None)`
    async fn get(&self, table: &str, key: &Key) -> Result<Option<Record>, StoreError>;

    /// 同じIDが存在しない場合のみレコードを保存
    ///
    /// # 戻り値
    /// * 既存の場合は`Err(StoreError::AlreadyExists)`
    async fn put_if_absent(&self, table: &str, item: &Record) -> Result<(), StoreError>;

    /// 既存レコードの各フィールドを `values` で上書きし、更新後のレコードを返す
    ///
    /// # 戻り値
    /// * 存在しない場合は`Err(StoreError::NotFound)`
    async fn update_existing(
        &self,
        table: &str,
        key: &Key,
        values: &Record,
    ) -> Result<Record, StoreError>;

    /// キーでレコードを削除（存在しない場合も成功）
    async fn delete(&self, table: &str, key: &Key) -> Result<(), StoreError>;

    /// テーブルの全レコードを取得
    ///
    /// 1回の論理スキャン。ページングは実装側で辿りきる。
    async fn scan(&self, table: &str) -> Result<Vec<Record>, StoreError>;
}

/// `SET #f0 = :v0, #f1 = :v1` 形式の更新式
///
/// キー属性はSETできないため除外する。フィールド名は予約語と衝突しうるので
/// 常にプレースホルダー経由で参照する。
#[derive(Debug, Clone, PartialEq)]
pub struct SetExpression {
    pub expression: String,
    pub names: Vec<(String, String)>,
    pub values: Vec<(String, Value)>,
}

impl SetExpression {
    pub fn from_values(values: &Record) -> Self {
        let mut clauses = Vec::new();
        let mut names = Vec::new();
        let mut placeholders = Vec::new();

        for (i, (field, value)) in values
            .iter()
            .filter(|(field, _)| field.as_str() != ID_FIELD)
            .enumerate()
        {
            let name = format!("#f{}", i);
            let placeholder = format!(":v{}", i);
            clauses.push(format!("{} = {}", name, placeholder));
            names.push((name, field.clone()));
            placeholders.push((placeholder, value.clone()));
        }

        Self {
            expression: format!("SET {}", clauses.join(", ")),
            names,
            values: placeholders,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// RecordStoreのDynamoDB実装
#[derive(Debug, Clone)]
pub struct DynamoRecordStore {
    client: DynamoDbClient,
}

impl DynamoRecordStore {
    pub fn new(client: DynamoDbClient) -> Self {
        Self { client }
    }

    fn key_attribute(key: &Key) -> AttributeValue {
        AttributeValue::S(key.id.clone())
    }

    fn to_item(record: &Record) -> Result<HashMap<String, AttributeValue>, StoreError> {
        Ok(serde_dynamo::to_item(record)?)
    }

    fn from_item(item: HashMap<String, AttributeValue>) -> Result<Record, StoreError> {
        Ok(serde_dynamo::from_item(item)?)
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn get(&self, table: &str, key: &Key) -> Result<Option<Record>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .key(ID_FIELD, Self::key_attribute(key))
            .send()
            .await
            .map_err(|e| StoreError::ReadError(e.into_service_error().to_string()))?;

        result.item.map(Self::from_item).transpose()
    }

    async fn put_if_absent(&self, table: &str, item: &Record) -> Result<(), StoreError> {
        let id = item
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let result = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(Self::to_item(item)?))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    return Err(StoreError::AlreadyExists(id));
                }
                Err(StoreError::WriteError(service_error.to_string()))
            }
        }
    }

    async fn update_existing(
        &self,
        table: &str,
        key: &Key,
        values: &Record,
    ) -> Result<Record, StoreError> {
        let set = SetExpression::from_values(values);
        if set.is_empty() {
            return Err(StoreError::WriteError(
                "No attributes to update".to_string(),
            ));
        }
        debug!(table = %table, expression = %set.expression, "update expression");

        let mut builder = self
            .client
            .update_item()
            .table_name(table)
            .key(ID_FIELD, Self::key_attribute(key))
            .update_expression(&set.expression)
            .condition_expression("attribute_exists(id)")
            .return_values(ReturnValue::AllNew);

        for (placeholder, field) in &set.names {
            builder = builder.expression_attribute_names(placeholder, field);
        }
        for (placeholder, value) in &set.values {
            let attribute: AttributeValue = serde_dynamo::to_attribute_value(value)?;
            builder = builder.expression_attribute_values(placeholder, attribute);
        }

        match builder.send().await {
            Ok(output) => match output.attributes {
                Some(attributes) => Self::from_item(attributes),
                None => Err(StoreError::ReadError(
                    "UpdateItem returned no attributes".to_string(),
                )),
            },
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_conditional_check_failed_exception() {
                    return Err(StoreError::NotFound(key.id.clone()));
                }
                Err(StoreError::WriteError(service_error.to_string()))
            }
        }
    }

    async fn delete(&self, table: &str, key: &Key) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(table)
            .key(ID_FIELD, Self::key_attribute(key))
            .send()
            .await
            .map_err(|e| StoreError::WriteError(e.into_service_error().to_string()))?;

        Ok(())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        let mut last_evaluated_key = None;

        // LastEvaluatedKeyがある限りスキャンを続ける
        loop {
            let mut scan_builder = self.client.scan().table_name(table);
            if let Some(key) = last_evaluated_key.take() {
                scan_builder = scan_builder.set_exclusive_start_key(Some(key));
            }

            let result = scan_builder
                .send()
                .await
                .map_err(|e| StoreError::ReadError(e.into_service_error().to_string()))?;

            for item in result.items.unwrap_or_default() {
                records.push(Self::from_item(item)?);
            }

            match result.last_evaluated_key {
                Some(key) => last_evaluated_key = Some(key),
                None => break,
            }
        }

        Ok(records)
    }
}

/// RecordStoreのインメモリ実装
///
/// ローカル実行とテストで使用する。呼び出し回数を記録し、
/// `set_next_error` で次の操作を失敗させられる。
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    /// テーブル名 → (id → レコード)
    tables: Arc<Mutex<HashMap<String, HashMap<String, Record>>>>,
    next_error: Arc<Mutex<Option<StoreError>>>,
    calls: Arc<Mutex<usize>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_next_error(&self, error: StoreError) {
        if let Ok(mut next) = self.next_error.lock() {
            *next = Some(error);
        }
    }

    /// これまでのストレージ呼び出し回数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }

    /// テーブル内のレコード数
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .lock()
            .map(|t| t.get(table).map_or(0, HashMap::len))
            .unwrap_or_default()
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    /// 呼び出しを記録し、設定済みのエラーがあれば返す
    fn begin(&self) -> Result<(), StoreError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        match self.next_error.lock() {
            Ok(mut next) => next.take().map_or(Ok(()), Err),
            Err(_) => Ok(()),
        }
    }

    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, HashMap<String, Record>>) -> T,
    ) -> Result<T, StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| StoreError::WriteError(e.to_string()))?;
        Ok(f(&mut tables))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, table: &str, key: &Key) -> Result<Option<Record>, StoreError> {
        self.begin()?;
        self.with_tables(|tables| tables.get(table).and_then(|t| t.get(&key.id)).cloned())
    }

    async fn put_if_absent(&self, table: &str, item: &Record) -> Result<(), StoreError> {
        self.begin()?;
        let id = item
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::SerializationError("Missing id field".to_string()))?
            .to_string();

        self.with_tables(|tables| {
            let rows = tables.entry(table.to_string()).or_default();
            if rows.contains_key(&id) {
                return Err(StoreError::AlreadyExists(id));
            }
            rows.insert(id, item.clone());
            Ok(())
        })?
    }

    async fn update_existing(
        &self,
        table: &str,
        key: &Key,
        values: &Record,
    ) -> Result<Record, StoreError> {
        self.begin()?;
        self.with_tables(|tables| {
            let record = tables
                .get_mut(table)
                .and_then(|t| t.get_mut(&key.id))
                .ok_or_else(|| StoreError::NotFound(key.id.clone()))?;
            for (field, value) in values.iter().filter(|(f, _)| f.as_str() != ID_FIELD) {
                record.insert(field.clone(), value.clone());
            }
            Ok(record.clone())
        })?
    }

    async fn delete(&self, table: &str, key: &Key) -> Result<(), StoreError> {
        self.begin()?;
        self.with_tables(|tables| {
            if let Some(rows) = tables.get_mut(table) {
                rows.remove(&key.id);
            }
        })
    }

    async fn scan(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        self.begin()?;
        self.with_tables(|tables| {
            tables
                .get(table)
                .map(|rows| rows.values().cloned().collect())
                .unwrap_or_default()
        })
    }
}

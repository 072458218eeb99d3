/// Todo CRUDハンドラー
///
/// `/v0/todos` の各エンドポイント。入力を検証してペイロードを組み立て、
/// DB操作ゲートウェイの結果をHTTPレスポンス用の値に変換する。
use serde_json::{json, Value};
use tracing::info;

use super::{ApiRequest, ApiResponse, HandlerOutput};
use crate::domain::{
    AppError, CreateTodoInput, DbOperation, DbPayload, IdParam, Key, ListTodosQuery,
    LogicalTable, UpdateTodoInput, UserInfo,
};
use crate::infrastructure::DbClient;

pub struct TodoHandlers<C>
where
    C: DbClient,
{
    db: C,
}

impl<C> TodoHandlers<C>
where
    C: DbClient,
{
    pub fn new(db: C) -> Self {
        Self { db }
    }

    /// POST /v0/todos
    ///
    /// クレームがあれば `sub` を `userId` として保存する。
    pub async fn create(&self, request: ApiRequest) -> Result<HandlerOutput, AppError> {
        let body = request.json_body()?;
        let input = CreateTodoInput::parse(&body)?;
        let owner = match &request.claims {
            Some(claims) => Some(UserInfo::from_claims(Some(claims))?.user_id),
            None => None,
        };

        let payload = DbPayload::new(
            LogicalTable::Todo,
            DbOperation::Create {
                item: input.into_record(owner.as_deref()),
            },
        );
        let result = self.db.send(&payload).await?;
        let item = field(result, "item");
        info!(todo_id = ?item.get("id"), "todo created");

        Ok(HandlerOutput::Response(ApiResponse::created(item)))
    }

    /// GET /v0/todos
    pub async fn list(&self, request: ApiRequest) -> Result<HandlerOutput, AppError> {
        let filter = ListTodosQuery::parse(&request.query_parameters)?;
        let payload = DbPayload::new(LogicalTable::Todo, DbOperation::List { filter });
        let result = self.db.send(&payload).await?;
        Ok(HandlerOutput::Data(result))
    }

    /// GET /v0/todos/{id}
    pub async fn get(&self, request: ApiRequest) -> Result<HandlerOutput, AppError> {
        let IdParam { id } = IdParam::parse(&request.path_parameters)?;
        let payload = DbPayload::new(
            LogicalTable::Todo,
            DbOperation::Get {
                key: Key::new(id.clone()),
            },
        );

        let item = field(self.db.send(&payload).await?, "item");
        if item.is_null() {
            return Err(not_found(&id));
        }
        // レコードの中身で完成済みレスポンスと誤認されないよう明示的に包む
        Ok(HandlerOutput::Response(ApiResponse::ok(item)))
    }

    /// PUT /v0/todos/{id}
    pub async fn update(&self, request: ApiRequest) -> Result<HandlerOutput, AppError> {
        let IdParam { id } = IdParam::parse(&request.path_parameters)?;
        let body = request.json_body()?;
        let input = UpdateTodoInput::parse(&body)?;

        if input.id.as_deref().is_some_and(|body_id| body_id != id) {
            return Err(AppError::bad_request(
                "Id in body does not match the path parameter",
            ));
        }
        let values = input.into_values();
        if values.is_empty() {
            return Err(AppError::bad_request("At least one field must be provided"));
        }

        let payload = DbPayload::new(
            LogicalTable::Todo,
            DbOperation::update(Key::new(id), values),
        );
        let result = self.db.send(&payload).await?;
        Ok(HandlerOutput::Response(ApiResponse::ok(field(result, "attributes"))))
    }

    /// DELETE /v0/todos/{id}
    pub async fn delete(&self, request: ApiRequest) -> Result<HandlerOutput, AppError> {
        let IdParam { id } = IdParam::parse(&request.path_parameters)?;
        let payload = DbPayload::new(
            LogicalTable::Todo,
            DbOperation::Delete {
                key: Key::new(id.clone()),
            },
        );
        self.db.send(&payload).await?;
        info!(todo_id = %id, "todo deleted");

        Ok(HandlerOutput::Data(json!({ "id": id })))
    }
}

fn field(mut result: Value, name: &str) -> Value {
    result
        .get_mut(name)
        .map(Value::take)
        .unwrap_or(Value::Null)
}

fn not_found(id: &str) -> AppError {
    AppError::not_found(format!("Todo with id '{}' not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{run_gateway, Dispatcher, HttpMode, TableNameResolver};
    use crate::domain::ErrorKind;
    use crate::infrastructure::{CorsConfig, InMemoryRecordStore, RecordStore, TableConfig};
    use std::collections::HashMap;

    type Handlers = TodoHandlers<Dispatcher<InMemoryRecordStore>>;

    fn create_handlers() -> (Handlers, InMemoryRecordStore) {
        let store = InMemoryRecordStore::new();
        let resolver = TableNameResolver::new(TableConfig::new(
            Some("Todo-test".to_string()),
            Some("User-test".to_string()),
        ));
        (TodoHandlers::new(Dispatcher::new(store.clone(), resolver)), store)
    }

    fn request_with_body(body: Value) -> ApiRequest {
        ApiRequest {
            method: "POST".to_string(),
            body: Some(body.to_string()),
            ..ApiRequest::default()
        }
    }

    fn request_with_id(id: &str) -> ApiRequest {
        ApiRequest {
            path_parameters: HashMap::from([("id".to_string(), id.to_string())]),
            ..ApiRequest::default()
        }
    }

    async fn create_todo(handlers: &Handlers, body: Value) -> Value {
        match handlers.create(request_with_body(body)).await.unwrap() {
            HandlerOutput::Response(response) => {
                let parsed: Value = serde_json::from_str(&response.body).unwrap();
                parsed["data"].clone()
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    fn data(output: HandlerOutput) -> Value {
        match output {
            HandlerOutput::Data(value) => value,
            HandlerOutput::Response(response) => {
                assert_eq!(response.status_code, 200);
                let body: Value = serde_json::from_str(&response.body).unwrap();
                body["data"].clone()
            }
        }
    }

    // ==================== create ====================

    #[tokio::test]
    async fn test_create_end_to_end() {
        let (handlers, store) = create_handlers();
        let mode = HttpMode::new(CorsConfig::default());

        let response = run_gateway(
            &mode,
            request_with_body(json!({"title": "Buy milk", "content": "2%"})),
            |req| handlers.create(req),
        )
        .await
        .unwrap();

        assert_eq!(response.status_code, 201);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["title"], "Buy milk");
        assert_eq!(body["data"]["content"], "2%");
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["media"], json!([]));
        assert!(body["data"]["id"].is_string());
        assert!(body["data"]["createdAt"].is_string());
        assert_eq!(store.len("Todo-test"), 1);
    }

    #[tokio::test]
    async fn test_create_empty_title() {
        let (handlers, store) = create_handlers();
        let mode = HttpMode::new(CorsConfig::default());

        let response = run_gateway(&mode, request_with_body(json!({"title": ""})), |req| {
            handlers.create(req)
        })
        .await
        .unwrap();

        assert_eq!(response.status_code, 400);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        let errors = body["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| e["field"] == "title"));
        assert!(store.is_empty("Todo-test"));
    }

    #[tokio::test]
    async fn test_create_uses_claims_owner() {
        let (handlers, _) = create_handlers();
        let mut request = request_with_body(json!({"title": "a", "content": "b"}));
        request.claims = Some(json!({"sub": "user-1", "cognito:username": "alice"}));

        let output = handlers.create(request).await.unwrap();
        let HandlerOutput::Response(response) = output else {
            panic!("expected response");
        };
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["data"]["userId"], "user-1");
    }

    #[tokio::test]
    async fn test_create_rejects_claims_without_sub() {
        let (handlers, _) = create_handlers();
        let mut request = request_with_body(json!({"title": "a", "content": "b"}));
        request.claims = Some(json!({"username": "alice"}));

        let err = handlers.create(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    // ==================== get / list ====================

    #[tokio::test]
    async fn test_get_existing() {
        let (handlers, _) = create_handlers();
        let created = create_todo(&handlers, json!({"title": "a", "content": "b"})).await;
        let id = created["id"].as_str().unwrap();

        let item = data(handlers.get(request_with_id(id)).await.unwrap());
        assert_eq!(item, created);
    }

    #[tokio::test]
    async fn test_record_shaped_like_a_response_is_still_enveloped() {
        let (handlers, store) = create_handlers();
        let mode = HttpMode::new(CorsConfig::default());
        let stored = json!({
            "id": "t-1",
            "title": "a",
            "content": "b",
            "statusCode": 302,
            "body": "<html>moved</html>",
            "headers": {"Location": "https://evil.example.com"}
        });
        store
            .put_if_absent("Todo-test", stored.as_object().unwrap())
            .await
            .unwrap();

        let response = run_gateway(&mode, request_with_id("t-1"), |req| handlers.get(req))
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);
        assert!(!response.headers.contains_key("Location"));
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], stored);

        let mut request = request_with_id("t-1");
        request.body = Some(json!({"title": "renamed"}).to_string());
        let response = run_gateway(&mode, request, |req| handlers.update(req))
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["data"]["title"], "renamed");
        assert_eq!(body["data"]["statusCode"], 302);
    }

    #[tokio::test]
    async fn test_list_with_query() {
        let (handlers, _) = create_handlers();
        create_todo(&handlers, json!({"title": "Buy milk", "content": "x"})).await;
        create_todo(&handlers, json!({"title": "Walk", "content": "x", "status": "completed"})).await;

        let request = ApiRequest {
            query_parameters: HashMap::from([
                ("status".to_string(), "pending".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]),
            ..ApiRequest::default()
        };
        let result = data(handlers.list(request).await.unwrap());

        assert_eq!(result["count"], 1);
        assert_eq!(result["items"][0]["title"], "Buy milk");
    }

    #[tokio::test]
    async fn test_list_invalid_limit() {
        let (handlers, _) = create_handlers();
        let request = ApiRequest {
            query_parameters: HashMap::from([("limit".to_string(), "0".to_string())]),
            ..ApiRequest::default()
        };

        let err = handlers.list(request).await.unwrap_err();
        assert_eq!(err.details().unwrap()[0].field, "limit");
    }

    // ==================== update ====================

    #[tokio::test]
    async fn test_update_partial() {
        let (handlers, _) = create_handlers();
        let created = create_todo(&handlers, json!({"title": "a", "content": "b"})).await;
        let id = created["id"].as_str().unwrap();

        let mut request = request_with_id(id);
        request.body = Some(json!({"status": "completed"}).to_string());
        let updated = data(handlers.update(request).await.unwrap());

        assert_eq!(updated["status"], "completed");
        assert_eq!(updated["title"], "a");
        assert!(updated["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_update_body_id_mismatch() {
        let (handlers, _) = create_handlers();
        let mut request = request_with_id("t-1");
        request.body = Some(json!({"id": "t-2", "title": "x"}).to_string());

        let err = handlers.update(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_update_requires_a_field() {
        let (handlers, store) = create_handlers();
        let mut request = request_with_id("t-1");
        request.body = Some(json!({"id": "t-1"}).to_string());

        let err = handlers.update(request).await.unwrap_err();
        assert_eq!(err.message(), "At least one field must be provided");
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_todo() {
        let (handlers, _) = create_handlers();
        let mut request = request_with_id("ghost");
        request.body = Some(json!({"title": "x"}).to_string());

        let err = handlers.update(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    // ==================== delete ====================

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let (handlers, _) = create_handlers();
        let mode = HttpMode::new(CorsConfig::default());
        let created = create_todo(&handlers, json!({"title": "a", "content": "b"})).await;
        let id = created["id"].as_str().unwrap().to_string();

        let deleted = run_gateway(&mode, request_with_id(&id), |req| handlers.delete(req))
            .await
            .unwrap();
        assert_eq!(deleted.status_code, 200);
        let body: Value = serde_json::from_str(&deleted.body).unwrap();
        assert_eq!(body["data"]["id"], id.as_str());

        let missing = run_gateway(&mode, request_with_id(&id), |req| handlers.get(req))
            .await
            .unwrap();
        assert_eq!(missing.status_code, 404);
        let body: Value = serde_json::from_str(&missing.body).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_requires_id() {
        let (handlers, _) = create_handlers();
        let err = handlers.delete(ApiRequest::default()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.details().unwrap()[0].field, "id");
    }
}

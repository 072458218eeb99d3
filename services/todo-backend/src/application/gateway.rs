//! ハンドラーラッパー
//!
//! 業務ハンドラーの結果とエラーを、呼び出し経路ごとの一様な形に変換する。
//! - HTTP: `{success, data}` / エラーエンベロープ + CORSヘッダー
//! - トリガー: イベントをそのまま返す / メッセージのみのエラー
//! - 直接呼び出し: 結果をそのまま返す / エラーエンベロープを値として返す

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::future::Future;

use lambda_http::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, ORIGIN,
};
use lambda_http::{Body, Request, RequestExt, Response};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, Instrument};

use crate::domain::{AppError, UserInfo};
use crate::infrastructure::{invocation_span, CorsConfig};

// ============================================================================
// ハンドラーの入出力
// ============================================================================

/// 業務ハンドラーの成功結果
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// 呼び出し経路に応じて包まれる値
    Data(Value),
    /// 完成済みのHTTPレスポンス（そのまま返す）
    Response(ApiResponse),
}

/// HTTPリクエストのうちハンドラーが参照する部分
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRequest {
    pub method: String,
    pub path_parameters: HashMap<String, String>,
    pub query_parameters: HashMap<String, String>,
    pub origin: Option<String>,
    pub body: Option<String>,
    /// オーソライザーが付与したクレーム
    pub claims: Option<Value>,
}

impl ApiRequest {
    /// lambda_httpのリクエストから変換
    pub fn from_http(request: &Request) -> Self {
        let path_parameters = request
            .path_parameters()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let query_parameters = request
            .query_string_parameters()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let origin = request
            .headers()
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = match request.body() {
            Body::Text(text) => Some(text.clone()),
            Body::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        };
        let claims = request
            .request_context_ref()
            .and_then(|ctx| serde_json::to_value(ctx).ok())
            .and_then(|ctx| {
                ctx.pointer("/authorizer/claims")
                    .or_else(|| ctx.pointer("/authorizer/jwt/claims"))
                    .cloned()
            })
            .filter(Value::is_object);

        Self {
            method: request.method().as_str().to_string(),
            path_parameters,
            query_parameters,
            origin,
            body,
            claims,
        }
    }

    /// ボディをJSONとしてパース
    ///
    /// # エラー
    /// * ボディ無し・空 → `BAD_REQUEST "Request body is missing"`
    /// * 不正なJSON → `BAD_REQUEST "Invalid JSON format"`
    pub fn json_body(&self) -> Result<Value, AppError> {
        let body = self
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| AppError::bad_request("Request body is missing"))?;
        serde_json::from_str(body).map_err(|_| AppError::bad_request("Invalid JSON format"))
    }

    /// 認証済みユーザー（クレームが無ければ `UNAUTHORIZED`）
    pub fn user_info(&self) -> Result<UserInfo, AppError> {
        UserInfo::from_claims(self.claims.as_ref())
    }
}

/// HTTPレスポンス
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn json(status_code: u16, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE.as_str().to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    /// `{ "success": true, "data": ... }`
    pub fn success(status_code: u16, data: Value) -> Self {
        Self::json(status_code, &json!({ "success": true, "data": data }))
    }

    pub fn ok(data: Value) -> Self {
        Self::success(200, data)
    }

    pub fn created(data: Value) -> Self {
        Self::success(201, data)
    }

    pub fn error(err: &AppError) -> Self {
        Self::json(err.status_code(), &err.to_envelope())
    }

    /// `statusCode` と `body` を持つ値を完成済みレスポンスとして解釈
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let status_code = obj
            .get("statusCode")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())?;
        let body = match obj.get("body")? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let headers = obj
            .get("headers")
            .and_then(Value::as_object)
            .map(|h| {
                h.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            status_code,
            headers,
            body,
        })
    }

    /// CORSヘッダーを付与（ハンドラーが設定済みのヘッダーは上書きしない）
    pub fn with_cors(mut self, cors: &CorsConfig, origin: Option<&str>) -> Self {
        if let Some(allowed) = cors.resolve_origin(origin) {
            self.headers
                .entry(ACCESS_CONTROL_ALLOW_ORIGIN.as_str().to_string())
                .or_insert(allowed);
        }
        self.headers
            .entry(ACCESS_CONTROL_ALLOW_CREDENTIALS.as_str().to_string())
            .or_insert_with(|| "true".to_string());
        self
    }

    /// lambda_httpのレスポンスに変換
    pub fn into_http(self) -> Result<Response<Body>, lambda_http::http::Error> {
        let mut builder = Response::builder().status(self.status_code);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Body::Text(self.body))
    }
}

// ============================================================================
// 呼び出し経路ごとの変換
// ============================================================================

/// 呼び出し経路ごとの成功・失敗の変換方法
pub trait GatewayMode {
    type Event: fmt::Debug;
    /// ハンドラー実行前にイベントから取り出しておく情報
    type Context;
    type Output;
    type Failure;

    const NAME: &'static str;

    fn context(&self, event: &Self::Event) -> Self::Context;

    fn on_success(
        &self,
        context: Self::Context,
        output: HandlerOutput,
    ) -> Result<Self::Output, Self::Failure>;

    fn on_error(&self, context: Self::Context, err: AppError) -> Result<Self::Output, Self::Failure>;
}

/// ハンドラーを実行し、結果を呼び出し経路の形に変換する
///
/// エラーはここで一度だけ捕捉してログに出力する。
pub async fn run_gateway<M, F, Fut>(
    mode: &M,
    event: M::Event,
    handler: F,
) -> Result<M::Output, M::Failure>
where
    M: GatewayMode,
    F: FnOnce(M::Event) -> Fut,
    Fut: Future<Output = Result<HandlerOutput, AppError>>,
{
    let span = invocation_span(M::NAME);
    span.in_scope(|| info!(event = ?event, "invocation started"));
    let context = mode.context(&event);

    match handler(event).instrument(span.clone()).await {
        Ok(output) => mode.on_success(context, output),
        Err(err) => {
            span.in_scope(|| {
                error!(
                    code = err.kind().code(),
                    status_code = err.status_code(),
                    error = %err,
                    details = ?err.details(),
                    "handler failed"
                )
            });
            mode.on_error(context, err)
        }
    }
}

/// lambda_httpのリクエストをハンドラーに渡し、HTTPレスポンスに変換する
///
/// ハンドラーの失敗はエラーエンベロープとして返るので、
/// ここで失敗するのはレスポンスの組み立てに失敗した場合のみ。
pub async fn serve_http<F, Fut>(
    cors: CorsConfig,
    request: Request,
    handler: F,
) -> Result<Response<Body>, lambda_http::http::Error>
where
    F: FnOnce(ApiRequest) -> Fut,
    Fut: Future<Output = Result<HandlerOutput, AppError>>,
{
    let mode = HttpMode::new(cors);
    let Ok(response) = run_gateway(&mode, ApiRequest::from_http(&request), handler).await;
    response.into_http()
}

/// REST API向け
#[derive(Debug, Clone, Default)]
pub struct HttpMode {
    cors: CorsConfig,
}

impl HttpMode {
    pub fn new(cors: CorsConfig) -> Self {
        Self { cors }
    }
}

impl GatewayMode for HttpMode {
    type Event = ApiRequest;
    type Context = Option<String>;
    type Output = ApiResponse;
    type Failure = Infallible;

    const NAME: &'static str = "http";

    fn context(&self, event: &ApiRequest) -> Option<String> {
        event.origin.clone()
    }

    fn on_success(
        &self,
        origin: Option<String>,
        output: HandlerOutput,
    ) -> Result<ApiResponse, Infallible> {
        let response = match output {
            HandlerOutput::Response(response) => response,
            HandlerOutput::Data(data) => {
                ApiResponse::from_value(&data).unwrap_or_else(|| ApiResponse::success(200, data))
            }
        };
        Ok(response.with_cors(&self.cors, origin.as_deref()))
    }

    fn on_error(&self, origin: Option<String>, err: AppError) -> Result<ApiResponse, Infallible> {
        Ok(ApiResponse::error(&err).with_cors(&self.cors, origin.as_deref()))
    }
}

/// 認証トリガー失敗時のエラー（メッセージのみ）
///
/// トリガーの呼び出し元はエラーメッセージしか受け取れないため、
/// コードと詳細はここで落ちる。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TriggerFailure(pub String);

/// 認証トリガー・EventBridge向け
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerMode;

impl GatewayMode for TriggerMode {
    type Event = Value;
    type Context = ();
    type Output = Value;
    type Failure = TriggerFailure;

    const NAME: &'static str = "trigger";

    fn context(&self, _event: &Value) {}

    fn on_success(&self, _context: (), output: HandlerOutput) -> Result<Value, TriggerFailure> {
        match output {
            HandlerOutput::Data(value) => Ok(value),
            HandlerOutput::Response(response) => serde_json::to_value(response)
                .map_err(|e| TriggerFailure(e.to_string())),
        }
    }

    fn on_error(&self, _context: (), err: AppError) -> Result<Value, TriggerFailure> {
        Err(TriggerFailure(err.message().to_string()))
    }
}

/// DB操作ゲートウェイの直接呼び出し向け
///
/// 失敗時もエラーエンベロープを関数の戻り値として返し、
/// 呼び出し側クライアントが構造化エラーを復元できるようにする。
#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeMode;

impl GatewayMode for InvokeMode {
    type Event = Value;
    type Context = ();
    type Output = Value;
    type Failure = Infallible;

    const NAME: &'static str = "invoke";

    fn context(&self, _event: &Value) {}

    fn on_success(&self, _context: (), output: HandlerOutput) -> Result<Value, Infallible> {
        Ok(match output {
            HandlerOutput::Data(value) => value,
            HandlerOutput::Response(response) => {
                serde_json::to_value(response).unwrap_or(Value::Null)
            }
        })
    }

    fn on_error(&self, _context: (), err: AppError) -> Result<Value, Infallible> {
        Ok(err.to_envelope())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, FieldViolation};
    use crate::infrastructure::init_test_logging;

    fn allow_list() -> CorsConfig {
        CorsConfig {
            allowed_origins: vec!["https://app.example.com".to_string()],
        }
    }

    fn body_json(response: &ApiResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    // ==================== ApiRequest ====================

    #[test]
    fn test_json_body_missing() {
        let request = ApiRequest::default();
        let err = request.json_body().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "Request body is missing");

        let blank = ApiRequest {
            body: Some("  ".to_string()),
            ..ApiRequest::default()
        };
        assert_eq!(blank.json_body().unwrap_err().message(), "Request body is missing");
    }

    #[test]
    fn test_json_body_invalid() {
        let request = ApiRequest {
            body: Some("{title:".to_string()),
            ..ApiRequest::default()
        };
        assert_eq!(request.json_body().unwrap_err().message(), "Invalid JSON format");
    }

    #[test]
    fn test_from_http_request() {
        let request = lambda_http::http::Request::builder()
            .method("PUT")
            .uri("/v0/todos/t-1?limit=5")
            .header("Origin", "https://app.example.com")
            .body(Body::from(r#"{"title":"x"}"#))
            .unwrap()
            .with_path_parameters(HashMap::from([("id".to_string(), "t-1".to_string())]))
            .with_query_string_parameters(HashMap::from([(
                "limit".to_string(),
                "5".to_string(),
            )]));

        let api_request = ApiRequest::from_http(&request);

        assert_eq!(api_request.method, "PUT");
        assert_eq!(api_request.path_parameters.get("id").map(String::as_str), Some("t-1"));
        assert_eq!(api_request.query_parameters.get("limit").map(String::as_str), Some("5"));
        assert_eq!(api_request.origin.as_deref(), Some("https://app.example.com"));
        assert_eq!(api_request.json_body().unwrap()["title"], "x");
        assert_eq!(api_request.claims, None);
    }

    // ==================== ApiResponse ====================

    #[test]
    fn test_cors_headers() {
        let response = ApiResponse::success(200, json!({})).with_cors(&allow_list(), Some("https://app.example.com"));
        assert_eq!(response.headers["access-control-allow-origin"], "https://app.example.com");
        assert_eq!(response.headers["access-control-allow-credentials"], "true");
        assert_eq!(response.headers["content-type"], "application/json");

        let denied = ApiResponse::success(200, json!({})).with_cors(&allow_list(), Some("https://evil.example.com"));
        assert!(!denied.headers.contains_key("access-control-allow-origin"));

        let no_origin = ApiResponse::success(200, json!({})).with_cors(&allow_list(), None);
        assert_eq!(no_origin.headers["access-control-allow-origin"], "*");
    }

    #[test]
    fn test_into_http_response() {
        let response = ApiResponse::created(json!({"id": "t-1"}))
            .with_cors(&CorsConfig::default(), None)
            .into_http()
            .unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body = match response.body() {
            Body::Text(text) => text.clone(),
            _ => panic!("予期しないBody型"),
        };
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, json!({"success": true, "data": {"id": "t-1"}}));
    }

    // ==================== HttpMode ====================

    #[tokio::test]
    async fn test_http_mode_wraps_data() {
        init_test_logging();
        let mode = HttpMode::new(CorsConfig::default());

        let response = run_gateway(&mode, ApiRequest::default(), |_req| async {
            Ok(HandlerOutput::Data(json!({"id": "t-1"})))
        })
        .await
        .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(body_json(&response), json!({"success": true, "data": {"id": "t-1"}}));
    }

    #[tokio::test]
    async fn test_http_mode_passes_envelope_through() {
        let mode = HttpMode::new(CorsConfig::default());

        let response = run_gateway(&mode, ApiRequest::default(), |_req| async {
            Ok(HandlerOutput::Data(json!({"statusCode": 201, "body": "{}"})))
        })
        .await
        .unwrap();

        assert_eq!(response.status_code, 201);
        assert_eq!(response.body, "{}");
    }

    #[tokio::test]
    async fn test_http_mode_passes_response_through() {
        let mode = HttpMode::new(allow_list());
        let mut ready = ApiResponse::json(204, &json!(null));
        ready
            .headers
            .insert("access-control-allow-origin".to_string(), "https://fixed.example.com".to_string());

        let response = run_gateway(&mode, ApiRequest::default(), |_req| {
            let ready = ready.clone();
            async move { Ok(HandlerOutput::Response(ready)) }
        })
        .await
        .unwrap();

        assert_eq!(response.status_code, 204);
        assert_eq!(response.body, "null");
        assert_eq!(response.headers["access-control-allow-origin"], "https://fixed.example.com");
    }

    #[tokio::test]
    async fn test_http_mode_error_envelope() {
        let mode = HttpMode::new(CorsConfig::default());

        let response = run_gateway(&mode, ApiRequest::default(), |_req| async {
            Err(AppError::validation(vec![FieldViolation::new(
                "title",
                "Title is required",
                "too_small",
            )]))
        })
        .await
        .unwrap();

        assert_eq!(response.status_code, 400);
        let body = body_json(&response);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["message"], "Schema validation failed");
        assert_eq!(body["errors"][0]["field"], "title");
        assert_eq!(response.headers["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_serve_http_reads_request_and_builds_response() {
        let request = lambda_http::http::Request::builder()
            .method("GET")
            .uri("/v0/todos/t-9")
            .header("Origin", "https://app.example.com")
            .body(Body::Empty)
            .unwrap()
            .with_path_parameters(HashMap::from([("id".to_string(), "t-9".to_string())]));

        let response = serve_http(allow_list(), request, |req| async move {
            let id = req.path_parameters.get("id").cloned().unwrap_or_default();
            Err::<HandlerOutput, _>(AppError::not_found(format!("Todo with id '{}' not found", id)))
        })
        .await
        .unwrap();

        assert_eq!(response.status(), 404);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );
        let body: Value = match response.body() {
            Body::Text(text) => serde_json::from_str(text).unwrap(),
            _ => panic!("予期しないBody型"),
        };
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "Todo with id 't-9' not found");
    }

    // ==================== TriggerMode ====================

    #[tokio::test]
    async fn test_trigger_mode_returns_event() {
        let event = json!({"triggerSource": "PreSignUp_SignUp", "response": {}});

        let result = run_gateway(&TriggerMode, event.clone(), |event| async move {
            Ok(HandlerOutput::Data(event))
        })
        .await
        .unwrap();

        assert_eq!(result, event);
    }

    #[tokio::test]
    async fn test_trigger_mode_downgrades_error_to_message() {
        let result = run_gateway(&TriggerMode, json!({}), |_event| async {
            Err(AppError::validation(vec![FieldViolation::new(
                "email",
                "Invalid email",
                "invalid_string",
            )]))
        })
        .await;

        // コードと詳細は失われ、メッセージのみが残る
        let failure = result.unwrap_err();
        assert_eq!(failure, TriggerFailure("Schema validation failed".to_string()));
        assert_eq!(failure.to_string(), "Schema validation failed");
    }

    // ==================== InvokeMode ====================

    #[tokio::test]
    async fn test_invoke_mode_returns_envelope_as_value() {
        let ok = run_gateway(&InvokeMode, json!({}), |_event| async {
            Ok(HandlerOutput::Data(json!({"item": null})))
        })
        .await
        .unwrap();
        assert_eq!(ok, json!({"item": null}));

        let failed = run_gateway(&InvokeMode, json!({}), |_event| async {
            Err(AppError::conflict("Item with id 'x' already exists"))
        })
        .await
        .unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["statusCode"], 409);
        assert_eq!(AppError::from_envelope(&failed).unwrap().kind(), ErrorKind::Conflict);
    }
}

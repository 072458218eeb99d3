/// アプリケーション共通のエラー型
///
/// 全てのLambda関数で共有する `(kind, message, details)` の3要素で
/// エラーを表現する。HTTPレスポンスやトリガー応答への変換は
/// ゲートウェイラッパー側の責務とする。
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// エラー種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// 不正な入力（スキーマ違反、未知のアクション等）
    BadRequest,
    /// 認証情報の欠落・不正
    Unauthorized,
    /// 権限不足
    Forbidden,
    /// 対象レコードが存在しない
    NotFound,
    /// 同一IDのレコードが既に存在する
    Conflict,
    /// テーブル名や環境変数が未設定
    ConfigurationMissing,
    /// 想定外のエラー（ストレージ層の失敗を含む）
    Internal,
}

impl ErrorKind {
    /// 対応するHTTPステータスコード
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::ConfigurationMissing => 500,
            ErrorKind::Internal => 500,
        }
    }

    /// 機械可読なエラーコード文字列
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::ConfigurationMissing => "CONFIGURATION_MISSING",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// エラーコード文字列から種別を復元
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "BAD_REQUEST" => Some(ErrorKind::BadRequest),
            "UNAUTHORIZED" => Some(ErrorKind::Unauthorized),
            "FORBIDDEN" => Some(ErrorKind::Forbidden),
            "NOT_FOUND" => Some(ErrorKind::NotFound),
            "CONFLICT" => Some(ErrorKind::Conflict),
            "CONFIGURATION_MISSING" => Some(ErrorKind::ConfigurationMissing),
            "INTERNAL" => Some(ErrorKind::Internal),
            _ => None,
        }
    }
}

/// フィールド単位のバリデーション違反
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// 違反したフィールドのパス（ネストはドット区切り）
    pub field: String,
    /// 人間向けメッセージ
    pub message: String,
    /// 違反コード（例: "too_small", "invalid_type"）
    pub code: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// アプリケーションエラー
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    details: Option<Vec<FieldViolation>>,
}

impl AppError {
    /// 新しいAppErrorを作成
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// フィールド違反の詳細を付与
    pub fn with_details(mut self, details: Vec<FieldViolation>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn configuration_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationMissing, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// スキーマ検証失敗（400、フィールド違反付き）
    pub fn validation(details: Vec<FieldViolation>) -> Self {
        Self::bad_request("Schema validation failed").with_details(details)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&[FieldViolation]> {
        self.details.as_deref()
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// エラーエンベロープ（`success: false`）としてJSON化
    ///
    /// `errors` はフィールド違反がある場合のみ含める。
    pub fn to_envelope(&self) -> Value {
        let mut body = json!({
            "success": false,
            "statusCode": self.status_code(),
            "code": self.kind.code(),
            "message": self.message,
        });
        if let Some(details) = &self.details {
            body["errors"] = json!(details);
        }
        body
    }

    /// エラーエンベロープからAppErrorを復元
    ///
    /// `success: false` と既知の `code` を持たない値は `None`。
    pub fn from_envelope(value: &Value) -> Option<Self> {
        if value.get("success").and_then(Value::as_bool) != Some(false) {
            return None;
        }
        let kind = value
            .get("code")
            .and_then(Value::as_str)
            .and_then(ErrorKind::from_code)?;
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut error = Self::new(kind, message);
        if let Some(errors) = value.get("errors") {
            if let Ok(details) = serde_json::from_value::<Vec<FieldViolation>>(errors.clone()) {
                error = error.with_details(details);
            }
        }
        Some(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::BadRequest.status_code(), 400);
        assert_eq!(ErrorKind::Unauthorized.status_code(), 401);
        assert_eq!(ErrorKind::Forbidden.status_code(), 403);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::ConfigurationMissing.status_code(), 500);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }

    #[test]
    fn test_code_roundtrip_for_every_kind() {
        let kinds = [
            ErrorKind::BadRequest,
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::ConfigurationMissing,
            ErrorKind::Internal,
        ];
        for kind in kinds {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("TEAPOT"), None);
    }

    #[test]
    fn test_display_is_message_only() {
        let error = AppError::conflict("Record already exists: abc");
        assert_eq!(error.to_string(), "Record already exists: abc");
    }

    #[test]
    fn test_envelope_without_details() {
        let body = AppError::not_found("Todo not found: 1").to_envelope();

        assert_eq!(body["success"], false);
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "Todo not found: 1");
        assert!(body.get("errors").is_none());
    }

    #[test]
    fn test_envelope_with_details() {
        let error = AppError::validation(vec![FieldViolation::new(
            "title",
            "Title is required",
            "too_small",
        )]);
        let body = error.to_envelope();

        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["message"], "Schema validation failed");
        assert_eq!(body["errors"][0]["field"], "title");
        assert_eq!(body["errors"][0]["code"], "too_small");
    }

    #[test]
    fn test_from_envelope_restores_kind_and_details() {
        let error = AppError::validation(vec![FieldViolation::new(
            "email",
            "Invalid email",
            "invalid_string",
        )]);
        let restored = AppError::from_envelope(&error.to_envelope()).unwrap();

        assert_eq!(restored, error);
    }

    #[test]
    fn test_from_envelope_ignores_success_values() {
        assert!(AppError::from_envelope(&json!({"item": {"id": "1"}})).is_none());
        assert!(AppError::from_envelope(&json!({"success": true, "data": 1})).is_none());
        assert!(AppError::from_envelope(&json!({"success": false, "code": "??"})).is_none());
    }
}

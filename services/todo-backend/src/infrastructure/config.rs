/// 環境変数からの設定読み込み
///
/// 各Lambda関数の `main` で1度だけ構築し、参照で各コンポーネントへ渡す。
/// ビジネスロジック内では環境変数を直接読まない。
///
/// 環境変数:
/// - TODO_TABLE_NAME / USER_TABLE_NAME: 論理テーブルに対応する物理テーブル名
/// - ALLOWED_ORIGINS: CORS許可オリジン（カンマ区切り、`*`で全許可）
/// - MEDIA_BUCKET / ALLOWED_TYPES / MAX_SIZE / SIGNED_URL_EXPIRE_IN: アップロードURL発行
/// - DB_LAMBDA_NAME: DB操作ゲートウェイLambdaの関数名
/// - EVENT_BUS_NAME / ADMIN_EMAIL_DOMAIN: 確認後トリガー
use aws_config::SdkConfig;
use thiserror::Error;

use crate::domain::{AppError, LogicalTable};

/// 設定読み込みのエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::configuration_missing(err.to_string())
    }
}

/// AWS SDK共通設定を読み込む（認証情報、リージョンなど）
pub async fn load_aws_config() -> SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}

/// 空文字は未設定として扱う
fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_u64<F>(lookup: &F, name: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, name) {
        None => Ok(default),
        Some(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

// ============================================================================
// テーブル名
// ============================================================================

/// 論理テーブル名 → 物理テーブル名の対応
///
/// 読み込み時点では未設定を許容し、解決時に `CONFIGURATION_MISSING` とする。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableConfig {
    todo_table: Option<String>,
    user_table: Option<String>,
}

impl TableConfig {
    pub const TODO_TABLE_VAR: &'static str = "TODO_TABLE_NAME";
    pub const USER_TABLE_VAR: &'static str = "USER_TABLE_NAME";

    pub fn new(todo_table: Option<String>, user_table: Option<String>) -> Self {
        Self {
            todo_table,
            user_table,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            todo_table: non_empty(&lookup, Self::TODO_TABLE_VAR),
            user_table: non_empty(&lookup, Self::USER_TABLE_VAR),
        }
    }

    /// 物理テーブル名を取得（空文字・未設定は `None`）
    pub fn physical_name(&self, table: LogicalTable) -> Option<&str> {
        let name = match table {
            LogicalTable::Todo => self.todo_table.as_deref(),
            LogicalTable::User => self.user_table.as_deref(),
        };
        name.filter(|n| !n.trim().is_empty())
    }
}

// ============================================================================
// CORS
// ============================================================================

/// CORS許可オリジン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl CorsConfig {
    pub const ALLOWED_ORIGINS_VAR: &'static str = "ALLOWED_ORIGINS";

    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match non_empty(&lookup, Self::ALLOWED_ORIGINS_VAR) {
            Some(value) => Self {
                allowed_origins: split_list(&value),
            },
            None => Self::default(),
        }
    }

    pub fn allows_all(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    /// `Access-Control-Allow-Origin` に設定する値を決定
    ///
    /// * Originヘッダー無し → `*`
    /// * `*` を許可 → `*`
    /// * 許可リストに含まれる → そのオリジン
    /// * それ以外 → `None`（ヘッダーを付与しない）
    pub fn resolve_origin(&self, origin: Option<&str>) -> Option<String> {
        let Some(origin) = origin else {
            return Some("*".to_string());
        };
        if self.allows_all() {
            Some("*".to_string())
        } else if self.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_string())
        } else {
            None
        }
    }
}

// ============================================================================
// アップロードURL
// ============================================================================

/// 署名付きアップロードURLの発行設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub bucket: String,
    pub allowed_types: Vec<String>,
    /// 最大サイズ（バイト）
    pub max_size: u64,
    /// 署名付きURLの有効期間（秒）
    pub expires_in_secs: u64,
}

impl UploadConfig {
    pub const DEFAULT_ALLOWED_TYPES: &'static str = "image/jpeg,image/png,image/webp";
    pub const DEFAULT_MAX_SIZE: u64 = 3 * 1024 * 1024;
    pub const DEFAULT_EXPIRES_IN_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = required(&lookup, "MEDIA_BUCKET")?;
        let allowed_types = split_list(
            &non_empty(&lookup, "ALLOWED_TYPES")
                .unwrap_or_else(|| Self::DEFAULT_ALLOWED_TYPES.to_string()),
        );
        let max_size = parse_u64(&lookup, "MAX_SIZE", Self::DEFAULT_MAX_SIZE)?;
        let expires_in_secs =
            parse_u64(&lookup, "SIGNED_URL_EXPIRE_IN", Self::DEFAULT_EXPIRES_IN_SECS)?;

        Ok(Self {
            bucket,
            allowed_types,
            max_size,
            expires_in_secs,
        })
    }
}

// ============================================================================
// DB操作ゲートウェイの呼び出し先
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub function_name: String,
}

impl DispatcherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            function_name: required(&lookup, "DB_LAMBDA_NAME")?,
        })
    }
}

// ============================================================================
// 認証トリガー
// ============================================================================

/// 確認後トリガーの設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    /// このドメインのメールアドレスは `admin` グループに割り当てる
    pub admin_email_domain: Option<String>,
    /// 設定時はUserCreatedイベントを発行、未設定時は直接書き込む
    pub event_bus_name: Option<String>,
}

impl IdentityConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            admin_email_domain: non_empty(&lookup, "ADMIN_EMAIL_DOMAIN")
                .map(|d| d.to_ascii_lowercase()),
            event_bus_name: non_empty(&lookup, "EVENT_BUS_NAME"),
        }
    }
}

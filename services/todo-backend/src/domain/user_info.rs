/// 認証済みユーザー情報
///
/// API Gatewayのオーソライザーが付与するCognitoクレームから組み立てる。
use serde_json::Value;

use super::AppError;

/// 認証済みユーザー情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Cognitoの `sub`
    pub user_id: String,
    pub username: String,
    pub groups: Vec<String>,
}

impl UserInfo {
    /// クレームからユーザー情報を取得
    ///
    /// # エラー
    /// クレームまたは `sub` が無い場合は `UNAUTHORIZED`
    pub fn from_claims(claims: Option<&Value>) -> Result<Self, AppError> {
        let claims = claims
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::unauthorized("unauthenticated"))?;

        let user_id = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::unauthorized("unauthenticated"))?
            .to_string();

        let username = claims
            .get("cognito:username")
            .or_else(|| claims.get("username"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let groups = parse_groups(claims.get("cognito:groups"));

        Ok(Self {
            user_id,
            username,
            groups,
        })
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// グループは配列またはカンマ区切り文字列で届く
fn parse_groups(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

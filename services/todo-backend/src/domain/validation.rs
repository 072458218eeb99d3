/// JSONオブジェクトのフィールド検証
///
/// 1つのオブジェクトに対してフィールドを順に読み出し、違反を蓄積する。
/// 最後に `finish()` で違反があれば `BAD_REQUEST`（詳細付き）を返す。
use serde_json::Value;

use super::{AppError, FieldViolation, Record};

/// 違反コード
pub const INVALID_TYPE: &str = "invalid_type";
pub const TOO_SMALL: &str = "too_small";
pub const INVALID_ENUM_VALUE: &str = "invalid_enum_value";
pub const INVALID_STRING: &str = "invalid_string";
pub const UNRECOGNIZED_KEYS: &str = "unrecognized_keys";

/// JSON値の型名
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// オブジェクトであることを確認して取り出す
pub fn expect_object(value: &Value) -> Result<&Record, AppError> {
    value.as_object().ok_or_else(|| {
        AppError::validation(vec![FieldViolation::new(
            "",
            format!("Expected object, received {}", type_name(value)),
            INVALID_TYPE,
        )])
    })
}

/// フィールド検証器
pub struct ObjectValidator<'a> {
    obj: &'a Record,
    violations: Vec<FieldViolation>,
}

impl<'a> ObjectValidator<'a> {
    pub fn new(obj: &'a Record) -> Self {
        Self {
            obj,
            violations: Vec::new(),
        }
    }

    fn violation(&mut self, field: &str, message: impl Into<String>, code: &str) {
        self.violations.push(FieldViolation::new(field, message, code));
    }

    /// 値を取り出す（`null` は未設定扱い）
    fn present(&self, field: &str) -> Option<&'a Value> {
        self.obj.get(field).filter(|v| !v.is_null())
    }

    fn string_value(&mut self, field: &str, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.violation(
                    field,
                    format!("Expected string, received {}", type_name(value)),
                    INVALID_TYPE,
                );
                None
            }
        }
    }

    /// 必須文字列（前後空白を除去した上で空文字不可）
    pub fn required_trimmed(&mut self, field: &str, empty_message: &str) -> Option<String> {
        match self.present(field) {
            Some(value) => self.trimmed_value(field, value, empty_message),
            None => {
                self.violation(field, "Required", INVALID_TYPE);
                None
            }
        }
    }

    /// 任意文字列（指定時は前後空白を除去した上で空文字不可）
    pub fn optional_trimmed(&mut self, field: &str, empty_message: &str) -> Option<String> {
        let value = self.present(field)?;
        self.trimmed_value(field, value, empty_message)
    }

    fn trimmed_value(&mut self, field: &str, value: &Value, empty_message: &str) -> Option<String> {
        let s = self.string_value(field, value)?;
        let trimmed = s.trim();
        if trimmed.is_empty() {
            self.violation(field, empty_message, TOO_SMALL);
            return None;
        }
        Some(trimmed.to_string())
    }

    /// 任意文字列（内容の制約なし）
    pub fn optional_string(&mut self, field: &str) -> Option<String> {
        let value = self.present(field)?;
        self.string_value(field, value)
    }

    /// 任意の列挙値
    pub fn optional_enum(&mut self, field: &str, allowed: &[&str]) -> Option<String> {
        let value = self.present(field)?;
        let s = self.string_value(field, value)?;
        if allowed.contains(&s.as_str()) {
            return Some(s);
        }
        let expected = allowed
            .iter()
            .map(|v| format!("'{}'", v))
            .collect::<Vec<_>>()
            .join(" | ");
        self.violation(
            field,
            format!("Invalid enum value. Expected {}, received '{}'", expected, s),
            INVALID_ENUM_VALUE,
        );
        None
    }

    /// 任意の文字列配列（要素の違反は `field.index` で報告）
    pub fn optional_string_array(&mut self, field: &str) -> Option<Vec<String>> {
        let value = self.present(field)?;
        let Some(items) = value.as_array() else {
            self.violation(
                field,
                format!("Expected array, received {}", type_name(value)),
                INVALID_TYPE,
            );
            return None;
        };

        let mut result = Vec::with_capacity(items.len());
        let mut valid = true;
        for (index, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => result.push(s.to_string()),
                None => {
                    valid = false;
                    self.violation(
                        &format!("{}.{}", field, index),
                        format!("Expected string, received {}", type_name(item)),
                        INVALID_TYPE,
                    );
                }
            }
        }
        valid.then_some(result)
    }

    /// 必須のメールアドレス
    pub fn required_email(&mut self, field: &str) -> Option<String> {
        let Some(value) = self.present(field) else {
            self.violation(field, "Required", INVALID_TYPE);
            return None;
        };
        let s = self.string_value(field, value)?;
        if is_valid_email(&s) {
            Some(s)
        } else {
            self.violation(field, "Invalid email", INVALID_STRING);
            None
        }
    }

    /// 任意のURL（http/httpsのみ）
    pub fn optional_url(&mut self, field: &str) -> Option<String> {
        let value = self.present(field)?;
        let s = self.string_value(field, value)?;
        match url::Url::parse(&s) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(s),
            _ => {
                self.violation(field, "Invalid url", INVALID_STRING);
                None
            }
        }
    }

    /// 文字列から整数へ変換して読み出す（クエリパラメータ用）
    ///
    /// `min` 未満は `too_small`。
    pub fn optional_coerced_int(&mut self, field: &str, min: i64) -> Option<i64> {
        let value = self.present(field)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(number) = parsed.filter(|n| n.is_finite()) else {
            self.violation(field, "Expected number, received nan", INVALID_TYPE);
            return None;
        };
        if number.fract() != 0.0 {
            self.violation(field, "Expected integer, received float", INVALID_TYPE);
            return None;
        }
        let number = number as i64;
        if number < min {
            let message = if min == 0 {
                "Number must be greater than or equal to 0".to_string()
            } else {
                format!("Number must be greater than {}", min - 1)
            };
            self.violation(field, message, TOO_SMALL);
            return None;
        }
        Some(number)
    }

    /// 未知のキーを拒否（strictスキーマ用）
    pub fn reject_unknown_keys(&mut self, known: &[&str]) {
        let unknown: Vec<String> = self
            .obj
            .keys()
            .filter(|k| !known.contains(&k.as_str()))
            .map(|k| format!("'{}'", k))
            .collect();
        if !unknown.is_empty() {
            self.violation(
                "",
                format!("Unrecognized key(s) in object: {}", unknown.join(", ")),
                UNRECOGNIZED_KEYS,
            );
        }
    }

    /// 検証結果を確定
    pub fn finish(self) -> Result<(), AppError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(self.violations))
        }
    }
}

/// 簡易メールアドレス検証
///
/// ローカル部とドメイン部が空でなく、ドメインにドットを含み、空白を含まないこと。
pub fn is_valid_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
}

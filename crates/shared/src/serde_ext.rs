//! serde 辅助函数
//!
//! 后台接口返回的 ID 有时是字符串（`"1"`），有时是数字（`1`），
//! 这里统一反序列化为字符串。表单里的数字输入框提交的也是字符串。

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

/// 将字符串或数字反序列化为 `String`
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

/// 可选版本：缺失或 `null` 时返回 `None`
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<StringOrNumber>::deserialize(deserializer)
        .map(|v| v.map(StringOrNumber::into_string))
}

/// 表单数字字段：接受数字或数字字符串，空字符串和 `null` 视为未填写
pub fn opt_int_from_form<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Int(n)) => Ok(Some(n)),
        Some(StringOrNumber::Float(f)) if f.is_finite() && f.fract() == 0.0 => Ok(Some(f as i64)),
        Some(StringOrNumber::Float(f)) => Err(D::Error::custom(format!("期望整数，实际为 {}", f))),
        Some(StringOrNumber::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("期望整数，实际为 '{}'", s)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Item {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "opt_string_or_number")]
        parent_id: Option<String>,
    }

    #[test]
    fn test_string_id() {
        let item: Item = serde_json::from_str(r#"{"id": "rule-1"}"#).unwrap();
        assert_eq!(item.id, "rule-1");
        assert!(item.parent_id.is_none());
    }

    #[test]
    fn test_numeric_id() {
        let item: Item = serde_json::from_str(r#"{"id": 42, "parent_id": 7}"#).unwrap();
        assert_eq!(item.id, "42");
        assert_eq!(item.parent_id.as_deref(), Some("7"));
    }

    #[derive(Deserialize)]
    struct Form {
        #[serde(default, deserialize_with = "opt_int_from_form")]
        priority: Option<i64>,
    }

    #[test]
    fn test_form_integer() {
        let parse = |json: &str| serde_json::from_str::<Form>(json).map(|f| f.priority);
        assert_eq!(parse(r#"{"priority": 150}"#).unwrap(), Some(150));
        assert_eq!(parse(r#"{"priority": " 150 "}"#).unwrap(), Some(150));
        assert_eq!(parse(r#"{"priority": 150.0}"#).unwrap(), Some(150));
        assert_eq!(parse(r#"{"priority": ""}"#).unwrap(), None);
        assert_eq!(parse(r#"{"priority": null}"#).unwrap(), None);
        assert_eq!(parse("{}").unwrap(), None);
        assert!(parse(r#"{"priority": "high"}"#).is_err());
        assert!(parse(r#"{"priority": 1.5}"#).is_err());
    }

    #[test]
    fn test_null_parent() {
        let item: Item = serde_json::from_str(r#"{"id": 1, "parent_id": null}"#).unwrap();
        assert!(item.parent_id.is_none());
    }
}

//! 规则操作符、取值来源和转换函数定义

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// 条件操作符
///
/// 驼峰别名来自集成响应校验编辑器（`notEquals`、`greaterThan` 等）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    #[serde(alias = "notEquals")]
    NotEquals,
    Contains,
    In,
    #[serde(alias = "notIn")]
    NotIn,
    #[serde(alias = "greaterThan")]
    GreaterThan,
    #[serde(alias = "lessThan")]
    LessThan,
    #[serde(alias = "regex", alias = "matchesRegex")]
    MatchesRegex,
    Exists,
}

impl Operator {
    /// 是否需要配置比较值
    pub fn requires_value(self) -> bool {
        !matches!(self, Self::Exists)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::MatchesRegex => "matches_regex",
            Self::Exists => "exists",
        };
        write!(f, "{}", s)
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// 条件取值来源：决定 property_path 在入站请求的哪一部分解析
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[default]
    BodyJson,
    BodyText,
    Header,
    #[serde(alias = "query_param")]
    UrlParameter,
    Path,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BodyJson => "body_json",
            Self::BodyText => "body_text",
            Self::Header => "header",
            Self::UrlParameter => "url_parameter",
            Self::Path => "path",
        };
        write!(f, "{}", s)
    }
}

/// 比较前对取值的规范化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Lowercase,
    Uppercase,
    Trim,
    Number,
    Boolean,
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::Trim => "trim",
            Self::Number => "number",
            Self::Boolean => "boolean",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lowercase" => Ok(Self::Lowercase),
            "uppercase" => Ok(Self::Uppercase),
            "trim" => Ok(Self::Trim),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            other => Err(format!("未知的转换函数: {}", other)),
        }
    }
}

/// 反序列化可选转换函数：`null`、`""` 和 `"none"` 都表示不转换
pub fn deserialize_transform<'de, D>(deserializer: D) -> Result<Option<Transform>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("none") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_aliases() {
        let op: Operator = serde_json::from_str(r#""greaterThan""#).unwrap();
        assert_eq!(op, Operator::GreaterThan);
        let op: Operator = serde_json::from_str(r#""regex""#).unwrap();
        assert_eq!(op, Operator::MatchesRegex);
        let op: Operator = serde_json::from_str(r#""not_in""#).unwrap();
        assert_eq!(op, Operator::NotIn);
    }

    #[test]
    fn test_property_type_alias() {
        let pt: PropertyType = serde_json::from_str(r#""query_param""#).unwrap();
        assert_eq!(pt, PropertyType::UrlParameter);
    }

    #[test]
    fn test_logical_operator_case() {
        let op: LogicalOperator = serde_json::from_str(r#""OR""#).unwrap();
        assert_eq!(op, LogicalOperator::Or);
        let op: LogicalOperator = serde_json::from_str(r#""and""#).unwrap();
        assert_eq!(op, LogicalOperator::And);
    }

    #[test]
    fn test_transform_parse() {
        assert_eq!("lowercase".parse::<Transform>().unwrap(), Transform::Lowercase);
        assert!("reverse".parse::<Transform>().is_err());
    }
}

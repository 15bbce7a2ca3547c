//! 取值转换
//!
//! 转换失败不是错误，只会让所在条件不匹配。

use crate::operators::Transform;
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{transform} 转换失败: {reason}")]
pub struct TransformError {
    pub transform: Transform,
    pub reason: String,
}

impl TransformError {
    fn new(transform: Transform, reason: impl Into<String>) -> Self {
        Self {
            transform,
            reason: reason.into(),
        }
    }
}

impl Transform {
    /// 对取到的值做规范化，`None` 表示取值缺失
    pub fn apply(self, value: Option<Value>) -> Result<Option<Value>, TransformError> {
        match self {
            Self::Lowercase => Ok(value.map(|v| map_string(v, |s| s.to_lowercase()))),
            Self::Uppercase => Ok(value.map(|v| map_string(v, |s| s.to_uppercase()))),
            Self::Trim => Ok(value.map(|v| map_string(v, |s| s.trim().to_string()))),
            Self::Number => to_number(value).map(Some),
            Self::Boolean => to_boolean(value).map(Some),
        }
    }
}

fn map_string(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn to_number(value: Option<Value>) -> Result<Value, TransformError> {
    match value {
        Some(Value::Number(n)) => Ok(Value::Number(n)),
        Some(Value::String(s)) => parse_number(s.trim())
            .map(Value::Number)
            .ok_or_else(|| TransformError::new(Transform::Number, format!("'{}' 不是数字", s))),
        Some(other) => Err(TransformError::new(
            Transform::Number,
            format!("不支持的取值类型: {}", other),
        )),
        None => Err(TransformError::new(Transform::Number, "取值缺失")),
    }
}

fn to_boolean(value: Option<Value>) -> Result<Value, TransformError> {
    match value {
        Some(Value::Bool(b)) => Ok(Value::Bool(b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(TransformError::new(
                Transform::Boolean,
                format!("'{}' 不是布尔值", s),
            )),
        },
        Some(other) => Err(TransformError::new(
            Transform::Boolean,
            format!("不支持的取值类型: {}", other),
        )),
        None => Err(TransformError::new(Transform::Boolean, "取值缺失")),
    }
}

/// 整数（i64、u64）优先，其次浮点；NaN 和无穷大视为非法
pub(crate) fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Number::from(u));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

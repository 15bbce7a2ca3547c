//! 条件评估器
//!
//! 取值、转换、比较三步。任何一步失败只让当前条件不匹配，不会向上抛错。

use crate::compiler::{CompiledCondition, ExpectedValue, Literal};
use crate::context::RequestContext;
use crate::operators::Operator;
use serde_json::{Number, Value};
use tracing::debug;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 针对请求上下文评估一个条件
    pub fn evaluate(condition: &CompiledCondition, context: &RequestContext) -> bool {
        let cond = &condition.condition;
        let extracted = context.extract(cond.property_type, &cond.property_path);

        let value = match cond.transform {
            Some(transform) => match transform.apply(extracted) {
                Ok(v) => v,
                Err(e) => {
                    debug!(property_path = %cond.property_path, error = %e, "转换失败，条件不匹配");
                    return false;
                }
            },
            None => extracted,
        };

        Self::compare(value.as_ref(), cond.operator, &condition.expected)
    }

    /// 比较取到的值与期望值，`None` 表示取值缺失
    pub fn compare(actual: Option<&Value>, operator: Operator, expected: &ExpectedValue) -> bool {
        if operator == Operator::Exists {
            return actual.is_some();
        }

        match (operator, expected) {
            (_, ExpectedValue::Invalid(_)) => false,
            (Operator::Equals, ExpectedValue::Literal(lit)) => {
                actual.is_some_and(|v| Self::eq(v, lit))
            }
            (Operator::NotEquals, ExpectedValue::Literal(lit)) => {
                actual.is_none_or(|v| !Self::eq(v, lit))
            }
            (Operator::Contains, ExpectedValue::Literal(lit)) => {
                actual.is_some_and(|v| string_form(v).contains(&lit.string_form()))
            }
            (Operator::In, ExpectedValue::Set(items)) => {
                actual.is_some_and(|v| items.contains(&string_form(v)))
            }
            (Operator::NotIn, ExpectedValue::Set(items)) => {
                actual.is_none_or(|v| !items.contains(&string_form(v)))
            }
            (Operator::GreaterThan, ExpectedValue::Number(threshold)) => {
                actual.and_then(as_number).is_some_and(|n| n > *threshold)
            }
            (Operator::LessThan, ExpectedValue::Number(threshold)) => {
                actual.and_then(as_number).is_some_and(|n| n < *threshold)
            }
            (Operator::MatchesRegex, ExpectedValue::Pattern(re)) => {
                actual.is_some_and(|v| re.is_match(&string_form(v)))
            }
            // 期望值与操作符不对应，只有手工构造 CompiledCondition 时才会出现
            _ => false,
        }
    }

    /// 同类型直接比较，类型不同时比较字符串形式
    fn eq(actual: &Value, expected: &Literal) -> bool {
        match (actual, expected) {
            (Value::String(a), Literal::Text(b)) => a == b,
            (Value::Bool(a), Literal::Bool(b)) => a == b,
            (Value::Number(a), Literal::Number(b)) => number_eq(a, b),
            _ => string_form(actual) == expected.string_form(),
        }
    }
}

/// 值的字符串形式：字符串取原文，其余取 JSON 序列化结果
pub fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_form(n),
        other => other.to_string(),
    }
}

/// 整数按原样输出，不经过 f64
pub fn number_form(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    n.as_f64().map(number_string).unwrap_or_else(|| n.to_string())
}

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// 两边都是整数时精确比较，否则按 f64 严格相等
fn number_eq(a: &Number, b: &Number) -> bool {
    match (as_integer(a), as_integer(b)) {
        (Some(a), Some(b)) => a == b,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// 整数值的浮点数按整数输出（1000.0 => "1000"）
pub fn number_string(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// 数字或可解析为数字的字符串
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

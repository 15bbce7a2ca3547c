//! 规则编译器
//!
//! 校验规则结构并把每个条件的字面量预编译成带类型的比较值。
//! 结构错误拒绝整条规则；字面量问题（非法正则、无法解析的集合、
//! 非数字阈值）只记录为配置错误，对应条件在评估时恒为不匹配。

use crate::error::{Result, RuleError};
use crate::evaluator::{as_number, number_form, string_form};
use crate::models::{Condition, Rule};
use crate::operators::{Operator, PropertyType};
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashSet;
use tracing::warn;

/// 标量字面量
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(Number),
    Bool(bool),
}

impl Literal {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s.clone()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// 跨类型比较时使用的字符串形式
    pub fn string_form(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => number_form(n),
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// 预编译的期望值
#[derive(Debug, Clone)]
pub enum ExpectedValue {
    /// exists 不需要比较值
    Absent,
    Literal(Literal),
    Number(f64),
    Set(Vec<String>),
    Pattern(Regex),
    /// 配置错误，条件恒为不匹配
    Invalid(String),
}

impl ExpectedValue {
    pub fn config_error(&self) -> Option<&str> {
        match self {
            Self::Invalid(reason) => Some(reason),
            _ => None,
        }
    }
}

/// 编译后的条件
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub condition: Condition,
    pub expected: ExpectedValue,
}

impl CompiledCondition {
    /// 只编译字面量，不做结构校验
    pub fn compile(condition: Condition) -> Self {
        let expected = compile_expected(condition.operator, &condition.value);
        Self {
            condition,
            expected,
        }
    }

    pub fn config_error(&self) -> Option<&str> {
        self.expected.config_error()
    }
}

fn compile_expected(operator: Operator, value: &Value) -> ExpectedValue {
    match operator {
        Operator::Exists => ExpectedValue::Absent,
        Operator::Equals | Operator::NotEquals | Operator::Contains => {
            ExpectedValue::Literal(Literal::from_value(value))
        }
        Operator::In | Operator::NotIn => compile_set(value),
        Operator::GreaterThan | Operator::LessThan => match as_number(value) {
            Some(n) => ExpectedValue::Number(n),
            None => ExpectedValue::Invalid(format!("{} 的阈值不是数字: {}", operator, value)),
        },
        Operator::MatchesRegex => match value {
            Value::String(pattern) => match Regex::new(pattern) {
                Ok(re) => ExpectedValue::Pattern(re),
                Err(e) => ExpectedValue::Invalid(format!("无效的正则表达式 '{}': {}", pattern, e)),
            },
            other => ExpectedValue::Invalid(format!("正则表达式必须是字符串: {}", other)),
        },
    }
}

/// 集合字面量：JSON 数组，或内容为 JSON 数组的字符串
fn compile_set(value: &Value) -> ExpectedValue {
    let parsed;
    let items = match value {
        Value::Array(items) => items,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            _ => return ExpectedValue::Invalid(format!("无法解析的集合: {}", s)),
        },
        other => return ExpectedValue::Invalid(format!("集合必须是数组: {}", other)),
    };
    ExpectedValue::Set(items.iter().map(string_form).collect())
}

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// 原始规则
    pub rule: Rule,
    /// 与 rule.conditions 一一对应
    pub conditions: Vec<CompiledCondition>,
    /// 条件下标 + 原因
    pub config_errors: Vec<String>,
    /// 规则读取的所有取值来源（`类型:路径`）
    pub required_fields: HashSet<String>,
    /// 编译版本号
    pub compile_version: u64,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn name(&self) -> &str {
        &self.rule.name
    }

    pub fn priority(&self) -> i32 {
        self.rule.priority
    }

    pub fn is_active(&self) -> bool {
        self.rule.active
    }

    pub fn has_config_errors(&self) -> bool {
        !self.config_errors.is_empty()
    }
}

/// 规则编译器
pub struct RuleCompiler {
    compile_version: u64,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self { compile_version: 0 }
    }

    /// 从 JSON 字符串编译规则
    pub fn compile_from_json(&mut self, json: &str) -> Result<CompiledRule> {
        let rule: Rule = serde_json::from_str(json)?;
        self.compile(rule)
    }

    /// 编译规则
    pub fn compile(&mut self, rule: Rule) -> Result<CompiledRule> {
        self.validate_rule(&rule)?;

        let conditions: Vec<CompiledCondition> = rule
            .conditions
            .iter()
            .cloned()
            .map(CompiledCondition::compile)
            .collect();

        let config_errors: Vec<String> = conditions
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.config_error().map(|e| format!("conditions[{}]: {}", i, e)))
            .collect();

        for err in &config_errors {
            warn!(rule_id = %rule.id, rule_name = %rule.name, "规则配置错误: {}", err);
        }

        let required_fields = rule
            .conditions
            .iter()
            .map(|c| format!("{}:{}", c.property_type, c.property_path))
            .collect();

        self.compile_version += 1;

        Ok(CompiledRule {
            rule,
            conditions,
            config_errors,
            required_fields,
            compile_version: self.compile_version,
        })
    }

    /// 验证规则结构
    fn validate_rule(&self, rule: &Rule) -> Result<()> {
        if rule.id.trim().is_empty() {
            return Err(RuleError::ParseError("规则 ID 不能为空".to_string()));
        }

        if rule.name.trim().is_empty() {
            return Err(RuleError::ParseError("规则名称不能为空".to_string()));
        }

        if rule.conditions.is_empty() {
            return Err(RuleError::CompileError(format!(
                "规则 '{}' 至少需要一个条件",
                rule.id
            )));
        }

        for (i, cond) in rule.conditions.iter().enumerate() {
            self.validate_condition(cond, &format!("conditions[{}]", i))?;
        }

        let has_target =
            rule.rule_target().is_some() || rule.conditions.iter().any(|c| c.condition_target().is_some());
        if !has_target {
            return Err(RuleError::CompileError(format!(
                "规则 '{}' 没有目标集成",
                rule.id
            )));
        }

        Ok(())
    }

    /// 验证条件
    fn validate_condition(&self, cond: &Condition, path: &str) -> Result<()> {
        if cond.property_path.trim().is_empty() && cond.property_type != PropertyType::BodyText {
            return Err(RuleError::InvalidCondition {
                path: path.to_string(),
                reason: "属性路径不能为空".to_string(),
            });
        }

        let missing_value = match &cond.value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if cond.operator.requires_value() && missing_value {
            return Err(RuleError::InvalidCondition {
                path: path.to_string(),
                reason: format!("{} 操作符需要比较值", cond.operator),
            });
        }

        Ok(())
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

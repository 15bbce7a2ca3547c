//! 集成响应校验
//!
//! 响应校验条件与规则条件共用同一套取值和比较逻辑，
//! 路径总是指向 JSON 响应体。

use crate::compiler::CompiledCondition;
use crate::context::RequestContext;
use crate::evaluator::ConditionEvaluator;
use crate::models::Condition;
use crate::operators::Operator;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// all 对应 AND，any 对应 OR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCondition {
    pub path: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl ValidationCondition {
    pub fn new(path: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            operator,
            value: value.into(),
        }
    }

    fn compile(&self) -> CompiledCondition {
        CompiledCondition::compile(Condition::body_json(
            self.path.clone(),
            self.operator,
            self.value.clone(),
        ))
    }
}

/// 集成配置中的 `response.validation`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseValidation {
    #[serde(default)]
    pub mode: ValidationMode,
    #[serde(default)]
    pub conditions: Vec<ValidationCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub status_ok: bool,
    /// 未通过的条件或状态码描述
    pub failures: Vec<String>,
    pub config_errors: Vec<String>,
}

/// 响应校验器
pub struct ResponseValidator;

impl ResponseValidator {
    /// `expected_status` 为空时接受任何状态码
    pub fn validate(
        expected_status: &[u16],
        validation: &ResponseValidation,
        status: u16,
        body: &[u8],
    ) -> ValidationOutcome {
        if !expected_status.is_empty() && !expected_status.contains(&status) {
            return ValidationOutcome {
                passed: false,
                status_ok: false,
                failures: vec![format!(
                    "状态码 {} 不在期望列表 {:?} 中",
                    status, expected_status
                )],
                config_errors: Vec::new(),
            };
        }

        let context = RequestContext::builder().body(body.to_vec()).build();
        let mut failures = Vec::new();
        let mut config_errors = Vec::new();
        let mut passed_count = 0;

        for (i, cond) in validation.conditions.iter().enumerate() {
            let compiled = cond.compile();
            if let Some(err) = compiled.config_error() {
                config_errors.push(format!("conditions[{}]: {}", i, err));
            }

            if ConditionEvaluator::evaluate(&compiled, &context) {
                passed_count += 1;
            } else {
                failures.push(format!(
                    "conditions[{}]: {} {} {}",
                    i, cond.path, cond.operator, cond.value
                ));
            }
        }

        let passed = match (validation.conditions.is_empty(), validation.mode) {
            (true, _) => true,
            (false, ValidationMode::All) => failures.is_empty(),
            (false, ValidationMode::Any) => passed_count > 0,
        };

        ValidationOutcome {
            passed,
            status_ok: true,
            failures,
            config_errors,
        }
    }
}

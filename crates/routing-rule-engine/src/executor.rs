//! 规则执行器
//!
//! 按存储顺序评估条件，AND 遇到 false 短路，OR 遇到 true 短路。

use crate::compiler::CompiledRule;
use crate::context::RequestContext;
use crate::evaluator::ConditionEvaluator;
use crate::models::EvaluationResult;
use crate::operators::LogicalOperator;
use std::time::Instant;

/// 规则执行器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// 执行规则评估
    pub fn execute(&self, rule: &CompiledRule, context: &RequestContext) -> EvaluationResult {
        let start = Instant::now();
        let mut result = EvaluationResult::new(rule.id().to_string(), rule.name().to_string());
        let operator = rule.rule.logical_operator;

        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "规则 {}: 开始评估 {} 组 (共 {} 个条件)",
                rule.id(),
                operator,
                rule.conditions.len()
            ));
        }

        // AND 初值为 true，OR 初值为 false；遇到与初值相反的结果即短路
        let mut matched = operator == LogicalOperator::And;

        for (i, cond) in rule.conditions.iter().enumerate() {
            let cond_matched = ConditionEvaluator::evaluate(cond, context);

            if self.trace_enabled {
                let note = match cond.config_error() {
                    Some(err) => format!(" (配置错误: {})", err),
                    None => String::new(),
                };
                result.evaluation_trace.push(format!(
                    "conditions[{}]: {} => {}{}",
                    i,
                    cond.condition.describe(),
                    if cond_matched { "MATCHED" } else { "NOT_MATCHED" },
                    note
                ));
            }

            if cond_matched {
                result
                    .matched_conditions
                    .push(format!("conditions[{}] {}", i, cond.condition.describe()));
                result.matched_indices.push(i);
                result.first_matched_condition.get_or_insert(i);
            }

            match operator {
                LogicalOperator::And if !cond_matched => {
                    if self.trace_enabled {
                        result
                            .evaluation_trace
                            .push(format!("AND 短路 - 条件 {} 不匹配", i));
                    }
                    matched = false;
                    break;
                }
                LogicalOperator::Or if cond_matched => {
                    if self.trace_enabled {
                        result
                            .evaluation_trace
                            .push(format!("OR 短路 - 条件 {} 匹配", i));
                    }
                    matched = true;
                    break;
                }
                _ => {}
            }
        }

        result.matched = matched;
        result.evaluation_time_us = start.elapsed().as_micros() as i64;
        result
    }
}

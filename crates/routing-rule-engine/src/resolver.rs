//! 规则集解析
//!
//! 按优先级依次评估启用的规则，第一条匹配的规则胜出。
//! 没有规则匹配是正常结果，不是错误。

use crate::compiler::CompiledRule;
use crate::context::RequestContext;
use crate::executor::RuleExecutor;
use crate::models::EvaluationResult;
use crate::store::RuleSnapshot;
use hookroute_shared::observability::metrics::record_rule_resolution;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// 解析过程中的状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "rule_id", rename_all = "snake_case")]
pub enum ResolverState {
    Pending,
    Evaluating(String),
    Matched(String),
    NoMatch,
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Evaluating(id) => write!(f, "Evaluating({})", id),
            Self::Matched(id) => write!(f, "Matched({})", id),
            Self::NoMatch => write!(f, "NoMatch"),
        }
    }
}

/// 目标集成的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum TargetSource {
    Rule,
    /// 条件下标
    Condition(usize),
}

/// 匹配到的路由
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMatch {
    pub rule_id: String,
    pub rule_name: String,
    pub priority: i32,
    pub integration_code: String,
    pub target_source: TargetSource,
    pub matched_conditions: Vec<String>,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Matched(RouteMatch),
    NoMatch,
}

impl Resolution {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn route(&self) -> Option<&RouteMatch> {
        match self {
            Self::Matched(m) => Some(m),
            Self::NoMatch => None,
        }
    }

    pub fn integration_code(&self) -> Option<&str> {
        self.route().map(|m| m.integration_code.as_str())
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::NoMatch => "no_match",
        }
    }
}

/// 带统计信息的解析结果
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub resolution: Resolution,
    /// 实际评估的规则数
    pub evaluated: usize,
    /// 跳过的未启用规则数
    pub skipped_inactive: usize,
    /// 状态轨迹，仅在启用追踪时记录
    pub states: Vec<ResolverState>,
    /// 各规则评估明细，仅在启用追踪时记录
    pub rule_results: Vec<EvaluationResult>,
    pub elapsed_us: i64,
}

/// 规则集解析器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleSetResolver {
    executor: RuleExecutor,
}

impl RuleSetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用状态与评估追踪
    pub fn with_trace(mut self) -> Self {
        self.executor = self.executor.with_trace();
        self
    }

    /// 解析请求应路由到的集成
    pub fn resolve(&self, snapshot: &RuleSnapshot, context: &RequestContext) -> Resolution {
        self.resolve_with_report(snapshot, context).resolution
    }

    pub fn resolve_with_report(
        &self,
        snapshot: &RuleSnapshot,
        context: &RequestContext,
    ) -> ResolutionReport {
        let start = Instant::now();
        let tracing_enabled = self.executor.trace_enabled();

        let mut report = ResolutionReport {
            resolution: Resolution::NoMatch,
            evaluated: 0,
            skipped_inactive: 0,
            states: Vec::new(),
            rule_results: Vec::new(),
            elapsed_us: 0,
        };
        if tracing_enabled {
            report.states.push(ResolverState::Pending);
        }

        for rule in snapshot.rules() {
            if !rule.is_active() {
                report.skipped_inactive += 1;
                continue;
            }

            if tracing_enabled {
                report
                    .states
                    .push(ResolverState::Evaluating(rule.id().to_string()));
            }
            report.evaluated += 1;

            let result = self.executor.execute(rule, context);
            let route = if result.matched {
                route_for(rule, &result)
            } else {
                None
            };
            if tracing_enabled {
                report.rule_results.push(result);
            }

            if let Some(route) = route {
                if tracing_enabled {
                    report.states.push(ResolverState::Matched(route.rule_id.clone()));
                }
                report.resolution = Resolution::Matched(route);
                break;
            }
        }

        if tracing_enabled && !report.resolution.is_match() {
            report.states.push(ResolverState::NoMatch);
        }

        let elapsed = start.elapsed();
        report.elapsed_us = elapsed.as_micros() as i64;
        record_rule_resolution(report.resolution.outcome(), elapsed.as_secs_f64());

        debug!(
            outcome = report.resolution.outcome(),
            integration_code = report.resolution.integration_code().unwrap_or("-"),
            evaluated = report.evaluated,
            skipped_inactive = report.skipped_inactive,
            elapsed_us = report.elapsed_us,
            "规则集解析完成"
        );

        report
    }
}

/// 规则级目标优先；否则取第一个带目标的匹配条件
fn route_for(rule: &CompiledRule, result: &EvaluationResult) -> Option<RouteMatch> {
    let (integration_code, target_source) = match rule.rule.rule_target() {
        Some(code) => (code.to_string(), TargetSource::Rule),
        None => {
            let found = result.matched_indices.iter().find_map(|&i| {
                rule.rule.conditions[i]
                    .condition_target()
                    .map(|code| (code.to_string(), TargetSource::Condition(i)))
            });
            match found {
                Some(found) => found,
                None => {
                    warn!(rule_id = %rule.id(), "规则已匹配但匹配的条件都没有目标集成，跳过");
                    return None;
                }
            }
        }
    };

    Some(RouteMatch {
        rule_id: rule.id().to_string(),
        rule_name: rule.name().to_string(),
        priority: rule.priority(),
        integration_code,
        target_source,
        matched_conditions: result.matched_conditions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, Rule};
    use crate::operators::{LogicalOperator, Operator, PropertyType};
    use serde_json::json;

    fn header_rule(id: &str, priority: i32, target: &str) -> Rule {
        Rule::new(
            format!("rule {}", id),
            target,
            vec![Condition::exists(PropertyType::Header, "x-event")],
        )
        .with_id(id)
        .with_priority(priority)
    }

    fn context() -> RequestContext {
        RequestContext::builder()
            .header("X-Event", "payment.created")
            .json_body(&json!({"amount": 50}))
            .build()
    }

    #[test]
    fn test_highest_priority_wins() {
        let (snapshot, _) = RuleSnapshot::from_rules(vec![
            header_rule("low", 10, "low_target"),
            header_rule("high", 300, "high_target"),
        ]);

        let resolution = RuleSetResolver::new().resolve(&snapshot, &context());
        assert_eq!(resolution.integration_code(), Some("high_target"));
        assert_eq!(resolution.route().unwrap().target_source, TargetSource::Rule);
    }

    #[test]
    fn test_inactive_rules_are_skipped() {
        let (snapshot, _) = RuleSnapshot::from_rules(vec![
            header_rule("off", 500, "off_target").with_active(false),
            header_rule("on", 1, "on_target"),
        ]);

        let report = RuleSetResolver::new().resolve_with_report(&snapshot, &context());
        assert_eq!(report.resolution.integration_code(), Some("on_target"));
        assert_eq!(report.skipped_inactive, 1);
        assert_eq!(report.evaluated, 1);
    }

    #[test]
    fn test_no_match_is_a_result() {
        let (snapshot, _) = RuleSnapshot::from_rules(vec![header_rule("a", 1, "t")]);
        let ctx = RequestContext::builder().build();

        assert_eq!(RuleSetResolver::new().resolve(&snapshot, &ctx), Resolution::NoMatch);
        assert_eq!(
            RuleSetResolver::new().resolve(&RuleSnapshot::empty(), &ctx),
            Resolution::NoMatch
        );
    }

    #[test]
    fn test_condition_level_target() {
        let rule = Rule::new(
            "per-condition",
            "",
            vec![
                Condition::body_json("amount", Operator::GreaterThan, 1000)
                    .with_integration_code("big_payment"),
                Condition::body_json("amount", Operator::LessThan, 100)
                    .with_integration_code("small_payment"),
            ],
        )
        .with_logical_operator(LogicalOperator::Or);
        let (snapshot, report) = RuleSnapshot::from_rules(vec![rule]);
        assert!(report.is_complete());

        let resolution = RuleSetResolver::new().resolve(&snapshot, &context());
        let route = resolution.route().unwrap();
        assert_eq!(route.integration_code, "small_payment");
        assert_eq!(route.target_source, TargetSource::Condition(1));
    }

    #[test]
    fn test_rule_target_overrides_condition_target() {
        let rule = Rule::new(
            "both",
            "rule_target",
            vec![Condition::exists(PropertyType::Header, "x-event").with_integration_code("cond_target")],
        );
        let (snapshot, _) = RuleSnapshot::from_rules(vec![rule]);

        let resolution = RuleSetResolver::new().resolve(&snapshot, &context());
        assert_eq!(resolution.integration_code(), Some("rule_target"));
    }

    #[test]
    fn test_state_trace() {
        let (snapshot, _) = RuleSnapshot::from_rules(vec![
            header_rule("first", 200, "t1").with_active(true),
            header_rule("second", 100, "t2"),
        ]);

        let report = RuleSetResolver::new()
            .with_trace()
            .resolve_with_report(&snapshot, &context());
        assert_eq!(
            report.states,
            vec![
                ResolverState::Pending,
                ResolverState::Evaluating("first".to_string()),
                ResolverState::Matched("first".to_string()),
            ]
        );
        assert_eq!(report.rule_results.len(), 1);

        let report = RuleSetResolver::new()
            .with_trace()
            .resolve_with_report(&snapshot, &RequestContext::builder().build());
        assert_eq!(report.states.last(), Some(&ResolverState::NoMatch));
        assert_eq!(report.states.len(), 4);
    }
}

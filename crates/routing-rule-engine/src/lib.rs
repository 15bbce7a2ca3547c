//! Webhook 路由规则引擎
//!
//! 根据条件规则为入站 webhook 请求选择目标集成：
//! - JSON 规则定义和解析
//! - 规则编译（字面量预编译、配置错误记录）
//! - 写时复制的规则快照
//! - 短路求值执行与按优先级解析
//! - 集成响应校验

pub mod compiler;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod path_template;
pub mod resolver;
pub mod store;
pub mod transform;
pub mod validation;

pub use compiler::{CompiledCondition, CompiledRule, ExpectedValue, Literal, RuleCompiler};
pub use context::{RequestContext, RequestContextBuilder};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::RuleExecutor;
pub use models::{Condition, EvaluationResult, Rule};
pub use operators::{LogicalOperator, Operator, PropertyType, Transform};
pub use path_template::PathTemplate;
pub use resolver::{Resolution, ResolutionReport, ResolverState, RouteMatch, RuleSetResolver, TargetSource};
pub use store::{LoadReport, RuleSnapshot, RuleStore, RuleStoreStats};
pub use transform::TransformError;
pub use validation::{ResponseValidation, ResponseValidator, ValidationCondition, ValidationMode, ValidationOutcome};

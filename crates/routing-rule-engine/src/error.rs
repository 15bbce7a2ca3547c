//! 规则引擎错误类型
//!
//! 只覆盖规则加载阶段的结构性错误。评估阶段不产生错误：
//! 配置问题和取值失败都降级为单个条件不匹配。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("规则编译失败: {0}")]
    CompileError(String),

    #[error("条件 '{path}' 无效: {reason}")]
    InvalidCondition { path: String, reason: String },

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

//! 管理后台客户端错误类型

use hookroute_shared::error::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("请求管理后台失败: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("管理后台返回 {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("响应解析失败: {0}")]
    Decode(String),

    #[error(transparent)]
    Shared(#[from] PlatformError),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::Shared(PlatformError::not_found(entity, id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Shared(PlatformError::NotFound { .. }))
    }

    /// 网络错误、超时和 5xx 可以重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            Self::Decode(_) => false,
            Self::Shared(e) => e.is_retryable(),
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

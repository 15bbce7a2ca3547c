//! 路由服务错误类型

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use console_client::ConsoleError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("没有端点匹配路径: {0}")]
    EndpointNotFound(String),

    #[error("同步规则失败: {0}")]
    Sync(#[from] ConsoleError),
}

pub type Result<T> = std::result::Result<T, RouterError>;

impl RouterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EndpointNotFound(_) => StatusCode::NOT_FOUND,
            Self::Sync(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EndpointNotFound(_) => "ENDPOINT_NOT_FOUND",
            Self::Sync(_) => "CONSOLE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RouterError::EndpointNotFound("/x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RouterError::Sync(ConsoleError::Decode("bad".to_string())).error_code(),
            "CONSOLE_UNAVAILABLE"
        );
    }
}

//! 管理后台客户端
//!
//! 规则、集成、端点和输入定义都由管理后台维护。路由服务通过 [`ConsoleApi`] 读取它们：
//! 在线模式走 HTTP，离线模式使用内置示例数据。

pub mod client;
pub mod error;
pub mod models;
pub mod offline;

pub use client::{ConsoleApi, HttpConsoleClient};
#[cfg(any(test, feature = "mock"))]
pub use client::MockConsoleApi;
pub use error::{ConsoleError, Result};
pub use models::*;
pub use offline::OfflineConsoleClient;

use hookroute_shared::config::{ConsoleConfig, ConsoleMode};
use std::sync::Arc;
use tracing::{info, warn};

/// 按配置的访问模式创建客户端
pub fn connect(config: &ConsoleConfig) -> Result<Arc<dyn ConsoleApi>> {
    match config.mode {
        ConsoleMode::Online => {
            info!(base_url = %config.base_url, "连接管理后台");
            Ok(Arc::new(HttpConsoleClient::new(config)?))
        }
        ConsoleMode::Offline => {
            warn!("管理后台离线模式，使用内置示例数据");
            Ok(Arc::new(OfflineConsoleClient::with_fixtures()?))
        }
    }
}

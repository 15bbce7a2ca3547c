//! Webhook 路由服务
//!
//! 接收入站 webhook，按管理后台维护的规则选出目标集成。

pub mod endpoints;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod sync;

pub use endpoints::{EndpointMatch, EndpointTable};
pub use error::{Result, RouterError};
pub use routes::router;
pub use state::{AppState, RoutingSnapshot, SyncStatus};
pub use sync::{RuleSynchronizer, SyncReport};

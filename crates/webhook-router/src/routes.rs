//! 路由配置

use crate::handlers;
use crate::state::AppState;
use axum::routing::{any, get};
use axum::{Router, middleware};
use hookroute_shared::observability::middleware as obs_middleware;

/// 构建完整的 HTTP 路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(handlers::HOOKS_PREFIX, any(handlers::ingest))
        .route("/hooks/{*path}", any(handlers::ingest))
        .route("/health", get(handlers::health))
        .route("/rules", get(handlers::list_rules))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

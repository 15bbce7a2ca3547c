//! 应用状态定义
//!
//! 请求处理只读取快照；规则和端点表由同步任务作为一个整体替换。

use crate::endpoints::EndpointTable;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rule_engine::{RuleSetResolver, RuleSnapshot, RuleStore};
use serde::Serialize;
use std::sync::Arc;

/// 最近一次同步的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub rules_loaded: usize,
    pub rules_rejected: usize,
}

impl SyncStatus {
    /// 最近一次同步失败，正在使用旧快照
    pub fn is_degraded(&self) -> bool {
        self.last_error.is_some()
    }
}

/// 同一次同步产出的规则快照与端点表，总是一起发布
#[derive(Debug, Clone, Default)]
pub struct RoutingSnapshot {
    pub rules: Arc<RuleSnapshot>,
    pub endpoints: Arc<EndpointTable>,
}

/// Axum 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub store: RuleStore,
    pub routing: Arc<ArcSwap<RoutingSnapshot>>,
    pub sync_status: Arc<RwLock<SyncStatus>>,
    pub resolver: RuleSetResolver,
}

impl AppState {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            store: RuleStore::new(),
            routing: Arc::new(ArcSwap::from_pointee(RoutingSnapshot::default())),
            sync_status: Arc::new(RwLock::new(SyncStatus::default())),
            resolver: RuleSetResolver::new(),
        }
    }

    /// 当前对外生效的规则与端点
    pub fn routing(&self) -> Arc<RoutingSnapshot> {
        self.routing.load_full()
    }

    /// 以规则存储的当前快照和给定端点表发布新的路由快照
    pub fn publish(&self, endpoints: EndpointTable) {
        self.routing.store(Arc::new(RoutingSnapshot {
            rules: self.store.snapshot(),
            endpoints: Arc::new(endpoints),
        }));
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_client::Endpoint;
    use rule_engine::{Condition, Operator, Rule};

    #[test]
    fn test_publish_swaps_rules_and_endpoints_together() {
        let state = AppState::new("test");
        let before = state.routing();
        assert!(before.rules.is_empty());
        assert!(before.endpoints.is_empty());

        state.store.replace_all(vec![
            Rule::new("r", "a", vec![Condition::body_json("x", Operator::Equals, 1)]).with_id("1"),
        ]);
        // 发布前请求仍看到旧的一对
        assert!(state.routing().rules.is_empty());

        state.publish(EndpointTable::from_endpoints(&[Endpoint::new("e", "/e", "E")]));
        let after = state.routing();
        assert_eq!(after.rules.len(), 1);
        assert_eq!(after.endpoints.len(), 1);
        assert!(before.rules.is_empty());
    }
}

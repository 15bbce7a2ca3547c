//! 规则与端点同步
//!
//! 定期从管理后台拉取规则和端点，整体替换本地快照。拉取失败时保留上一次成功的快照。

use crate::endpoints::EndpointTable;
use crate::error::Result;
use crate::state::AppState;
use console_client::ConsoleApi;
use hookroute_shared::observability::metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

/// 一次成功同步的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub rules_loaded: usize,
    /// (规则 id, 原因)
    pub rules_rejected: Vec<(String, String)>,
    pub endpoints: usize,
}

pub struct RuleSynchronizer {
    api: Arc<dyn ConsoleApi>,
    state: AppState,
    interval: Duration,
}

impl RuleSynchronizer {
    pub fn new(api: Arc<dyn ConsoleApi>, state: AppState, interval: Duration) -> Self {
        Self {
            api,
            state,
            interval,
        }
    }

    /// 拉取一次并替换快照
    #[instrument(skip(self))]
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let fetched = async {
            let listing = self.api.list_rules().await?;
            let endpoints = self.api.list_endpoints().await?;
            Ok::<_, console_client::ConsoleError>((listing, endpoints))
        }
        .await;

        let (listing, endpoints) = match fetched {
            Ok(v) => v,
            Err(e) => {
                let mut status = self.state.sync_status.write();
                status.last_error = Some(e.to_string());
                status.consecutive_failures += 1;
                let serving = self.state.routing().rules.len();
                warn!(
                    error = %e,
                    consecutive_failures = status.consecutive_failures,
                    rules = serving,
                    "同步失败，继续使用上一次的规则快照"
                );
                // 旧快照仍在服务，规则数保持不变
                metrics::record_rule_sync("failed", serving);
                return Err(e.into());
            }
        };

        let mut report = self.state.store.replace_all(listing.rules);
        let mut rejected = listing.rejected;
        rejected.append(&mut report.failed);

        let table = EndpointTable::from_endpoints(&endpoints);
        let endpoint_count = table.len();
        self.state.publish(table);

        {
            let mut status = self.state.sync_status.write();
            status.last_success_at = Some(chrono::Utc::now());
            status.last_error = None;
            status.consecutive_failures = 0;
            status.rules_loaded = report.loaded.len();
            status.rules_rejected = rejected.len();
        }

        metrics::record_rule_sync("success", report.loaded.len());
        info!(
            rules_loaded = report.loaded.len(),
            rules_rejected = rejected.len(),
            endpoints = endpoint_count,
            "规则同步完成"
        );

        Ok(SyncReport {
            rules_loaded: report.loaded.len(),
            rules_rejected: rejected,
            endpoints: endpoint_count,
        })
    }

    /// 按间隔循环同步，直到收到关闭信号
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即完成，启动时已经同步过
        ticker.tick().await;

        info!(interval_secs = self.interval.as_secs(), "规则同步任务已启动");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        error!(error = %e, "定时同步失败");
                    }
                }
                changed = shutdown.changed() => {
                    // 发送端已关闭时同样退出
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("规则同步任务已停止");
    }
}

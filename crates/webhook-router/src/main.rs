//! Webhook 路由服务
//!
//! 从管理后台同步规则与端点，对外提供 `/hooks/*` 入站接口。

use anyhow::Result;
use hookroute_shared::config::AppConfig;
use hookroute_shared::observability;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use webhook_router::{AppState, RuleSynchronizer, router};

const SERVICE_NAME: &str = "webhook-router";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        console_mode = ?config.console.mode,
        "Starting {}...",
        SERVICE_NAME
    );

    let api = console_client::connect(&config.console)?;
    let state = AppState::new(config.service_name.clone());
    let synchronizer = RuleSynchronizer::new(
        api,
        state.clone(),
        Duration::from_secs(config.console.refresh_interval_seconds.max(1)),
    );

    // 首次同步失败不阻止启动，后台任务会继续重试
    match synchronizer.sync_once().await {
        Ok(report) => info!(
            rules = report.rules_loaded,
            endpoints = report.endpoints,
            "Initial rule sync complete"
        ),
        Err(e) => warn!(error = %e, "Initial rule sync failed, starting with empty rule set"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_handle = tokio::spawn(synchronizer.run(shutdown_rx));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sync_handle.await {
        warn!(error = %e, "Rule sync task ended abnormally");
    }

    info!("Service shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}

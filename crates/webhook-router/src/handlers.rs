//! HTTP 处理器

use crate::error::{Result, RouterError};
use crate::state::{AppState, SyncStatus};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, Uri};
use rule_engine::{RequestContext, Resolution, TargetSource};
use serde::Serialize;
use tracing::{debug, info};

/// 入站路径前缀
pub const HOOKS_PREFIX: &str = "/hooks";

/// 路由结果
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub matched: bool,
    pub integration_code: Option<String>,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub endpoint_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_source: Option<TargetSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_conditions: Vec<String>,
}

impl RouteResponse {
    fn new(resolution: Resolution, endpoint_code: Option<String>) -> Self {
        match resolution {
            Resolution::Matched(route) => Self {
                matched: true,
                integration_code: Some(route.integration_code),
                rule_id: Some(route.rule_id),
                rule_name: Some(route.rule_name),
                endpoint_code,
                target_source: Some(route.target_source),
                matched_conditions: route.matched_conditions,
            },
            Resolution::NoMatch => Self {
                matched: false,
                integration_code: None,
                rule_id: None,
                rule_name: None,
                endpoint_code,
                target_source: None,
                matched_conditions: Vec::new(),
            },
        }
    }
}

/// 去掉 `/hooks` 前缀后的请求路径
fn hook_path(uri: &Uri) -> String {
    let path = uri.path().strip_prefix(HOOKS_PREFIX).unwrap_or(uri.path());
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// 接收 webhook 并解析目标集成
///
/// 端点表为空时不做端点校验；否则没有端点匹配返回 404。
pub async fn ingest(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RouteResponse>> {
    let path = hook_path(&uri);

    // 端点表与规则取自同一次发布
    let routing = state.routing();
    let table = &routing.endpoints;
    let endpoint = if table.is_empty() {
        None
    } else {
        let m = table
            .match_path(&path)
            .ok_or_else(|| RouterError::EndpointNotFound(path.clone()))?;
        Some(m)
    };

    let mut builder = RequestContext::builder()
        .method(method.as_str())
        .path(path.as_str())
        .query_pairs(query);
    for (name, value) in &headers {
        if let Ok(value) = value.to_str() {
            builder = builder.header(name.as_str(), value);
        }
    }
    let mut context = builder.body(body.to_vec()).build();

    let endpoint_code = match endpoint {
        Some(m) => {
            context = context.with_path_params(m.path_params);
            Some(m.endpoint_code)
        }
        None => None,
    };

    let snapshot = &routing.rules;
    let resolution = state.resolver.resolve(snapshot, &context);

    match resolution.route() {
        Some(route) => info!(
            path = %path,
            endpoint_code = ?endpoint_code,
            rule_id = %route.rule_id,
            integration_code = %route.integration_code,
            "webhook 已路由"
        ),
        None => debug!(
            path = %path,
            endpoint_code = ?endpoint_code,
            rules = snapshot.len(),
            "webhook 未匹配任何规则"
        ),
    }

    Ok(Json(RouteResponse::new(resolution, endpoint_code)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub rules: usize,
    pub endpoints: usize,
    pub snapshot_version: u64,
    pub sync: SyncStatus,
}

/// 存活探针，同步失败时报告 degraded
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let sync = state.sync_status();
    let routing = state.routing();

    Json(HealthResponse {
        status: if sync.is_degraded() { "degraded" } else { "ok" },
        service: state.service_name.clone(),
        rules: routing.rules.len(),
        endpoints: routing.endpoints.len(),
        snapshot_version: routing.rules.version(),
        sync,
    })
}

#[derive(Debug, Serialize)]
pub struct RuleSummary {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub active: bool,
    pub integration_code: Option<String>,
    pub config_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RuleListResponse {
    pub version: u64,
    pub rules: Vec<RuleSummary>,
}

/// 按评估顺序列出当前快照中的规则
pub async fn list_rules(State(state): State<AppState>) -> Json<RuleListResponse> {
    let snapshot = state.routing().rules.clone();
    let rules = snapshot
        .rules()
        .iter()
        .map(|r| RuleSummary {
            id: r.id().to_string(),
            name: r.name().to_string(),
            priority: r.priority(),
            active: r.is_active(),
            integration_code: r.rule.rule_target().map(str::to_string),
            config_errors: r.config_errors.clone(),
        })
        .collect();

    Json(RuleListResponse {
        version: snapshot.version(),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_path() {
        let uri: Uri = "/hooks/api/payments/webhook?x=1".parse().unwrap();
        assert_eq!(hook_path(&uri), "/api/payments/webhook");

        let uri: Uri = "/hooks".parse().unwrap();
        assert_eq!(hook_path(&uri), "/");
    }
}

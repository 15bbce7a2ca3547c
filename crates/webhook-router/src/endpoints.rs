//! 入站端点匹配
//!
//! 每个启用的端点提供一个 `url_path` 模板。模板按字面段数量从多到少尝试，
//! 数量相同时保持后台返回的顺序。

use console_client::Endpoint;
use rule_engine::PathTemplate;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone)]
struct EndpointRoute {
    endpoint_code: String,
    template: PathTemplate,
}

/// 端点匹配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointMatch {
    pub endpoint_code: String,
    pub path_params: HashMap<String, String>,
}

/// 启用端点的路径表
#[derive(Debug, Clone, Default)]
pub struct EndpointTable {
    routes: Vec<EndpointRoute>,
}

impl EndpointTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 构建路径表，未启用的端点不参与匹配，模板无效的端点记录告警后跳过
    pub fn from_endpoints(endpoints: &[Endpoint]) -> Self {
        let mut routes: Vec<EndpointRoute> = endpoints
            .iter()
            .filter(|e| e.active)
            .filter_map(|e| match PathTemplate::parse(&e.url_path) {
                Ok(template) => Some(EndpointRoute {
                    endpoint_code: e.endpoint_code.clone(),
                    template,
                }),
                Err(err) => {
                    warn!(
                        endpoint_code = %e.endpoint_code,
                        url_path = %e.url_path,
                        error = %err,
                        "端点路径模板无效，已跳过"
                    );
                    None
                }
            })
            .collect();

        // 稳定排序
        routes.sort_by(|a, b| b.template.literal_count().cmp(&a.template.literal_count()));

        Self { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 按匹配顺序列出端点编码和模板
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.endpoint_code.as_str(), r.template.as_str()))
    }

    pub fn match_path(&self, path: &str) -> Option<EndpointMatch> {
        self.routes.iter().find_map(|route| {
            route.template.matches(path).map(|path_params| EndpointMatch {
                endpoint_code: route.endpoint_code.clone(),
                path_params,
            })
        })
    }
}

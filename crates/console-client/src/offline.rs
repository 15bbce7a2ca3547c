//! 离线模式的管理后台
//!
//! 数据保存在进程内，启动时载入内置的示例数据。写操作遵守与真实后台相同的约束：
//! 编码唯一、`integrationCode` / `endpoint_code` 创建后不可修改、创建时分配 id。

use crate::client::ConsoleApi;
use crate::error::{ConsoleError, Result};
use crate::models::{
    ConnectionRecord, Endpoint, EndpointInputSummary, EndpointIntegrationSummary,
    EndpointRuleSummary, Input, Integration, Rule, RuleListing,
};
use async_trait::async_trait;
use chrono::Utc;
use hookroute_shared::error::PlatformError;
use hookroute_shared::serde_ext::string_or_number;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

/// 内置示例数据
pub const FIXTURES: &str = include_str!("../fixtures/console.json");

/// 可按 id 增删改的后台记录
trait Record: Clone {
    const ENTITY: &'static str;
    /// 编码创建后不可修改
    const CODE_IMMUTABLE: bool = false;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    /// 唯一编码：(字段名, 值)
    fn code(&self) -> Option<(&'static str, &str)> {
        None
    }

    /// 写入前刷新时间戳，`previous` 为更新前的记录
    fn stamp(&mut self, _previous: Option<&Self>) {}
}

impl Record for Rule {
    const ENTITY: &'static str = "Rule";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, previous: Option<&Self>) {
        let now = Utc::now();
        self.created_at = previous.map_or(now, |p| p.created_at);
        self.updated_at = now;
    }
}

impl Record for Integration {
    const ENTITY: &'static str = "Integration";
    const CODE_IMMUTABLE: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn code(&self) -> Option<(&'static str, &str)> {
        Some(("integrationCode", &self.integration_code))
    }

    fn stamp(&mut self, _previous: Option<&Self>) {
        self.updated_at = Some(Utc::now());
    }
}

impl Record for Endpoint {
    const ENTITY: &'static str = "Endpoint";
    const CODE_IMMUTABLE: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn code(&self) -> Option<(&'static str, &str)> {
        Some(("endpoint_code", &self.endpoint_code))
    }

    fn stamp(&mut self, previous: Option<&Self>) {
        let now = Utc::now();
        self.created_at = match previous {
            Some(p) => p.created_at,
            None => Some(now),
        };
        self.updated_at = Some(now);
    }
}

impl Record for Input {
    const ENTITY: &'static str = "Input";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn code(&self) -> Option<(&'static str, &str)> {
        Some(("code", &self.code))
    }
}

/// 同一类记录的有序集合
#[derive(Debug, Clone)]
struct Table<T> {
    items: Vec<T>,
}

impl<T: Record> Table<T> {
    fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn max_numeric_id(&self) -> u64 {
        self.items
            .iter()
            .filter_map(|item| item.id().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
    }

    fn get(&self, id: &str) -> Result<T> {
        self.position(id)
            .map(|idx| self.items[idx].clone())
            .ok_or_else(|| ConsoleError::not_found(T::ENTITY, id))
    }

    fn ensure_unique_code(&self, record: &T, skip: Option<usize>) -> Result<()> {
        let Some((field, value)) = record.code() else {
            return Ok(());
        };

        if value.trim().is_empty() {
            return Err(PlatformError::InvalidArgument {
                field: field.to_string(),
                message: "不能为空".to_string(),
            }
            .into());
        }

        let taken = self
            .items
            .iter()
            .enumerate()
            .any(|(idx, item)| Some(idx) != skip && item.code().map(|(_, v)| v) == Some(value));
        if taken {
            return Err(PlatformError::AlreadyExists {
                entity: T::ENTITY.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn create(&mut self, mut record: T, next_id: &mut u64) -> Result<T> {
        self.ensure_unique_code(&record, None)?;

        if record.id().is_empty() {
            record.set_id(next_id.to_string());
            *next_id = next_id.saturating_add(1);
        } else if self.position(record.id()).is_some() {
            return Err(PlatformError::AlreadyExists {
                entity: T::ENTITY.to_string(),
                field: "id".to_string(),
                value: record.id().to_string(),
            }
            .into());
        } else if let Ok(n) = record.id().parse::<u64>() {
            *next_id = (*next_id).max(n.saturating_add(1));
        }

        record.stamp(None);
        self.items.push(record.clone());
        Ok(record)
    }

    fn update(&mut self, id: &str, mut record: T) -> Result<T> {
        let idx = self
            .position(id)
            .ok_or_else(|| ConsoleError::not_found(T::ENTITY, id))?;
        let previous = &self.items[idx];

        if T::CODE_IMMUTABLE {
            if let Some((field, old)) = previous.code() {
                if record.code().map(|(_, v)| v) != Some(old) {
                    return Err(PlatformError::ImmutableField {
                        entity: T::ENTITY.to_string(),
                        field: field.to_string(),
                    }
                    .into());
                }
            }
        }
        self.ensure_unique_code(&record, Some(idx))?;

        record.set_id(id.to_string());
        record.stamp(Some(previous));
        self.items[idx] = record.clone();
        Ok(record)
    }

    fn remove(&mut self, id: &str) -> Result<T> {
        let idx = self
            .position(id)
            .ok_or_else(|| ConsoleError::not_found(T::ENTITY, id))?;
        Ok(self.items.remove(idx))
    }
}

/// 挂在某个端点下的子资源
#[derive(Debug, Clone, Deserialize)]
struct Linked<T> {
    #[serde(alias = "endpointId", deserialize_with = "string_or_number")]
    endpoint_id: String,
    #[serde(flatten)]
    item: T,
}

fn items_of<T: Clone>(linked: &[Linked<T>], endpoint_id: &str) -> Vec<T> {
    linked
        .iter()
        .filter(|l| l.endpoint_id == endpoint_id)
        .map(|l| l.item.clone())
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fixtures {
    rules: Vec<Rule>,
    integrations: Vec<Integration>,
    endpoints: Vec<Endpoint>,
    inputs: Vec<Input>,
    endpoint_inputs: Vec<Linked<EndpointInputSummary>>,
    endpoint_rules: Vec<Linked<EndpointRuleSummary>>,
    endpoint_integrations: Vec<Linked<EndpointIntegrationSummary>>,
    endpoint_connections: Vec<Linked<ConnectionRecord>>,
}

struct OfflineState {
    rules: Table<Rule>,
    integrations: Table<Integration>,
    endpoints: Table<Endpoint>,
    inputs: Table<Input>,
    endpoint_inputs: Vec<Linked<EndpointInputSummary>>,
    endpoint_rules: Vec<Linked<EndpointRuleSummary>>,
    endpoint_integrations: Vec<Linked<EndpointIntegrationSummary>>,
    endpoint_connections: Vec<Linked<ConnectionRecord>>,
    next_id: u64,
}

impl OfflineState {
    fn new(fixtures: Fixtures) -> Self {
        let rules = Table::new(fixtures.rules);
        let integrations = Table::new(fixtures.integrations);
        let endpoints = Table::new(fixtures.endpoints);
        let inputs = Table::new(fixtures.inputs);

        let next_id = [
            rules.max_numeric_id(),
            integrations.max_numeric_id(),
            endpoints.max_numeric_id(),
            inputs.max_numeric_id(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
        .saturating_add(1);

        Self {
            rules,
            integrations,
            endpoints,
            inputs,
            endpoint_inputs: fixtures.endpoint_inputs,
            endpoint_rules: fixtures.endpoint_rules,
            endpoint_integrations: fixtures.endpoint_integrations,
            endpoint_connections: fixtures.endpoint_connections,
            next_id,
        }
    }

    fn require_endpoint(&self, endpoint_id: &str) -> Result<()> {
        match self.endpoints.position(endpoint_id) {
            Some(_) => Ok(()),
            None => Err(ConsoleError::not_found(Endpoint::ENTITY, endpoint_id)),
        }
    }

    /// 删除端点时同时移除其子资源，并解除输入定义的关联
    fn detach_endpoint(&mut self, endpoint_id: &str) {
        self.endpoint_inputs.retain(|l| l.endpoint_id != endpoint_id);
        self.endpoint_rules.retain(|l| l.endpoint_id != endpoint_id);
        self.endpoint_integrations
            .retain(|l| l.endpoint_id != endpoint_id);
        self.endpoint_connections
            .retain(|l| l.endpoint_id != endpoint_id);

        for input in &mut self.inputs.items {
            if input.endpoint_id.as_deref() == Some(endpoint_id) {
                input.endpoint_id = None;
            }
        }
    }
}

/// 内存中的管理后台
pub struct OfflineConsoleClient {
    state: RwLock<OfflineState>,
}

impl OfflineConsoleClient {
    /// 不含任何数据
    pub fn empty() -> Self {
        Self {
            state: RwLock::new(OfflineState::new(Fixtures::default())),
        }
    }

    /// 载入内置示例数据
    pub fn with_fixtures() -> Result<Self> {
        Self::from_json(FIXTURES)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let fixtures: Fixtures = serde_json::from_str(json)?;
        info!(
            rules = fixtures.rules.len(),
            integrations = fixtures.integrations.len(),
            endpoints = fixtures.endpoints.len(),
            inputs = fixtures.inputs.len(),
            "离线管理后台数据已载入"
        );

        Ok(Self {
            state: RwLock::new(OfflineState::new(fixtures)),
        })
    }
}

impl Default for OfflineConsoleClient {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl ConsoleApi for OfflineConsoleClient {
    async fn list_rules(&self) -> Result<RuleListing> {
        Ok(RuleListing::from(self.state.read().rules.items.clone()))
    }

    async fn get_rule(&self, id: &str) -> Result<Rule> {
        self.state.read().rules.get(id)
    }

    async fn create_rule(&self, rule: &Rule) -> Result<Rule> {
        let mut state = self.state.write();
        let OfflineState { rules, next_id, .. } = &mut *state;
        let created = rules.create(rule.clone(), next_id)?;
        debug!(rule_id = %created.id, "创建规则");
        Ok(created)
    }

    async fn update_rule(&self, id: &str, rule: &Rule) -> Result<Rule> {
        let updated = self.state.write().rules.update(id, rule.clone())?;
        debug!(rule_id = %id, "更新规则");
        Ok(updated)
    }

    async fn delete_rule(&self, id: &str) -> Result<()> {
        self.state.write().rules.remove(id)?;
        debug!(rule_id = %id, "删除规则");
        Ok(())
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        Ok(self.state.read().integrations.items.clone())
    }

    async fn get_integration(&self, id: &str) -> Result<Integration> {
        self.state.read().integrations.get(id)
    }

    async fn create_integration(&self, integration: &Integration) -> Result<Integration> {
        let mut state = self.state.write();
        let OfflineState {
            integrations,
            next_id,
            ..
        } = &mut *state;
        let created = integrations.create(integration.clone(), next_id)?;
        debug!(integration_code = %created.integration_code, "创建集成");
        Ok(created)
    }

    async fn update_integration(&self, id: &str, integration: &Integration) -> Result<Integration> {
        self.state
            .write()
            .integrations
            .update(id, integration.clone())
    }

    async fn delete_integration(&self, id: &str) -> Result<()> {
        let removed = self.state.write().integrations.remove(id)?;
        debug!(integration_code = %removed.integration_code, "删除集成");
        Ok(())
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.state.read().endpoints.items.clone())
    }

    async fn get_endpoint(&self, id: &str) -> Result<Endpoint> {
        self.state.read().endpoints.get(id)
    }

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<Endpoint> {
        let mut state = self.state.write();
        let OfflineState {
            endpoints, next_id, ..
        } = &mut *state;
        let created = endpoints.create(endpoint.clone(), next_id)?;
        debug!(endpoint_code = %created.endpoint_code, url_path = %created.url_path, "创建端点");
        Ok(created)
    }

    async fn update_endpoint(&self, id: &str, endpoint: &Endpoint) -> Result<Endpoint> {
        self.state.write().endpoints.update(id, endpoint.clone())
    }

    async fn delete_endpoint(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();
        let removed = state.endpoints.remove(id)?;
        state.detach_endpoint(id);
        debug!(endpoint_code = %removed.endpoint_code, "删除端点");
        Ok(())
    }

    async fn list_inputs(&self) -> Result<Vec<Input>> {
        Ok(self.state.read().inputs.items.clone())
    }

    async fn get_input(&self, id: &str) -> Result<Input> {
        self.state.read().inputs.get(id)
    }

    async fn create_input(&self, input: &Input) -> Result<Input> {
        let mut state = self.state.write();
        if let Some(endpoint_id) = &input.endpoint_id {
            state.require_endpoint(endpoint_id)?;
        }
        let OfflineState { inputs, next_id, .. } = &mut *state;
        inputs.create(input.clone(), next_id)
    }

    async fn update_input(&self, id: &str, input: &Input) -> Result<Input> {
        let mut state = self.state.write();
        if let Some(endpoint_id) = &input.endpoint_id {
            state.require_endpoint(endpoint_id)?;
        }
        state.inputs.update(id, input.clone())
    }

    async fn delete_input(&self, id: &str) -> Result<()> {
        self.state.write().inputs.remove(id)?;
        Ok(())
    }

    async fn list_inputs_by_endpoint(&self, endpoint_id: &str) -> Result<Vec<Input>> {
        let state = self.state.read();
        state.require_endpoint(endpoint_id)?;
        Ok(state
            .inputs
            .items
            .iter()
            .filter(|input| input.endpoint_id.as_deref() == Some(endpoint_id))
            .cloned()
            .collect())
    }

    async fn list_endpoint_inputs(&self, endpoint_id: &str) -> Result<Vec<EndpointInputSummary>> {
        let state = self.state.read();
        state.require_endpoint(endpoint_id)?;
        Ok(items_of(&state.endpoint_inputs, endpoint_id))
    }

    async fn list_endpoint_rules(&self, endpoint_id: &str) -> Result<Vec<EndpointRuleSummary>> {
        let state = self.state.read();
        state.require_endpoint(endpoint_id)?;
        Ok(items_of(&state.endpoint_rules, endpoint_id))
    }

    async fn list_endpoint_integrations(
        &self,
        endpoint_id: &str,
    ) -> Result<Vec<EndpointIntegrationSummary>> {
        let state = self.state.read();
        state.require_endpoint(endpoint_id)?;
        Ok(items_of(&state.endpoint_integrations, endpoint_id))
    }

    async fn list_endpoint_connections(&self, endpoint_id: &str) -> Result<Vec<ConnectionRecord>> {
        let state = self.state.read();
        state.require_endpoint(endpoint_id)?;
        Ok(items_of(&state.endpoint_connections, endpoint_id))
    }
}

//! 规则存储管理
//!
//! 写时复制：写操作在互斥锁内编译规则并发布新的不可变快照，
//! 读操作只取当前快照的 `Arc`，永不阻塞。

use crate::compiler::{CompiledRule, RuleCompiler};
use crate::error::{Result, RuleError};
use crate::models::Rule;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 某一时刻的规则集合，按优先级降序排列（同优先级保持加载顺序）
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    rules: Vec<Arc<CompiledRule>>,
    version: u64,
    published_at: DateTime<Utc>,
}

impl RuleSnapshot {
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            version: 0,
            published_at: Utc::now(),
        }
    }

    /// 从规则列表直接构建快照，编译失败的规则被跳过
    pub fn from_rules(rules: Vec<Rule>) -> (Self, LoadReport) {
        let mut compiler = RuleCompiler::new();
        let mut ordered = Vec::with_capacity(rules.len());
        let report = compile_into(&mut compiler, rules, &mut ordered);
        (Self::build(ordered, 1), report)
    }

    fn build(ordered: Vec<Arc<CompiledRule>>, version: u64) -> Self {
        let mut rules = ordered;
        // sort_by 是稳定排序
        rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self {
            rules,
            version,
            published_at: Utc::now(),
        }
    }

    /// 按评估顺序排列的全部规则
    pub fn rules(&self) -> &[Arc<CompiledRule>] {
        &self.rules
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &Arc<CompiledRule>> {
        self.rules.iter().filter(|r| r.is_active())
    }

    pub fn get(&self, rule_id: &str) -> Option<&Arc<CompiledRule>> {
        self.rules.iter().find(|r| r.id() == rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

impl Default for RuleSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// 批量加载结果
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// 规则 ID + 失败原因
    pub failed: Vec<(String, String)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 写入方状态，受互斥锁保护
struct WriterState {
    compiler: RuleCompiler,
    /// 加载顺序，决定同优先级规则的先后
    ordered: Vec<Arc<CompiledRule>>,
    version: u64,
}

/// 规则存储
#[derive(Clone)]
pub struct RuleStore {
    current: Arc<ArcSwap<RuleSnapshot>>,
    writer: Arc<Mutex<WriterState>>,
}

impl RuleStore {
    /// 创建新的规则存储
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(RuleSnapshot::empty())),
            writer: Arc::new(Mutex::new(WriterState {
                compiler: RuleCompiler::new(),
                ordered: Vec::new(),
                version: 0,
            })),
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// 加载规则；同 ID 规则被替换并保持原位置
    #[instrument(skip(self, rule), fields(rule_id = %rule.id, rule_name = %rule.name))]
    pub fn load(&self, rule: Rule) -> Result<()> {
        let mut state = self.writer.lock();
        self.upsert_locked(&mut state, rule)
    }

    /// 加载规则（从 JSON 字符串）
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<String> {
        let rule: Rule = serde_json::from_str(json)?;
        let rule_id = rule.id.clone();
        self.load(rule)?;
        Ok(rule_id)
    }

    /// 更新规则
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn update(&self, rule: Rule) -> Result<()> {
        // 存在性检查与写入在同一把锁内，避免与并发删除交错
        let mut state = self.writer.lock();
        if !state.ordered.iter().any(|r| r.id() == rule.id) {
            warn!("更新不存在的规则: {}", rule.id);
            return Err(RuleError::RuleNotFound(rule.id));
        }

        self.upsert_locked(&mut state, rule)
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn delete(&self, rule_id: &str) -> Result<()> {
        let mut state = self.writer.lock();
        let before = state.ordered.len();
        state.ordered.retain(|r| r.id() != rule_id);

        if state.ordered.len() == before {
            warn!("删除不存在的规则: {}", rule_id);
            return Err(RuleError::RuleNotFound(rule_id.to_string()));
        }

        self.publish(&mut state);
        info!("规则已删除: {}", rule_id);
        Ok(())
    }

    /// 获取规则
    pub fn get(&self, rule_id: &str) -> Option<Arc<CompiledRule>> {
        self.current.load().get(rule_id).cloned()
    }

    /// 检查规则是否存在
    pub fn contains(&self, rule_id: &str) -> bool {
        self.current.load().get(rule_id).is_some()
    }

    /// 按评估顺序获取所有规则 ID
    pub fn list_ids(&self) -> Vec<String> {
        self.current
            .load()
            .rules()
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    /// 批量加载规则，只发布一次快照
    #[instrument(skip(self, rules), fields(count = rules.len()))]
    pub fn load_batch(&self, rules: Vec<Rule>) -> LoadReport {
        let mut state = self.writer.lock();
        let WriterState {
            compiler, ordered, ..
        } = &mut *state;
        let report = compile_into(compiler, rules, ordered);
        self.publish(&mut state);

        if !report.is_complete() {
            warn!("批量加载部分失败: {:?}", report.failed);
        }
        info!(
            "批量加载完成: {} 成功, {} 失败",
            report.loaded.len(),
            report.failed.len()
        );
        report
    }

    /// 用新的规则集合整体替换当前内容
    #[instrument(skip(self, rules), fields(count = rules.len()))]
    pub fn replace_all(&self, rules: Vec<Rule>) -> LoadReport {
        let mut state = self.writer.lock();
        let mut ordered = Vec::with_capacity(rules.len());
        let report = compile_into(&mut state.compiler, rules, &mut ordered);
        state.ordered = ordered;
        self.publish(&mut state);

        if !report.is_complete() {
            warn!("规则刷新时跳过 {} 条无效规则: {:?}", report.failed.len(), report.failed);
        }
        info!("规则集已替换: {} 条", report.loaded.len());
        report
    }

    /// 清空所有规则
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let mut state = self.writer.lock();
        let count = state.ordered.len();
        state.ordered.clear();
        self.publish(&mut state);
        info!("已清空 {} 条规则", count);
    }

    /// 获取规则统计信息
    pub fn stats(&self) -> RuleStoreStats {
        let snapshot = self.current.load();
        let rules_count = snapshot.len();
        let total_fields: usize = snapshot
            .rules()
            .iter()
            .map(|r| r.required_fields.len())
            .sum();

        RuleStoreStats {
            rules_count,
            active_count: snapshot.active_rules().count(),
            rules_with_config_errors: snapshot
                .rules()
                .iter()
                .filter(|r| r.has_config_errors())
                .count(),
            total_fields,
            avg_fields_per_rule: if rules_count > 0 {
                total_fields as f64 / rules_count as f64
            } else {
                0.0
            },
            version: snapshot.version(),
        }
    }

    fn upsert_locked(&self, state: &mut WriterState, rule: Rule) -> Result<()> {
        let compiled = Arc::new(state.compiler.compile(rule)?);
        let rule_id = compiled.id().to_string();
        upsert(&mut state.ordered, compiled);
        self.publish(state);

        info!("规则已加载: {}", rule_id);
        Ok(())
    }

    fn publish(&self, state: &mut WriterState) {
        state.version += 1;
        let snapshot = RuleSnapshot::build(state.ordered.clone(), state.version);
        self.current.store(Arc::new(snapshot));
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn upsert(ordered: &mut Vec<Arc<CompiledRule>>, compiled: Arc<CompiledRule>) {
    match ordered.iter_mut().find(|r| r.id() == compiled.id()) {
        Some(slot) => *slot = compiled,
        None => ordered.push(compiled),
    }
}

fn compile_into(
    compiler: &mut RuleCompiler,
    rules: Vec<Rule>,
    ordered: &mut Vec<Arc<CompiledRule>>,
) -> LoadReport {
    let mut report = LoadReport::default();
    for rule in rules {
        let rule_id = rule.id.clone();
        match compiler.compile(rule) {
            Ok(compiled) => {
                upsert(ordered, Arc::new(compiled));
                report.loaded.push(rule_id);
            }
            Err(e) => report.failed.push((rule_id, e.to_string())),
        }
    }
    report
}

/// 规则存储统计信息
#[derive(Debug, Clone)]
pub struct RuleStoreStats {
    /// 规则总数
    pub rules_count: usize,
    pub active_count: usize,
    pub rules_with_config_errors: usize,
    /// 所有规则使用的字段总数
    pub total_fields: usize,
    /// 平均每条规则使用的字段数
    pub avg_fields_per_rule: f64,
    /// 当前快照版本
    pub version: u64,
}

//! 规则引擎领域模型
//!
//! 线上格式沿用管理后台的 JSON：规则与条件字段使用 snake_case，
//! 同时接受 camelCase 别名。

use crate::operators::{LogicalOperator, Operator, PropertyType, Transform, deserialize_transform};
use chrono::{DateTime, Utc};
use hookroute_shared::serde_ext::{opt_int_from_form, string_or_number};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 新建规则的默认优先级
pub const DEFAULT_PRIORITY: i32 = 100;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// 编辑表单提交的优先级可能是 `"150"`，清空输入框时是 `""`
fn deserialize_priority<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    match opt_int_from_form(deserializer)? {
        None => Ok(DEFAULT_PRIORITY),
        Some(n) => i32::try_from(n)
            .map_err(|_| D::Error::custom(format!("优先级超出范围: {}", n))),
    }
}

fn default_active() -> bool {
    true
}

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 越大越先评估
    #[serde(default = "default_priority", deserialize_with = "deserialize_priority")]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, alias = "logicalOperator")]
    pub logical_operator: LogicalOperator,
    pub conditions: Vec<Condition>,
    /// 规则整体匹配时的目标集成
    #[serde(default, alias = "integrationCode", skip_serializing_if = "Option::is_none")]
    pub integration_code: Option<String>,
    #[serde(default = "Utc::now", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// 使用创建表单的默认值：AND、优先级 100、启用
    pub fn new(
        name: impl Into<String>,
        integration_code: impl Into<String>,
        conditions: Vec<Condition>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            priority: DEFAULT_PRIORITY,
            active: true,
            logical_operator: LogicalOperator::And,
            conditions,
            integration_code: Some(integration_code.into()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_logical_operator(mut self, operator: LogicalOperator) -> Self {
        self.logical_operator = operator;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// 非空的规则级目标集成
    pub fn rule_target(&self) -> Option<&str> {
        non_empty(self.integration_code.as_deref())
    }
}

/// 条件定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// 点号分隔的路径，如 `order.payment.method`；header / 参数类型下为名称
    #[serde(default, alias = "propertyPath", alias = "property_value")]
    pub property_path: String,
    #[serde(default, alias = "propertyType")]
    pub property_type: PropertyType,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    #[serde(
        default,
        deserialize_with = "deserialize_transform",
        skip_serializing_if = "Option::is_none"
    )]
    pub transform: Option<Transform>,
    #[serde(default, alias = "integrationCode", skip_serializing_if = "Option::is_none")]
    pub integration_code: Option<String>,
}

impl Condition {
    pub fn new(
        property_type: PropertyType,
        property_path: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            property_path: property_path.into(),
            property_type,
            operator,
            value: value.into(),
            transform: None,
            integration_code: None,
        }
    }

    /// JSON 请求体条件
    pub fn body_json(property_path: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::new(PropertyType::BodyJson, property_path, operator, value)
    }

    /// 存在性检查
    pub fn exists(property_type: PropertyType, property_path: impl Into<String>) -> Self {
        Self::new(property_type, property_path, Operator::Exists, Value::Null)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_integration_code(mut self, code: impl Into<String>) -> Self {
        self.integration_code = Some(code.into());
        self
    }

    /// 非空的条件级目标集成
    pub fn condition_target(&self) -> Option<&str> {
        non_empty(self.integration_code.as_deref())
    }

    /// 简短描述，用于追踪输出
    pub fn describe(&self) -> String {
        let source = format!("{}:{}", self.property_type, self.property_path);
        let source = match self.transform {
            Some(t) => format!("{}({})", t, source),
            None => source,
        };
        if self.operator.requires_value() {
            format!("{} {} {}", source, self.operator, self.value)
        } else {
            format!("{} {}", source, self.operator)
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// 单条规则的评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub rule_id: String,
    pub rule_name: String,
    /// 匹配成功的条件描述（下标 + 描述）
    pub matched_conditions: Vec<String>,
    pub matched_indices: Vec<usize>,
    /// 第一个匹配的条件下标
    pub first_matched_condition: Option<usize>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_us: i64,
}

impl EvaluationResult {
    pub fn new(rule_id: String, rule_name: String) -> Self {
        Self {
            matched: false,
            rule_id,
            rule_name,
            matched_conditions: Vec::new(),
            matched_indices: Vec::new(),
            first_matched_condition: None,
            evaluation_trace: Vec::new(),
            evaluation_time_us: 0,
        }
    }
}

//! 管理后台数据模型
//!
//! 集成与连接记录使用 camelCase，端点与输入定义使用 snake_case，
//! 与后台 JSON 保持一致。规则模型直接复用规则引擎的 `Rule`。

use chrono::{DateTime, Utc};
use hookroute_shared::serde_ext::{opt_string_or_number, string_or_number};
use rule_engine::{ResponseValidation, ResponseValidator, ValidationOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use rule_engine::Rule;

// ==================== 规则 ====================

/// 规则列表，逐条解码
///
/// 单条记录格式错误时只记入 `rejected`，其余规则照常返回。
#[derive(Debug, Clone, Default)]
pub struct RuleListing {
    pub rules: Vec<Rule>,
    /// (规则 id, 原因)
    pub rejected: Vec<(String, String)>,
}

impl RuleListing {
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut listing = Self::default();
        for (index, value) in values.into_iter().enumerate() {
            let id = match value.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => format!("#{}", index),
            };
            match serde_json::from_value::<Rule>(value) {
                Ok(rule) => listing.rules.push(rule),
                Err(e) => listing.rejected.push((id, e.to_string())),
            }
        }
        listing
    }
}

impl From<Vec<Rule>> for RuleListing {
    fn from(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            rejected: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.0".to_string()
}

// ==================== 集成 ====================

/// 出站 HTTP 调用定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// 唯一且创建后不可修改
    pub integration_code: String,
    pub name: String,
    #[serde(rename = "type", default = "default_integration_type")]
    pub integration_type: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub request: IntegrationRequest,
    #[serde(default)]
    pub response: IntegrationResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_integration_type() -> String {
    "http".to_string()
}

impl Integration {
    /// 使用创建表单的默认值
    pub fn new(integration_code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            integration_code: integration_code.into(),
            name: name.into(),
            integration_type: default_integration_type(),
            version: default_version(),
            active: true,
            description: None,
            request: IntegrationRequest::default(),
            response: IntegrationResponse::default(),
            updated_at: None,
        }
    }

    /// 拼接 baseUrl 与 path，并用 pathParams 替换 `{key}` 占位符
    pub fn request_url(&self) -> String {
        let base = self.request.base_url.trim_end_matches('/');
        let path = self.request.path.trim_start_matches('/');
        let mut url = if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        };

        for param in &self.request.path_params {
            url = url.replace(&format!("{{{}}}", param.key), &param.value);
        }
        url
    }

    /// 按 response 配置校验一次调用结果
    pub fn validate_response(&self, status: u16, body: &[u8]) -> ValidationOutcome {
        ResponseValidator::validate(
            &self.response.expected_status,
            &self.response.validation,
            status,
            body,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegrationRequest {
    pub method: HttpMethod,
    pub base_url: String,
    pub path: String,
    pub headers: Vec<KeyValue>,
    pub path_params: Vec<KeyValue>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegrationResponse {
    pub expected_status: Vec<u16>,
    pub validation: ResponseValidation,
    pub on_validation_success: OnValidationSuccess,
    pub on_validation_failure: OnValidationFailure,
}

impl Default for IntegrationResponse {
    fn default() -> Self {
        Self {
            expected_status: vec![200],
            validation: ResponseValidation::default(),
            on_validation_success: OnValidationSuccess::default(),
            on_validation_failure: OnValidationFailure::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    #[default]
    Return,
    Error,
    Forward,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseData {
    #[default]
    Transformed,
    Original,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OnValidationSuccess {
    pub action: ValidationAction,
    pub data: ResponseData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnValidationFailure {
    pub action: ValidationAction,
    pub error_code: String,
    pub error_message: String,
}

impl Default for OnValidationFailure {
    fn default() -> Self {
        Self {
            action: ValidationAction::Error,
            error_code: "VALIDATION_FAILED".to_string(),
            error_message: "Response validation failed".to_string(),
        }
    }
}

// ==================== 端点 ====================

/// 入站 webhook 接收端定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// 唯一且创建后不可修改
    pub endpoint_code: String,
    pub url_path: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Endpoint {
    pub fn new(
        endpoint_code: impl Into<String>,
        url_path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            endpoint_code: endpoint_code.into(),
            url_path: url_path.into(),
            name: name.into(),
            version: default_version(),
            active: true,
            description: None,
            created_at: None,
            updated_at: None,
        }
    }
}

// ==================== 输入定义 ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub property_type: SchemaType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProperty>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: default_schema_type(),
            properties: BTreeMap::new(),
        }
    }
}

/// 入站请求体的结构定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub code: String,
    #[serde(default = "default_input_method")]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: InputSchema,
    #[serde(
        default,
        alias = "endpointId",
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub endpoint_id: Option<String>,
}

fn default_input_method() -> HttpMethod {
    HttpMethod::Post
}

// ==================== 端点子资源 ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Success,
    Error,
}

/// 一次入站连接的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ConnectionStatus,
    /// 毫秒
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRuleSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointIntegrationSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub integration_type: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointInputSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub fields: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_listing_keeps_valid_rules() {
        let values: Vec<Value> = serde_json::from_str(
            r#"[
                {"id": 1, "name": "ok", "priority": "150", "integrationCode": "a",
                 "conditions": [{"property_path": "x", "operator": "exists"}]},
                {"id": 2, "name": "bad priority", "priority": "soon", "conditions": []},
                {"name": "no id", "conditions": []}
            ]"#,
        )
        .unwrap();

        let listing = RuleListing::from_values(values);
        assert_eq!(listing.rules.len(), 1);
        assert_eq!(listing.rules[0].priority, 150);
        let rejected: Vec<&str> = listing.rejected.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(rejected, vec!["2", "#2"]);
    }
    use rule_engine::{Operator, ValidationMode};
    use serde_json::json;

    #[test]
    fn test_integration_minimal_json() {
        let json = r#"{
            "id": 1,
            "integrationCode": "mock_payment",
            "name": "Payment Transaction Check Test",
            "active": true,
            "type": "rest",
            "updatedAt": "2025-04-01T10:00:00.000Z"
        }"#;

        let integration: Integration = serde_json::from_str(json).unwrap();
        assert_eq!(integration.id, "1");
        assert_eq!(integration.integration_type, "rest");
        assert_eq!(integration.version, "1.0");
        assert_eq!(integration.response.expected_status, vec![200]);
        assert_eq!(
            integration.response.on_validation_failure.error_code,
            "VALIDATION_FAILED"
        );
    }

    #[test]
    fn test_integration_full_json() {
        let json = json!({
            "integrationCode": "paypal_enhanced_verify",
            "name": "PayPal enhanced",
            "type": "http",
            "request": {
                "method": "POST",
                "baseUrl": "https://api.paypal.example/",
                "path": "/v1/orders/{orderId}/verify",
                "headers": [{"key": "Authorization", "value": "Bearer x"}],
                "pathParams": [{"key": "orderId", "value": "42"}],
                "body": "{}"
            },
            "response": {
                "expectedStatus": [200, 201],
                "validation": {
                    "mode": "any",
                    "conditions": [{"path": "status", "operator": "equals", "value": "ok"}]
                },
                "onValidationSuccess": {"action": "forward", "data": "original"},
                "onValidationFailure": {"action": "notify", "errorCode": "E1", "errorMessage": "bad"}
            }
        });

        let integration: Integration = serde_json::from_value(json).unwrap();
        assert_eq!(integration.request.method, HttpMethod::Post);
        assert_eq!(
            integration.request_url(),
            "https://api.paypal.example/v1/orders/42/verify"
        );
        assert_eq!(integration.response.validation.mode, ValidationMode::Any);
        assert_eq!(
            integration.response.validation.conditions[0].operator,
            Operator::Equals
        );
        assert_eq!(
            integration.response.on_validation_success.action,
            ValidationAction::Forward
        );

        let outcome = integration.validate_response(201, br#"{"status": "ok"}"#);
        assert!(outcome.passed);
        let outcome = integration.validate_response(500, br#"{"status": "ok"}"#);
        assert!(!outcome.status_ok);
    }

    #[test]
    fn test_request_url_without_path() {
        let mut integration = Integration::new("code", "name");
        integration.request.base_url = "https://example.com/".to_string();
        assert_eq!(integration.request_url(), "https://example.com");
    }

    #[test]
    fn test_endpoint_json() {
        let json = r#"{
            "id": 1,
            "endpoint_code": "payment_webhook",
            "url_path": "/api/payments/webhook",
            "name": "Payment Webhook Endpoint",
            "version": "1.0",
            "active": true,
            "createdAt": "2025-03-15T10:00:00.000Z"
        }"#;

        let endpoint: Endpoint = serde_json::from_str(json).unwrap();
        assert_eq!(endpoint.id, "1");
        assert_eq!(endpoint.endpoint_code, "payment_webhook");
        assert!(endpoint.created_at.is_some());
        assert!(endpoint.updated_at.is_none());
    }

    #[test]
    fn test_input_schema_json() {
        let json = r#"{
            "id": "in-1",
            "code": "order_created",
            "method": "POST",
            "schema": {
                "type": "object",
                "properties": {
                    "orderId": {"type": "string"},
                    "total": {"type": "number"},
                    "items": {"type": "array"}
                }
            },
            "endpointId": 1
        }"#;

        let input: Input = serde_json::from_str(json).unwrap();
        assert_eq!(input.endpoint_id.as_deref(), Some("1"));
        assert_eq!(input.schema.properties.len(), 3);
        assert_eq!(input.schema.properties["total"].property_type, SchemaType::Number);
    }

    #[test]
    fn test_connection_record_json() {
        let json = r#"{
            "id": "conn-122",
            "timestamp": "2025-04-02T13:15:00Z",
            "status": "error",
            "duration": 1245,
            "statusCode": 500,
            "errorMessage": "Gateway timeout"
        }"#;

        let record: ConnectionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, ConnectionStatus::Error);
        assert_eq!(record.status_code, Some(500));
        assert_eq!(record.error_message.as_deref(), Some("Gateway timeout"));
    }
}

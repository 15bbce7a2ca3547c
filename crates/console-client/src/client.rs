//! 管理后台 REST 客户端
//!
//! `ConsoleApi` 抽象了后台契约，`HttpConsoleClient` 通过 reqwest 访问真实后台。

use crate::error::{ConsoleError, Result};
use crate::models::{
    ConnectionRecord, Endpoint, EndpointInputSummary, EndpointIntegrationSummary,
    EndpointRuleSummary, Input, Integration, Rule, RuleListing,
};
use async_trait::async_trait;
use hookroute_shared::config::ConsoleConfig;
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 管理后台接口
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    // 规则
    /// 单条规则解码失败不会让整个列表失败
    async fn list_rules(&self) -> Result<RuleListing>;
    async fn get_rule(&self, id: &str) -> Result<Rule>;
    async fn create_rule(&self, rule: &Rule) -> Result<Rule>;
    async fn update_rule(&self, id: &str, rule: &Rule) -> Result<Rule>;
    async fn delete_rule(&self, id: &str) -> Result<()>;

    // 集成
    async fn list_integrations(&self) -> Result<Vec<Integration>>;
    async fn get_integration(&self, id: &str) -> Result<Integration>;
    async fn create_integration(&self, integration: &Integration) -> Result<Integration>;
    async fn update_integration(&self, id: &str, integration: &Integration) -> Result<Integration>;
    async fn delete_integration(&self, id: &str) -> Result<()>;

    // 端点
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>>;
    async fn get_endpoint(&self, id: &str) -> Result<Endpoint>;
    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<Endpoint>;
    async fn update_endpoint(&self, id: &str, endpoint: &Endpoint) -> Result<Endpoint>;
    async fn delete_endpoint(&self, id: &str) -> Result<()>;

    // 输入定义
    async fn list_inputs(&self) -> Result<Vec<Input>>;
    async fn get_input(&self, id: &str) -> Result<Input>;
    async fn create_input(&self, input: &Input) -> Result<Input>;
    async fn update_input(&self, id: &str, input: &Input) -> Result<Input>;
    async fn delete_input(&self, id: &str) -> Result<()>;
    async fn list_inputs_by_endpoint(&self, endpoint_id: &str) -> Result<Vec<Input>>;

    // 端点子资源
    async fn list_endpoint_inputs(&self, endpoint_id: &str) -> Result<Vec<EndpointInputSummary>>;
    async fn list_endpoint_rules(&self, endpoint_id: &str) -> Result<Vec<EndpointRuleSummary>>;
    async fn list_endpoint_integrations(
        &self,
        endpoint_id: &str,
    ) -> Result<Vec<EndpointIntegrationSummary>>;
    async fn list_endpoint_connections(&self, endpoint_id: &str) -> Result<Vec<ConnectionRecord>>;
}

/// 404 时报告的资源
#[derive(Clone, Copy)]
struct Subject<'a> {
    entity: &'static str,
    id: &'a str,
}

fn subject<'a>(entity: &'static str, id: &'a str) -> Option<Subject<'a>> {
    Some(Subject { entity, id })
}

/// HTTP 客户端
#[derive(Clone)]
pub struct HttpConsoleClient {
    client: Client,
    base_url: String,
}

impl HttpConsoleClient {
    pub fn new(config: &ConsoleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, subject: Option<Subject<'_>>) -> Result<T> {
        let bytes = self.send(Method::GET, path, None, subject).await?;
        decode(&bytes)
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let bytes = self.send(Method::POST, path, Some(body), None).await?;
        decode(&bytes)
    }

    async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        subject: Option<Subject<'_>>,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let bytes = self.send(Method::PUT, path, Some(body), subject).await?;
        decode(&bytes)
    }

    async fn delete(&self, path: &str, subject: Option<Subject<'_>>) -> Result<()> {
        // 删除接口的响应体不固定，只看状态码
        self.send(Method::DELETE, path, None, subject).await?;
        Ok(())
    }

    #[instrument(skip(self, body, subject), fields(method = %method))]
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        subject: Option<Subject<'_>>,
    ) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await.inspect_err(|e| {
            warn!(url = %url, error = %e, "管理后台请求失败");
        })?;
        self.handle_response(resp, subject).await
    }

    async fn handle_response(&self, resp: Response, subject: Option<Subject<'_>>) -> Result<Vec<u8>> {
        let status = resp.status();
        debug!(status = status.as_u16(), url = %resp.url(), "管理后台响应");

        if status.is_success() {
            return Ok(resp.bytes().await?.to_vec());
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            if let Some(s) = subject {
                return Err(ConsoleError::not_found(s.entity, s.id));
            }
        }

        let text = resp.text().await.unwrap_or_default();
        let message = error_message(&text)
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
        warn!(status = status.as_u16(), message = %message, "管理后台返回错误");

        Err(ConsoleError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        })
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// 取后台错误体中的 `message` 字段，否则使用原始文本
fn error_message(text: &str) -> Option<String> {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) {
        if let Some(Value::String(msg)) = obj.get("message") {
            return Some(msg.clone());
        }
    }
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl ConsoleApi for HttpConsoleClient {
    async fn list_rules(&self) -> Result<RuleListing> {
        let values: Vec<Value> = self.get("/api/rules", None).await?;
        let listing = RuleListing::from_values(values);
        for (id, reason) in &listing.rejected {
            warn!(rule_id = %id, reason = %reason, "跳过无法解析的规则");
        }
        Ok(listing)
    }

    async fn get_rule(&self, id: &str) -> Result<Rule> {
        self.get(&format!("/api/rules/{}", id), subject("Rule", id)).await
    }

    async fn create_rule(&self, rule: &Rule) -> Result<Rule> {
        self.post("/api/rules", rule).await
    }

    async fn update_rule(&self, id: &str, rule: &Rule) -> Result<Rule> {
        self.put(&format!("/api/rules/{}", id), rule, subject("Rule", id)).await
    }

    async fn delete_rule(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/rules/{}", id), subject("Rule", id)).await
    }

    async fn list_integrations(&self) -> Result<Vec<Integration>> {
        self.get("/api/integrations", None).await
    }

    async fn get_integration(&self, id: &str) -> Result<Integration> {
        self.get(&format!("/api/integrations/{}", id), subject("Integration", id))
            .await
    }

    async fn create_integration(&self, integration: &Integration) -> Result<Integration> {
        self.post("/api/integrations", integration).await
    }

    async fn update_integration(&self, id: &str, integration: &Integration) -> Result<Integration> {
        self.put(
            &format!("/api/integrations/{}", id),
            integration,
            subject("Integration", id),
        )
        .await
    }

    async fn delete_integration(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/integrations/{}", id), subject("Integration", id))
            .await
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        self.get("/api/endpoints", None).await
    }

    async fn get_endpoint(&self, id: &str) -> Result<Endpoint> {
        self.get(&format!("/api/endpoints/{}", id), subject("Endpoint", id))
            .await
    }

    async fn create_endpoint(&self, endpoint: &Endpoint) -> Result<Endpoint> {
        self.post("/api/endpoints", endpoint).await
    }

    async fn update_endpoint(&self, id: &str, endpoint: &Endpoint) -> Result<Endpoint> {
        self.put(
            &format!("/api/endpoints/{}", id),
            endpoint,
            subject("Endpoint", id),
        )
        .await
    }

    async fn delete_endpoint(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/endpoints/{}", id), subject("Endpoint", id))
            .await
    }

    async fn list_inputs(&self) -> Result<Vec<Input>> {
        self.get("/api/inputs", None).await
    }

    async fn get_input(&self, id: &str) -> Result<Input> {
        self.get(&format!("/api/inputs/{}", id), subject("Input", id)).await
    }

    async fn create_input(&self, input: &Input) -> Result<Input> {
        self.post("/api/inputs", input).await
    }

    async fn update_input(&self, id: &str, input: &Input) -> Result<Input> {
        self.put(&format!("/api/inputs/{}", id), input, subject("Input", id))
            .await
    }

    async fn delete_input(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/inputs/{}", id), subject("Input", id))
            .await
    }

    async fn list_inputs_by_endpoint(&self, endpoint_id: &str) -> Result<Vec<Input>> {
        self.get(
            &format!("/api/inputs/endpoint/{}", endpoint_id),
            subject("Endpoint", endpoint_id),
        )
        .await
    }

    async fn list_endpoint_inputs(&self, endpoint_id: &str) -> Result<Vec<EndpointInputSummary>> {
        self.get(
            &format!("/api/endpoints/{}/inputs", endpoint_id),
            subject("Endpoint", endpoint_id),
        )
        .await
    }

    async fn list_endpoint_rules(&self, endpoint_id: &str) -> Result<Vec<EndpointRuleSummary>> {
        self.get(
            &format!("/api/endpoints/{}/rules", endpoint_id),
            subject("Endpoint", endpoint_id),
        )
        .await
    }

    async fn list_endpoint_integrations(
        &self,
        endpoint_id: &str,
    ) -> Result<Vec<EndpointIntegrationSummary>> {
        self.get(
            &format!("/api/endpoints/{}/integrations", endpoint_id),
            subject("Endpoint", endpoint_id),
        )
        .await
    }

    async fn list_endpoint_connections(&self, endpoint_id: &str) -> Result<Vec<ConnectionRecord>> {
        self.get(
            &format!("/api/endpoints/{}/connections", endpoint_id),
            subject("Endpoint", endpoint_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message": "integrationCode already exists"}"#),
            Some("integrationCode already exists".to_string())
        );
        assert_eq!(error_message("Bad Gateway"), Some("Bad Gateway".to_string()));
        assert_eq!(error_message("  "), None);
        assert_eq!(
            error_message(r#"{"error": "x"}"#),
            Some(r#"{"error": "x"}"#.to_string())
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ConsoleConfig {
            base_url: "http://localhost:3073/".to_string(),
            ..Default::default()
        };
        let client = HttpConsoleClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3073");
    }

    #[tokio::test]
    async fn test_mock_console_api() {
        let mut mock = MockConsoleApi::new();
        mock.expect_get_rule()
            .withf(|id| id.to_string() == "42")
            .returning(|id| Err(ConsoleError::not_found("Rule", id)));

        let err = mock.get_rule("42").await.unwrap_err();
        assert!(err.is_not_found());
    }
}

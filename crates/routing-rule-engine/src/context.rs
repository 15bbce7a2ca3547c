//! 请求上下文与取值
//!
//! 一个入站 webhook 请求的只读视图。JSON 请求体在第一次被
//! `body_json` 条件访问时解析，之后同一上下文内复用解析结果。

use crate::operators::PropertyType;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// 请求上下文
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    method: String,
    path: String,
    query: HashMap<String, String>,
    path_params: HashMap<String, String>,
    /// 键统一为小写
    headers: HashMap<String, String>,
    body: Vec<u8>,
    parsed_body: OnceLock<Option<Value>>,
}

impl RequestContext {
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// 仅包含 JSON 请求体的上下文
    pub fn from_json(body: &Value) -> Self {
        Self::builder().json_body(body).build()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// 替换路径参数（端点匹配之后调用）
    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    /// 解析后的 JSON 请求体；空请求体或非法 JSON 返回 None
    pub fn json_body(&self) -> Option<&Value> {
        self.parsed_body
            .get_or_init(|| {
                if self.body.iter().all(u8::is_ascii_whitespace) {
                    return None;
                }
                match serde_json::from_slice(&self.body) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        debug!(error = %e, "请求体不是合法 JSON，body_json 条件按缺失处理");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// 按取值来源和路径取值，取不到返回 None
    pub fn extract(&self, property_type: PropertyType, property_path: &str) -> Option<Value> {
        match property_type {
            PropertyType::BodyJson => {
                let doc = self.json_body()?;
                lookup_path(doc, property_path).cloned()
            }
            PropertyType::BodyText => {
                if self.body.is_empty() {
                    None
                } else {
                    Some(Value::String(String::from_utf8_lossy(&self.body).into_owned()))
                }
            }
            PropertyType::Header => self.header(property_path.trim()).map(Value::from),
            PropertyType::UrlParameter => self.query_param(property_path.trim()).map(Value::from),
            PropertyType::Path => {
                let name = property_path.trim();
                if name.is_empty() {
                    Some(Value::String(self.path.clone()))
                } else {
                    self.path_param(name).map(Value::from)
                }
            }
        }
    }
}

/// 沿点号路径查找 JSON 值，数字段可以索引数组；空路径返回整个文档
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return Some(doc);
    }

    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// RequestContext 构建器
#[derive(Debug, Default)]
pub struct RequestContextBuilder {
    method: Option<String>,
    path: Option<String>,
    query: HashMap<String, String>,
    path_params: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RequestContextBuilder {
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 同名参数只保留第一个
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self = self.query_param(k, v);
        }
        self
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// 同名 header 只保留第一个
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.as_ref().to_ascii_lowercase())
            .or_insert_with(|| value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json_body(self, body: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(body.to_string())
    }

    pub fn build(self) -> RequestContext {
        RequestContext {
            method: self.method.unwrap_or_else(|| "POST".to_string()),
            path: self.path.unwrap_or_else(|| "/".to_string()),
            query: self.query,
            path_params: self.path_params,
            headers: self.headers,
            body: self.body,
            parsed_body: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_context() -> RequestContext {
        RequestContext::builder()
            .method("POST")
            .path("/orders/42/payments")
            .header("X-Signature", "abc123")
            .query_param("source", "mobile")
            .path_param("orderId", "42")
            .json_body(&json!({
                "order": {
                    "total": 1500,
                    "payment": {"method": "PayPal"},
                    "items": [{"sku": "A-1"}, {"sku": "B-2"}]
                },
                "note": null
            }))
            .build()
    }

    #[test]
    fn test_body_json_paths() {
        let ctx = order_context();
        assert_eq!(
            ctx.extract(PropertyType::BodyJson, "order.payment.method"),
            Some(json!("PayPal"))
        );
        assert_eq!(ctx.extract(PropertyType::BodyJson, "order.total"), Some(json!(1500)));
        assert_eq!(ctx.extract(PropertyType::BodyJson, "order.items.1.sku"), Some(json!("B-2")));
        assert_eq!(ctx.extract(PropertyType::BodyJson, "order.items.5.sku"), None);
        assert_eq!(ctx.extract(PropertyType::BodyJson, "order.customer.email"), None);
        // null 视为存在
        assert_eq!(ctx.extract(PropertyType::BodyJson, "note"), Some(Value::Null));
    }

    #[test]
    fn test_empty_path_returns_document() {
        let ctx = RequestContext::from_json(&json!({"a": 1}));
        assert_eq!(ctx.extract(PropertyType::BodyJson, ""), Some(json!({"a": 1})));
    }

    #[test]
    fn test_malformed_json_is_absent() {
        let ctx = RequestContext::builder().body("{not json").build();
        assert_eq!(ctx.extract(PropertyType::BodyJson, "a"), None);
        assert_eq!(
            ctx.extract(PropertyType::BodyText, ""),
            Some(json!("{not json"))
        );
    }

    #[test]
    fn test_empty_body_text_is_absent() {
        let ctx = RequestContext::builder().build();
        assert_eq!(ctx.extract(PropertyType::BodyText, ""), None);
        assert_eq!(ctx.extract(PropertyType::BodyJson, ""), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = order_context();
        assert_eq!(ctx.extract(PropertyType::Header, "x-signature"), Some(json!("abc123")));
        assert_eq!(ctx.extract(PropertyType::Header, "X-SIGNATURE"), Some(json!("abc123")));
        assert_eq!(ctx.extract(PropertyType::Header, "x-missing"), None);
    }

    #[test]
    fn test_query_and_path_params() {
        let ctx = order_context();
        assert_eq!(ctx.extract(PropertyType::UrlParameter, "source"), Some(json!("mobile")));
        assert_eq!(ctx.extract(PropertyType::UrlParameter, "missing"), None);
        assert_eq!(ctx.extract(PropertyType::Path, "orderId"), Some(json!("42")));
        assert_eq!(ctx.extract(PropertyType::Path, ""), Some(json!("/orders/42/payments")));
    }

    #[test]
    fn test_first_query_value_wins() {
        let ctx = RequestContext::builder()
            .query_pairs(vec![("tag", "a"), ("tag", "b")])
            .build();
        assert_eq!(ctx.query_param("tag"), Some("a"));
    }
}

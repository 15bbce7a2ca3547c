//! 端点路径模板
//!
//! 支持 `/orders/{orderId}` 与 `/orders/:orderId` 两种参数写法。

use crate::error::{Result, RuleError};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// 解析后的路径模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();

        for part in split_segments(template) {
            let name = if let Some(inner) = part.strip_prefix('{') {
                Some(inner.strip_suffix('}').ok_or_else(|| {
                    RuleError::ParseError(format!("路径模板 '{}' 的参数缺少右括号", template))
                })?)
            } else {
                part.strip_prefix(':')
            };

            match name {
                Some(n) if n.is_empty() => {
                    return Err(RuleError::ParseError(format!(
                        "路径模板 '{}' 含有空参数名",
                        template
                    )));
                }
                Some(n) => {
                    if segments.contains(&Segment::Param(n.to_string())) {
                        return Err(RuleError::ParseError(format!(
                            "路径模板 '{}' 的参数 '{}' 重复",
                            template, n
                        )));
                    }
                    segments.push(Segment::Param(n.to_string()));
                }
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 字面量段数量，越多越具体
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// 匹配具体路径，成功时返回路径参数
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_template() {
        let t = PathTemplate::parse("/webhooks/payments").unwrap();
        assert_eq!(t.literal_count(), 2);
        assert_eq!(t.matches("/webhooks/payments"), Some(HashMap::new()));
        assert_eq!(t.matches("/webhooks/payments/"), Some(HashMap::new()));
        assert_eq!(t.matches("/webhooks/orders"), None);
        assert_eq!(t.matches("/webhooks"), None);
    }

    #[test]
    fn test_brace_and_colon_params() {
        let braces = PathTemplate::parse("/orders/{orderId}/events/{kind}").unwrap();
        let params = braces.matches("/orders/42/events/paid").unwrap();
        assert_eq!(params["orderId"], "42");
        assert_eq!(params["kind"], "paid");

        let colon = PathTemplate::parse("/orders/:orderId").unwrap();
        assert_eq!(colon.matches("/orders/7").unwrap()["orderId"], "7");
        assert_eq!(colon.param_names().collect::<Vec<_>>(), vec!["orderId"]);
    }

    #[test]
    fn test_invalid_templates() {
        assert!(PathTemplate::parse("/orders/{}").is_err());
        assert!(PathTemplate::parse("/orders/{id").is_err());
        assert!(PathTemplate::parse("/orders/:").is_err());
        assert!(PathTemplate::parse("/a/{id}/b/{id}").is_err());
    }

    #[test]
    fn test_root_template() {
        let t = PathTemplate::parse("/").unwrap();
        assert_eq!(t.matches("/"), Some(HashMap::new()));
        assert_eq!(t.matches("/x"), None);
    }
}

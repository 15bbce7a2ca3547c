//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::observability::ObservabilityConfig;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 管理后台访问模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMode {
    /// 通过 HTTP 访问真实后台
    #[default]
    Online,
    /// 使用内存中的示例数据，不访问网络
    Offline,
}

/// 管理后台（规则 / 集成 / 端点 / 输入定义的 REST 服务）配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub mode: ConsoleMode,
    /// 单次请求超时
    pub timeout_seconds: u64,
    /// 规则集同步间隔
    pub refresh_interval_seconds: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3073".to_string(),
            mode: ConsoleMode::Online,
            timeout_seconds: 10,
            refresh_interval_seconds: 30,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub console: ConsoleConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（HOOKROUTE__ 前缀，如 HOOKROUTE__CONSOLE__BASE_URL -> console.base_url）
    /// 5. 服务特定端口环境变量（如 WEBHOOK_ROUTER_PORT）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        // .env 不存在是正常情况
        let _ = dotenvy::dotenv();

        let env = std::env::var("HOOKROUTE_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            // 字段名本身含下划线，所以层级分隔符使用双下划线
            .add_source(
                Environment::with_prefix("HOOKROUTE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if let Some(port) = Self::service_port_from_env(service_name) {
            config.server.port = port;
        }

        Ok(config)
    }

    /// 服务特定端口环境变量名
    ///
    /// 将 "webhook-router" 转换为 "WEBHOOK_ROUTER_PORT"
    fn service_port_env_var(service_name: &str) -> String {
        format!("{}_PORT", service_name.to_uppercase().replace('-', "_"))
    }

    fn service_port_from_env(service_name: &str) -> Option<u16> {
        std::env::var(Self::service_port_env_var(service_name))
            .ok()
            .and_then(|v| v.parse().ok())
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.console.base_url, "http://localhost:3073");
        assert_eq!(config.console.timeout_seconds, 10);
        assert_eq!(config.console.mode, ConsoleMode::Online);
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_service_port_env_var_name() {
        assert_eq!(
            AppConfig::service_port_env_var("webhook-router"),
            "WEBHOOK_ROUTER_PORT"
        );
        assert_eq!(
            AppConfig::service_port_env_var("my-custom-service"),
            "MY_CUSTOM_SERVICE_PORT"
        );
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let config: AppConfig = Config::builder()
            .set_override("console.mode", "offline")
            .unwrap()
            .set_override("console.refresh_interval_seconds", 5)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.console.mode, ConsoleMode::Offline);
        assert_eq!(config.console.refresh_interval_seconds, 5);
        // 未提供的字段回落到默认值
        assert_eq!(config.console.base_url, "http://localhost:3073");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_is_production() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
        assert!(!AppConfig::default().is_production());
    }
}

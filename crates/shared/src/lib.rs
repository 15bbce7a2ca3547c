//! 共享库
//!
//! 包含所有 crate 共用的配置、错误处理、可观测性和序列化辅助代码。

pub mod config;
pub mod error;
pub mod observability;
pub mod serde_ext;

//! # `kabu-core` - 领域核心
//!
//! 只包含实体、错误枚举和端口 (Port) Trait，不依赖任何具体的基础设施实现。
//! 行情源、大模型客户端、缓存存储均由外层 crate 实现并通过 `Arc<dyn Trait>` 注入。

pub mod cache;
pub mod chat;
pub mod common;
pub mod config;
pub mod llm;
pub mod market;
pub mod tls;

#[cfg(feature = "test-utils")]
pub mod testing;

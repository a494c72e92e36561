//! # `kabu-api` - HTTP API 网关
//!
//! 本 crate 是股票洞察面板的 HTTP/REST 服务入口。
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 接收浏览器端的 HTTP 请求并按会话 ID 分发
//! - 调用下层 `SessionRegistry` / `DashboardSession` 完成视图编排
//! - 将视图模型转换为 DTO 返回给前端

pub mod error;
pub mod routes;
pub mod server;
pub mod types;

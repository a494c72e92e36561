//! # API 统一错误处理
//!
//! 将下层各 crate 的错误类型统一映射到 HTTP 状态码与 JSON 响应体。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kabu_core::chat::error::ChatError;
use kabu_core::market::error::MarketError;
use kabu_dashboard::error::DashboardError;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// API 层统一错误枚举
#[derive(Error, Debug)]
pub enum ApiError {
    /// 资源未找到 (404)：会话不存在或代码非法
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 请求参数错误 (400)
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    /// 上一轮对话尚未结束 (409)
    #[error("请求冲突: {0}")]
    Conflict(String),

    /// 上游行情源不可用 (502)
    #[error("上游服务不可用: {0}")]
    BadGateway(String),

    /// 下层业务错误 (500)
    #[error("内部服务错误: {0}")]
    Internal(String),
}

/// 将 `ApiError` 转换为 axum 的 HTTP 响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::BadGateway(msg) => {
                tracing::warn!("上游服务不可用: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            ApiError::Internal(msg) => {
                // 内部错误只记录日志，不向客户端透传细节
                tracing::error!("内部服务错误: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "服务器内部错误".to_string(),
                )
            }
        };

        let body = Json(ApiErrorResponse::from_msg(message));
        (status, body).into_response()
    }
}

/// 从 `MarketError` 转换
impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::InvalidTicker(_) => ApiError::NotFound(err.to_string()),
            MarketError::UpstreamUnavailable(_) | MarketError::Parse(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}

/// 从 `DashboardError` 转换
impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::Market(e) => e.into(),
            DashboardError::SessionNotFound(id) => {
                ApiError::NotFound(format!("Session not found: {}", id))
            }
            DashboardError::BadRequest(msg) => ApiError::BadRequest(msg),
            DashboardError::Chat(e @ ChatError::TurnInProgress) => {
                ApiError::Conflict(e.to_string())
            }
            DashboardError::Chat(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

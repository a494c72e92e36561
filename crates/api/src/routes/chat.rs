//! # AI 对话路由控制器
//!
//! 对话记录保存在会话内，每次提交都会把完整历史发送给补全接口。

use axum::Json;
use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, ChatRequest, ChatResponse};

/// 获取对话记录
///
/// 首次访问时创建对话；若个股视图已有 AI 分析，则以其作为上下文种子。
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/chat",
    tag = "对话 (Chat)",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "对话记录", body = ApiResponse<ChatResponse>),
        (status = 404, description = "会话不存在")
    )
)]
pub async fn chat_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ChatResponse>>, ApiError> {
    let session = state.sessions.get(&id)?;
    let view = session.chat_history().await?;
    Ok(Json(ApiResponse::ok(view.into())))
}

/// 发送一条消息
///
/// 补全失败时助手回复为 `Error: ...` 文本，接口仍返回 200。
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/chat",
    tag = "对话 (Chat)",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "本轮对话完成", body = ApiResponse<ChatResponse>),
        (status = 400, description = "消息为空"),
        (status = 404, description = "会话不存在"),
        (status = 409, description = "上一条消息仍在等待回复")
    )
)]
pub async fn chat_submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatResponse>>, ApiError> {
    let session = state.sessions.get(&id)?;
    let view = session.chat_submit(&req.message).await?;
    Ok(Json(ApiResponse::ok(view.into())))
}

/// 清空对话记录
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}/chat",
    tag = "对话 (Chat)",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "对话已清空", body = ApiResponse<bool>),
        (status = 404, description = "会话不存在")
    )
)]
pub async fn chat_reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let session = state.sessions.get(&id)?;
    session.chat_reset().await;
    Ok(Json(ApiResponse::ok(true)))
}

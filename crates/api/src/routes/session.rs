//! # 会话路由控制器
//!
//! 每个浏览器标签页对应一个独立会话，会话之间不共享任何缓存或对话记录。

use axum::Json;
use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, SessionResponse};

/// 创建新会话
///
/// 返回的会话 ID 用于后续所有视图接口。
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "会话 (Session)",
    responses(
        (status = 200, description = "会话创建成功", body = ApiResponse<SessionResponse>)
    )
)]
pub async fn create_session(State(state): State<AppState>) -> Json<ApiResponse<SessionResponse>> {
    let session = state.sessions.create();
    Json(ApiResponse::ok(SessionResponse {
        session_id: session.id().to_string(),
    }))
}

/// 结束会话
///
/// 立即释放该会话的全部缓存与对话记录。
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "会话 (Session)",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    responses(
        (status = 200, description = "会话已结束", body = ApiResponse<bool>),
        (status = 404, description = "会话不存在")
    )
)]
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    if !state.sessions.end(&id) {
        return Err(ApiError::NotFound(format!("Session not found: {}", id)));
    }
    Ok(Json(ApiResponse::ok(true)))
}

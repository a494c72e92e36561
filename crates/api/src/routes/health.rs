use axum::Json;
use axum::extract::State;

use crate::server::AppState;
use crate::types::{ApiResponse, HealthResponse};

/// 健康检查
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "系统 (System)",
    responses(
        (status = 200, description = "服务正常", body = ApiResponse<HealthResponse>)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        sessions: state.sessions.len(),
    }))
}

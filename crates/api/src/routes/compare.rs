use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use kabu_core::common::Ticker;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, CompareRequest, CompareResponse};

/// 格式非法的代码按请求参数错误处理；格式合法但不存在的代码由对比视图以失败文本返回
fn parse_side(raw: &str) -> Result<Ticker, ApiError> {
    Ticker::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// 对比两只股票
///
/// 任一代码无报价时 `verdict` 为 `Error: One or both stock tickers are invalid.`，不调用补全接口。
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/compare",
    tag = "对比 (Compare)",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    request_body = CompareRequest,
    responses(
        (status = 200, description = "对比完成", body = ApiResponse<CompareResponse>),
        (status = 400, description = "请求参数错误"),
        (status = 404, description = "会话不存在")
    )
)]
pub async fn compare(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<ApiResponse<CompareResponse>>, ApiError> {
    let session = state.sessions.get(&id)?;
    let first = parse_side(&req.first)?;
    let second = parse_side(&req.second)?;
    let params = req.history.into_params(Utc::now().date_naive())?;

    let view = session.compare_view(&first, &second, &params).await?;
    Ok(Json(ApiResponse::ok(view.into())))
}

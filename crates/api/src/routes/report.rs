use axum::Json;
use axum::extract::{Path, State};
use kabu_core::common::Ticker;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, ReportResponse};

/// 获取财报视图
///
/// 报价与年度三大报表 (利润表、资产负债表、现金流量表)，报告期从新到旧排列。
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/report/{ticker}",
    tag = "财报 (Report)",
    params(
        ("id" = String, Path, description = "会话 ID"),
        ("ticker" = String, Path, description = "证券代码")
    ),
    responses(
        (status = 200, description = "财报获取成功", body = ApiResponse<ReportResponse>),
        (status = 404, description = "会话不存在或代码非法"),
        (status = 502, description = "行情源不可用")
    )
)]
pub async fn report(
    State(state): State<AppState>,
    Path((id, ticker)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ReportResponse>>, ApiError> {
    let session = state.sessions.get(&id)?;
    let ticker = Ticker::parse(&ticker)?;

    let view = session.report_view(&ticker).await?;
    Ok(Json(ApiResponse::ok(view.into())))
}

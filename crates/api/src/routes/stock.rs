//! # 个股视图路由控制器
//!
//! 报价、历史行情与 AI 分析均经由会话缓存获取，
//! 相同代码与参数的重复请求不会再次访问行情源或补全接口。

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use kabu_core::common::Ticker;

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiResponse, QuoteResponse, StockRequest, StockViewResponse};

/// 加载个股视图
///
/// 更换代码时旧代码的缓存条目被清除；区间内无数据时返回 `no_data: true` 且不生成 AI 分析。
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/stock",
    tag = "个股 (Stock)",
    params(
        ("id" = String, Path, description = "会话 ID")
    ),
    request_body = StockRequest,
    responses(
        (status = 200, description = "视图加载成功", body = ApiResponse<StockViewResponse>),
        (status = 400, description = "日期区间或周期非法"),
        (status = 404, description = "会话不存在或代码非法"),
        (status = 502, description = "行情源不可用")
    )
)]
pub async fn stock_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StockRequest>,
) -> Result<Json<ApiResponse<StockViewResponse>>, ApiError> {
    let session = state.sessions.get(&id)?;
    let ticker = Ticker::parse(&req.ticker)?;
    let params = req.history.into_params(Utc::now().date_naive())?;

    let view = session.stock_view(&ticker, &params).await?;
    Ok(Json(ApiResponse::ok(view.into())))
}

/// 重新获取报价
///
/// 只失效报价条目，历史行情与 AI 分析保持缓存。
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/stock/{ticker}/refresh-quote",
    tag = "个股 (Stock)",
    params(
        ("id" = String, Path, description = "会话 ID"),
        ("ticker" = String, Path, description = "证券代码")
    ),
    responses(
        (status = 200, description = "报价已刷新", body = ApiResponse<QuoteResponse>),
        (status = 404, description = "会话不存在或代码非法"),
        (status = 502, description = "行情源不可用")
    )
)]
pub async fn refresh_quote(
    State(state): State<AppState>,
    Path((id, ticker)): Path<(String, String)>,
) -> Result<Json<ApiResponse<QuoteResponse>>, ApiError> {
    let session = state.sessions.get(&id)?;
    let ticker = Ticker::parse(&ticker)?;

    let quote = session.refresh_quote(&ticker).await?;
    Ok(Json(ApiResponse::ok(QuoteResponse::from(&quote))))
}

//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向前端 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。

use chrono::NaiveDate;
use kabu_core::chat::entity::ChatState;
use kabu_core::common::Interval;
use kabu_core::llm::entity::ChatMessage;
use kabu_core::market::entity::{HistoryParams, PriceRow, Quote, StatementTable};
use kabu_dashboard::session::{ChatView, CompareSide, CompareView, ReportView, StockView};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::ApiError;

/// 浮点数转为十进制字符串，保留 4 位小数并去掉多余的 0
fn decimal(value: f64) -> String {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4).normalize().to_string())
        .unwrap_or_else(|| value.to_string())
}

fn optional_decimal(value: Option<f64>) -> Option<String> {
    value.map(decimal)
}

// ============================================================
//  请求 DTO
// ============================================================

/// 历史行情查询参数，缺省字段取默认值 (最近 30 天、日线、复权、含公司行为)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct HistoryQuery {
    /// 开始日期 (包含)
    #[schema(example = "2024-01-01")]
    pub start: Option<NaiveDate>,
    /// 结束日期 (不包含)
    #[schema(example = "2024-01-31")]
    pub end: Option<NaiveDate>,
    /// 采样周期: 1m, 5m, 15m, 1h, 1d, 5d, 1wk, 1mo, 3mo
    #[schema(example = "1d")]
    pub interval: Option<String>,
    /// 是否包含盘前盘后
    pub include_prepost: Option<bool>,
    /// 是否复权
    pub auto_adjust: Option<bool>,
    /// 是否附带分红与拆股
    pub include_actions: Option<bool>,
}

impl HistoryQuery {
    /// # Summary
    /// 以 `today` 为基准补全缺省字段。
    ///
    /// # Logic
    /// 1. 结束日缺省为今天，开始日缺省为结束日前 30 天。
    /// 2. 周期字符串非法时返回 `BadRequest`。
    pub fn into_params(self, today: NaiveDate) -> Result<HistoryParams, ApiError> {
        let defaults = HistoryParams::ending_on(self.end.unwrap_or(today));
        let interval = match self.interval {
            Some(raw) => raw.parse::<Interval>().map_err(ApiError::BadRequest)?,
            None => defaults.interval,
        };
        Ok(HistoryParams {
            start: self.start.unwrap_or(defaults.start),
            end: defaults.end,
            interval,
            include_prepost: self.include_prepost.unwrap_or(defaults.include_prepost),
            auto_adjust: self.auto_adjust.unwrap_or(defaults.auto_adjust),
            include_actions: self.include_actions.unwrap_or(defaults.include_actions),
        })
    }
}

/// 个股视图请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockRequest {
    /// 证券代码
    #[schema(example = "AAPL")]
    pub ticker: String,
    #[serde(flatten)]
    pub history: HistoryQuery,
}

/// 对比视图请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompareRequest {
    #[schema(example = "AAPL")]
    pub first: String,
    #[schema(example = "MSFT")]
    pub second: String,
    #[serde(flatten)]
    pub history: HistoryQuery,
}

/// 对话消息请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    #[schema(example = "What are the main risks for AAPL?")]
    pub message: String,
}

// ============================================================
//  行情相关 DTO
// ============================================================

/// 报价 DTO，缺失字段为 null (前端渲染为 N/A)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteResponse {
    #[schema(example = "AAPL")]
    pub ticker: String,
    #[schema(example = "Apple Inc.")]
    pub name: String,
    #[schema(example = "190.5")]
    pub price: Option<String>,
    #[schema(example = "2950000000000")]
    pub market_cap: Option<String>,
    pub day_high: Option<String>,
    pub day_low: Option<String>,
    pub previous_close: Option<String>,
    pub trailing_pe: Option<String>,
    pub volume: Option<String>,
}

/// 单行 OHLCV DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceRowResponse {
    /// 时间戳 (ISO 8601)
    #[schema(example = "2024-01-02T00:00:00+00:00")]
    pub time: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub dividend: Option<String>,
    pub split: Option<String>,
}

/// 实际生效的历史行情参数
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryParamsResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[schema(example = "1d")]
    pub interval: String,
    pub include_prepost: bool,
    pub auto_adjust: bool,
    pub include_actions: bool,
}

/// 个股视图 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockViewResponse {
    pub quote: QuoteResponse,
    pub params: HistoryParamsResponse,
    pub rows: Vec<PriceRowResponse>,
    /// 区间内无行情数据
    pub no_data: bool,
    /// AI 分析文本，失败时以 `Error: ` 开头
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompareSideResponse {
    #[schema(example = "AAPL")]
    pub ticker: String,
    /// 为 null 表示代码非法或行情源不可用
    pub quote: Option<QuoteResponse>,
    pub rows: Option<Vec<PriceRowResponse>>,
}

/// 对比视图 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompareResponse {
    pub first: CompareSideResponse,
    pub second: CompareSideResponse,
    /// AI 对比结论，失败时以 `Error: ` 开头
    pub verdict: String,
}

/// 单个报告期的科目表
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatementPeriodResponse {
    #[schema(example = "2023-09-30")]
    pub period: NaiveDate,
    pub items: BTreeMap<String, String>,
}

/// 财报视图 DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportResponse {
    pub quote: QuoteResponse,
    pub income_statement: Vec<StatementPeriodResponse>,
    pub balance_sheet: Vec<StatementPeriodResponse>,
    pub cash_flow: Vec<StatementPeriodResponse>,
}

/// 对话视图 DTO，不含系统提示词与上下文种子
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub seeded: bool,
    pub state: ChatState,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    #[schema(example = "5f1c7a0e-8a43-4d6b-9d53-3b2f0c9e1a77")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// 活跃会话数
    pub sessions: usize,
}

// ============================================================
//  通用响应 DTO
// ============================================================

/// 统一 API 响应包装器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
    /// 错误信息 (失败时)
    pub error: Option<String>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// 构建失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

// ============================================================
//  领域模型 → DTO 惯用转换 (impl From<T>)
// ============================================================

impl From<&Quote> for QuoteResponse {
    fn from(q: &Quote) -> Self {
        Self {
            ticker: q.ticker.to_string(),
            name: q.name.clone(),
            price: optional_decimal(q.price),
            market_cap: optional_decimal(q.market_cap),
            day_high: optional_decimal(q.day_high),
            day_low: optional_decimal(q.day_low),
            previous_close: optional_decimal(q.previous_close),
            trailing_pe: optional_decimal(q.trailing_pe),
            volume: optional_decimal(q.volume),
        }
    }
}

impl From<&PriceRow> for PriceRowResponse {
    fn from(r: &PriceRow) -> Self {
        Self {
            time: r.time.to_rfc3339(),
            open: decimal(r.open),
            high: decimal(r.high),
            low: decimal(r.low),
            close: decimal(r.close),
            volume: decimal(r.volume),
            dividend: optional_decimal(r.dividend),
            split: optional_decimal(r.split),
        }
    }
}

impl From<&HistoryParams> for HistoryParamsResponse {
    fn from(p: &HistoryParams) -> Self {
        Self {
            start: p.start,
            end: p.end,
            interval: p.interval.code().to_string(),
            include_prepost: p.include_prepost,
            auto_adjust: p.auto_adjust,
            include_actions: p.include_actions,
        }
    }
}

impl From<StockView> for StockViewResponse {
    fn from(v: StockView) -> Self {
        Self {
            quote: QuoteResponse::from(&v.quote),
            params: HistoryParamsResponse::from(&v.series.params),
            rows: v.series.rows().iter().map(PriceRowResponse::from).collect(),
            no_data: v.no_data,
            summary: v.summary,
        }
    }
}

impl From<CompareSide> for CompareSideResponse {
    fn from(s: CompareSide) -> Self {
        Self {
            ticker: s.ticker.to_string(),
            quote: s.quote.as_ref().map(QuoteResponse::from),
            rows: s
                .series
                .map(|series| series.rows().iter().map(PriceRowResponse::from).collect()),
        }
    }
}

impl From<CompareView> for CompareResponse {
    fn from(v: CompareView) -> Self {
        Self {
            first: v.first.into(),
            second: v.second.into(),
            verdict: v.verdict,
        }
    }
}

fn statement(table: &StatementTable) -> Vec<StatementPeriodResponse> {
    // 最新的报告期在前
    table
        .iter()
        .rev()
        .map(|(period, items)| StatementPeriodResponse {
            period: *period,
            items: items
                .iter()
                .map(|(name, value)| (name.clone(), decimal(*value)))
                .collect(),
        })
        .collect()
}

impl From<ReportView> for ReportResponse {
    fn from(v: ReportView) -> Self {
        Self {
            quote: QuoteResponse::from(&v.quote),
            income_statement: statement(&v.statements.income_statement),
            balance_sheet: statement(&v.statements.balance_sheet),
            cash_flow: statement(&v.statements.cash_flow),
        }
    }
}

impl From<ChatView> for ChatResponse {
    fn from(v: ChatView) -> Self {
        Self {
            seeded: v.seeded,
            state: v.state,
            messages: v.messages,
        }
    }
}

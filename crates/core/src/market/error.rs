use thiserror::Error;

/// # Summary
/// 行情数据域错误枚举。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - "区间内没有数据" 不属于错误，由空的 `PriceSeries` 表达。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    // 代码非法或行情源没有该代码的任何数据，不自动重试
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),
    // 传输层或 HTTP 层失败，下一次交互时重试
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    // 响应结构与预期不符
    #[error("Parse error: {0}")]
    Parse(String),
}

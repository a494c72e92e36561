use crate::common::Ticker;
use crate::market::entity::{FinancialStatements, HistoryParams, PriceSeries, Quote};
use crate::market::error::MarketError;
use async_trait::async_trait;

/// # Summary
/// 外部行情数据提供者接口。
///
/// # Invariants
/// - 无需鉴权密钥。
/// - 未知代码必须返回 `MarketError::InvalidTicker`，而不是空结果。
/// - 合法代码在区间内无数据时返回空序列。
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// # Summary
    /// 获取最新报价与当日概要。
    ///
    /// # Arguments
    /// * `ticker`: 证券代码。
    ///
    /// # Returns
    /// 成功返回报价快照。
    async fn latest_quote(&self, ticker: &Ticker) -> Result<Quote, MarketError>;

    /// # Summary
    /// 获取指定参数下的历史 OHLCV 序列。
    ///
    /// # Logic
    /// 1. 将日期区间转换为数据源的时间范围 (结束日不包含在内)。
    /// 2. 按 interval、盘前盘后、复权、公司行为参数构建请求。
    /// 3. 解析响应并构造满足排序不变式的序列。
    ///
    /// # Arguments
    /// * `ticker`: 证券代码。
    /// * `params`: 查询参数。
    ///
    /// # Returns
    /// 成功返回序列；区间内无数据或数据源声明该周期数据不可用时返回空序列。
    async fn history(
        &self,
        ticker: &Ticker,
        params: &HistoryParams,
    ) -> Result<PriceSeries, MarketError>;

    /// # Summary
    /// 获取年度利润表、资产负债表与现金流量表。
    ///
    /// # Arguments
    /// * `ticker`: 证券代码。
    ///
    /// # Returns
    /// 成功返回三大报表。
    async fn financial_statements(&self, ticker: &Ticker)
    -> Result<FinancialStatements, MarketError>;
}

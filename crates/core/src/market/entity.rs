use crate::common::{Interval, Ticker};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 默认回看的自然日数
pub const DEFAULT_LOOKBACK_DAYS: u64 = 30;

/// # Summary
/// 最新报价快照。
///
/// # Invariants
/// - 不可变，重新获取时整体替换，不做局部更新。
/// - 数值字段可能缺失 (行情源未返回)，展示时渲染为 `N/A`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    // 证券代码
    pub ticker: Ticker,
    // 公司全称 (缺失时回退为代码)
    pub name: String,
    // 当前价
    pub price: Option<f64>,
    // 总市值
    pub market_cap: Option<f64>,
    // 当日最高
    pub day_high: Option<f64>,
    // 当日最低
    pub day_low: Option<f64>,
    // 昨收
    pub previous_close: Option<f64>,
    // 滚动市盈率
    pub trailing_pe: Option<f64>,
    // 当日成交量
    pub volume: Option<f64>,
}

/// # Summary
/// 历史行情查询参数，决定一条 `PriceSeries` 的全部内容。
///
/// # Invariants
/// - 任意字段变化都意味着不同的数据集，缓存必须按整体相等性判断。
/// - 日期按自然日比较，`start <= end`；区间为 `[start, end)`，结束日本身不包含在内。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryParams {
    // 开始日期 (包含)
    pub start: NaiveDate,
    // 结束日期 (不包含)
    pub end: NaiveDate,
    // 采样周期
    pub interval: Interval,
    // 是否包含盘前盘后
    pub include_prepost: bool,
    // 是否按复权因子调整价格
    pub auto_adjust: bool,
    // 是否附带分红、拆股事件
    pub include_actions: bool,
}

impl HistoryParams {
    /// # Summary
    /// 以指定日期为结束日构造默认参数 (回看 30 天、日线、复权、含公司行为)。
    ///
    /// # Arguments
    /// * `today`: 结束日期。
    ///
    /// # Returns
    /// 默认参数。
    pub fn ending_on(today: NaiveDate) -> Self {
        Self {
            start: today
                .checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
                .unwrap_or(today),
            end: today,
            interval: Interval::Day1,
            include_prepost: false,
            auto_adjust: true,
            include_actions: true,
        }
    }

    /// 校验日期区间
    pub fn is_valid_range(&self) -> bool {
        self.start <= self.end
    }
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self::ending_on(Utc::now().date_naive())
    }
}

/// # Summary
/// 单行 OHLCV 数据。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    // 采样起始时间
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    // 当期分红 (仅在请求公司行为时填充)
    pub dividend: Option<f64>,
    // 当期拆股比例 (仅在请求公司行为时填充)
    pub split: Option<f64>,
}

/// # Summary
/// 某证券在一组 `HistoryParams` 下的历史行情序列。
///
/// # Invariants
/// - `rows` 按时间升序且时间戳唯一，由构造函数保证。
/// - 允许为空：合法代码在区间内没有数据不是错误。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: Ticker,
    pub params: HistoryParams,
    rows: Vec<PriceRow>,
}

impl PriceSeries {
    /// # Summary
    /// 构造序列并建立排序不变式。
    ///
    /// # Logic
    /// 1. 按时间稳定排序。
    /// 2. 相同时间戳只保留最后写入的一行。
    ///
    /// # Arguments
    /// * `ticker`: 证券代码。
    /// * `params`: 产生该序列的查询参数。
    /// * `rows`: 原始行，顺序不限。
    ///
    /// # Returns
    /// 满足不变式的序列。
    pub fn new(ticker: Ticker, params: HistoryParams, mut rows: Vec<PriceRow>) -> Self {
        rows.sort_by_key(|r| r.time);
        let mut deduped: Vec<PriceRow> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(last) if last.time == row.time => *last = row,
                _ => deduped.push(row),
            }
        }
        Self {
            ticker,
            params,
            rows: deduped,
        }
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 最近的 `n` 行 (不足则全部返回)
    pub fn tail(&self, n: usize) -> &[PriceRow] {
        let from = self.rows.len().saturating_sub(n);
        &self.rows[from..]
    }
}

/// 财报表：报告期 → (科目 → 数值)，以报告期为行
pub type StatementTable = BTreeMap<NaiveDate, BTreeMap<String, f64>>;

/// # Summary
/// 年度三大财务报表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub ticker: Ticker,
    // 利润表
    pub income_statement: StatementTable,
    // 资产负债表
    pub balance_sheet: StatementTable,
    // 现金流量表
    pub cash_flow: StatementTable,
}

impl FinancialStatements {
    /// 三张表是否全部为空
    pub fn is_empty(&self) -> bool {
        self.income_statement.is_empty() && self.balance_sheet.is_empty() && self.cash_flow.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(ts: i64, close: f64) -> PriceRow {
        PriceRow {
            time: Utc.timestamp_opt(ts, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
            dividend: None,
            split: None,
        }
    }

    #[test]
    fn test_series_sorted_and_deduped() {
        let ticker = Ticker::parse("AAPL").unwrap();
        let params = HistoryParams::ending_on(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        let series = PriceSeries::new(
            ticker,
            params,
            vec![row(300, 3.0), row(100, 1.0), row(200, 2.0), row(100, 1.5)],
        );

        let closes: Vec<f64> = series.rows().iter().map(|r| r.close).collect();
        assert_eq!(closes, vec![1.5, 2.0, 3.0]);
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(10).len(), 3);
    }

    #[test]
    fn test_default_params() {
        let params = HistoryParams::ending_on(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(params.start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(params.interval, Interval::Day1);
        assert!(!params.include_prepost);
        assert!(params.auto_adjust);
        assert!(params.include_actions);
        assert!(params.is_valid_range());
    }
}

use crate::common::Ticker;
use serde::{Deserialize, Serialize};

/// # Summary
/// 会话内按逻辑数据集划分的缓存类别。
///
/// # Invariants
/// - 每个数据集独立失效：报价与历史行情互不影响。
/// - 个股视图与对比视图的历史行情分属不同数据集，切换视图不会互相覆盖。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    // 最新报价
    Quote,
    // 个股视图的历史行情
    History,
    // 对比视图的历史行情，与个股视图的区间互不覆盖
    CompareHistory,
    // 财务报表
    Financials,
    // 单只股票的 AI 分析 (派生自历史行情)
    AiSummary,
    // 两只股票的 AI 对比 (派生自两者的报价)
    Comparison,
}

impl Dataset {
    pub fn label(self) -> &'static str {
        match self {
            Dataset::Quote => "quote",
            Dataset::History => "history",
            Dataset::CompareHistory => "compare-history",
            Dataset::Financials => "financials",
            Dataset::AiSummary => "ai-summary",
            Dataset::Comparison => "comparison",
        }
    }

    /// # Summary
    /// 派生自本数据集的下游数据集。
    ///
    /// # Logic
    /// 上游重新获取后，下游条目必须被标记为过期。
    /// - History → AiSummary
    /// - Quote → Comparison
    pub fn dependents(self) -> &'static [Dataset] {
        match self {
            Dataset::History => &[Dataset::AiSummary],
            Dataset::Quote => &[Dataset::Comparison],
            _ => &[],
        }
    }

    /// # Summary
    /// 本数据集的条目是否以上游数据集的参数为参数。
    ///
    /// # Logic
    /// AI 分析以产生它的 `HistoryParams` 为参数；上游以相同参数重新获取时，
    /// 该分析仍对应同一区间，不需要标记过期。
    pub fn keyed_by_upstream_params(self) -> bool {
        matches!(self, Dataset::AiSummary)
    }
}

/// # Summary
/// 会话缓存键：数据集 + 所涉及的证券代码。
///
/// # Invariants
/// - `tickers` 至少包含一个代码；对比类键按请求顺序保存两个代码。
/// - 文本形式形如 `AAPL-history`、`AAPL-MSFT-comparison`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub dataset: Dataset,
    pub tickers: Vec<Ticker>,
}

impl CacheKey {
    pub fn new(dataset: Dataset, ticker: &Ticker) -> Self {
        Self {
            dataset,
            tickers: vec![ticker.clone()],
        }
    }

    pub fn quote(ticker: &Ticker) -> Self {
        Self::new(Dataset::Quote, ticker)
    }

    pub fn history(ticker: &Ticker) -> Self {
        Self::new(Dataset::History, ticker)
    }

    pub fn compare_history(ticker: &Ticker) -> Self {
        Self::new(Dataset::CompareHistory, ticker)
    }

    pub fn financials(ticker: &Ticker) -> Self {
        Self::new(Dataset::Financials, ticker)
    }

    pub fn ai_summary(ticker: &Ticker) -> Self {
        Self::new(Dataset::AiSummary, ticker)
    }

    pub fn comparison(a: &Ticker, b: &Ticker) -> Self {
        Self {
            dataset: Dataset::Comparison,
            tickers: vec![a.clone(), b.clone()],
        }
    }

    /// 该键是否涉及指定代码
    pub fn involves(&self, ticker: &Ticker) -> bool {
        self.tickers.contains(ticker)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for ticker in &self.tickers {
            write!(f, "{}-", ticker)?;
        }
        f.write_str(self.dataset.label())
    }
}

/// # Summary
/// 缓存条目：取值 + 产生该值的完整参数 + 有效标记。
///
/// # Invariants
/// - 仅当 `valid` 为真且 `params` 与请求参数逐字段相等时才可直接复用。
/// - 失败的获取结果永远不会成为条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<P, V> {
    pub params: P,
    pub value: V,
    pub valid: bool,
}

impl<P: PartialEq, V> CacheEntry<P, V> {
    pub fn fresh(params: P, value: V) -> Self {
        Self {
            params,
            value,
            valid: true,
        }
    }

    /// 是否可以直接服务于给定参数的请求
    pub fn serves(&self, params: &P) -> bool {
        self.valid && self.params == *params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let aapl = Ticker::parse("aapl").unwrap();
        let msft = Ticker::parse("msft").unwrap();
        assert_eq!(CacheKey::history(&aapl).to_string(), "AAPL-history");
        assert_eq!(CacheKey::quote(&aapl).to_string(), "AAPL-quote");
        assert_eq!(
            CacheKey::comparison(&aapl, &msft).to_string(),
            "AAPL-MSFT-comparison"
        );
        assert_eq!(
            CacheKey::compare_history(&aapl).to_string(),
            "AAPL-compare-history"
        );
        assert_ne!(CacheKey::history(&aapl), CacheKey::quote(&aapl));
        assert_ne!(CacheKey::history(&aapl), CacheKey::compare_history(&aapl));
    }

    #[test]
    fn test_entry_serves_only_when_valid_and_equal() {
        let mut entry = CacheEntry::fresh(1_u32, "v");
        assert!(entry.serves(&1));
        assert!(!entry.serves(&2));
        entry.valid = false;
        assert!(!entry.serves(&1));
    }
}

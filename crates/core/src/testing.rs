//! 测试用的端口模拟实现，仅在启用 `test-utils` 特性时编译。

use crate::common::Ticker;
use crate::llm::entity::ChatMessage;
use crate::llm::error::CompletionError;
use crate::llm::port::CompletionClient;
use crate::market::entity::{
    FinancialStatements, HistoryParams, PriceRow, PriceSeries, Quote, StatementTable,
};
use crate::market::error::MarketError;
use crate::market::port::MarketDataProvider;
use async_trait::async_trait;
use chrono::{Days, NaiveTime};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 行情区间内没有任何数据的合法代码
pub const EMPTY_TICKER: &str = "EMPT";

/// # Summary
/// 内存行情源：`AAPL`、`MSFT`、`EMPT` 为合法代码，其余一律 `InvalidTicker`。
///
/// # Invariants
/// - 每次调用都被计数，用于断言缓存是否命中。
/// - 历史行情按请求区间 `[start, end)` 每个自然日生成一行。
#[derive(Default)]
pub struct MockMarket {
    quote_calls: AtomicUsize,
    history_calls: AtomicUsize,
    financial_calls: AtomicUsize,
    history_requests: Mutex<Vec<(Ticker, HistoryParams)>>,
    unavailable: AtomicBool,
}

impl MockMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn financial_calls(&self) -> usize {
        self.financial_calls.load(Ordering::SeqCst)
    }

    /// 历史行情请求记录 (按调用顺序)
    pub fn history_requests(&self) -> Vec<(Ticker, HistoryParams)> {
        self.history_requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// 模拟上游不可用
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self, ticker: &Ticker) -> Result<f64, MarketError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MarketError::UpstreamUnavailable("mock outage".to_string()));
        }
        match ticker.as_str() {
            "AAPL" => Ok(190.0),
            "MSFT" => Ok(410.0),
            EMPTY_TICKER => Ok(10.0),
            other => Err(MarketError::InvalidTicker(other.to_string())),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockMarket {
    async fn latest_quote(&self, ticker: &Ticker) -> Result<Quote, MarketError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let price = self.check(ticker)?;
        Ok(Quote {
            ticker: ticker.clone(),
            name: format!("{} Inc.", ticker),
            price: Some(price),
            market_cap: Some(price * 1.0e10),
            day_high: Some(price + 2.0),
            day_low: Some(price - 2.0),
            previous_close: Some(price - 1.0),
            trailing_pe: Some(30.0),
            volume: Some(1.0e7),
        })
    }

    async fn history(
        &self,
        ticker: &Ticker,
        params: &HistoryParams,
    ) -> Result<PriceSeries, MarketError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.history_requests.lock() {
            log.push((ticker.clone(), params.clone()));
        }
        let base = self.check(ticker)?;
        if ticker.as_str() == EMPTY_TICKER {
            return Ok(PriceSeries::new(ticker.clone(), params.clone(), Vec::new()));
        }

        let mut rows = Vec::new();
        let mut day = params.start;
        let mut close = base;
        while day < params.end {
            rows.push(PriceRow {
                time: day.and_time(NaiveTime::MIN).and_utc(),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1.0e6,
                dividend: None,
                split: None,
            });
            close += 1.0;
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => break,
            }
        }
        Ok(PriceSeries::new(ticker.clone(), params.clone(), rows))
    }

    async fn financial_statements(
        &self,
        ticker: &Ticker,
    ) -> Result<FinancialStatements, MarketError> {
        self.financial_calls.fetch_add(1, Ordering::SeqCst);
        self.check(ticker)?;

        let mut income = StatementTable::new();
        if let Some(period) = chrono::NaiveDate::from_ymd_opt(2023, 12, 31) {
            income.insert(
                period,
                BTreeMap::from([
                    ("totalRevenue".to_string(), 1.0e11),
                    ("netIncome".to_string(), 2.5e10),
                ]),
            );
        }
        Ok(FinancialStatements {
            ticker: ticker.clone(),
            income_statement: income,
            balance_sheet: StatementTable::new(),
            cash_flow: StatementTable::new(),
        })
    }
}

/// # Summary
/// 记录每次请求的补全客户端，回复为 `analysis #n`。
#[derive(Default)]
pub struct MockCompletion {
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    failing: AtomicBool,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn last_call(&self) -> Vec<ChatMessage> {
        self.calls
            .lock()
            .ok()
            .and_then(|c| c.last().cloned())
            .unwrap_or_default()
    }

    /// 之后的调用返回 HTTP 503
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let n = match self.calls.lock() {
            Ok(mut calls) => {
                calls.push(messages.to_vec());
                calls.len()
            }
            Err(_) => 0,
        };
        if self.failing.load(Ordering::SeqCst) {
            return Err(CompletionError::Status {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(format!("analysis #{}", n))
    }
}

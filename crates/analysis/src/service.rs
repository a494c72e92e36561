use crate::prompt;
use kabu_core::common::Ticker;
use kabu_core::llm::entity::{ANALYST_SYSTEM_PROMPT, ChatMessage};
use kabu_core::llm::error::CompletionError;
use kabu_core::llm::port::{CompletionClient, error_text};
use kabu_core::market::entity::{PriceSeries, Quote};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// # Summary
/// 分析服务的统一错误类型。
///
/// # Invariants
/// - `Display` 文本加上 `Error: ` 前缀即为展示给用户的内容。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// 对比时任一侧报价缺失 (代码非法或行情源失败)
    #[error("One or both stock tickers are invalid.")]
    MissingQuote,
    /// 行情序列为空，没有可分析的数据
    #[error("No historical data available for {0}.")]
    EmptySeries(String),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// # Summary
/// AI 分析服务：把行情数据组织为提示词并调用补全接口。
///
/// # Invariants
/// - 所有请求使用同一个系统提示词，模型由注入的客户端决定。
/// - 输入不足时直接失败，不发起补全调用。
#[derive(Clone)]
pub struct AnalysisService {
    // 补全接口
    client: Arc<dyn CompletionClient>,
}

impl AnalysisService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Arc<dyn CompletionClient> {
        self.client.clone()
    }

    async fn ask(&self, prompt: String) -> Result<String, AnalysisError> {
        let messages = [
            ChatMessage::system(ANALYST_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        Ok(self.client.complete(&messages).await?)
    }

    /// # Summary
    /// 生成单只股票的趋势分析。
    ///
    /// # Logic
    /// 1. 空序列直接返回 `EmptySeries`。
    /// 2. 序列渲染为 CSV 行后请求趋势、风险与投资建议分析。
    ///
    /// # Arguments
    /// * `ticker`: 证券代码。
    /// * `series`: 当前选择参数下的行情序列。
    ///
    /// # Returns
    /// 助手回复文本或分析错误。
    pub async fn try_summarize(
        &self,
        ticker: &Ticker,
        series: &PriceSeries,
    ) -> Result<String, AnalysisError> {
        if series.is_empty() {
            return Err(AnalysisError::EmptySeries(ticker.to_string()));
        }
        debug!("Summarizing {} rows for {}", series.len(), ticker);
        self.ask(prompt::summary_prompt(ticker, series))
            .await
            .inspect_err(|e| warn!("Summary for {} failed: {}", ticker, e))
    }

    /// 同 `try_summarize`，失败时返回 `Error: ...` 文本
    pub async fn summarize(&self, ticker: &Ticker, series: &PriceSeries) -> String {
        self.try_summarize(ticker, series)
            .await
            .unwrap_or_else(|e| error_text(&e))
    }

    /// # Summary
    /// 对比两只股票。
    ///
    /// # Logic
    /// 1. 任一报价缺失时返回 `MissingQuote`，不发起补全调用。
    /// 2. 以两侧报价的关键指标构建对比提示词。
    ///
    /// # Arguments
    /// * `a`, `quote_a`: 第一只股票及其报价。
    /// * `b`, `quote_b`: 第二只股票及其报价。
    ///
    /// # Returns
    /// 助手回复文本或分析错误。
    pub async fn try_compare(
        &self,
        a: &Ticker,
        quote_a: Option<&Quote>,
        b: &Ticker,
        quote_b: Option<&Quote>,
    ) -> Result<String, AnalysisError> {
        let (Some(quote_a), Some(quote_b)) = (quote_a, quote_b) else {
            debug!("Comparison {} vs {} skipped: missing quote", a, b);
            return Err(AnalysisError::MissingQuote);
        };
        self.ask(prompt::comparison_prompt(a, quote_a, b, quote_b))
            .await
            .inspect_err(|e| warn!("Comparison {} vs {} failed: {}", a, b, e))
    }

    /// 同 `try_compare`，失败时返回 `Error: ...` 文本
    pub async fn compare(
        &self,
        a: &Ticker,
        quote_a: Option<&Quote>,
        b: &Ticker,
        quote_b: Option<&Quote>,
    ) -> String {
        self.try_compare(a, quote_a, b, quote_b)
            .await
            .unwrap_or_else(|e| error_text(&e))
    }
}

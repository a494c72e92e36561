use crate::error::DashboardError;
use chrono::{TimeDelta, Utc};
use kabu_analysis::chat::ChatAssistant;
use kabu_analysis::prompt::chat_seed;
use kabu_analysis::service::AnalysisService;
use kabu_cache::session::SessionCache;
use kabu_core::cache::entity::{CacheEntry, CacheKey};
use kabu_core::chat::entity::{ChatState, Conversation};
use kabu_core::common::Ticker;
use kabu_core::llm::entity::{ANALYST_SYSTEM_PROMPT, ChatMessage};
use kabu_core::llm::port::error_text;
use kabu_core::market::entity::{FinancialStatements, HistoryParams, PriceSeries, Quote};
use kabu_core::market::port::MarketDataProvider;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// # Summary
/// 个股视图的渲染结果。
#[derive(Debug, Clone)]
pub struct StockView {
    pub quote: Quote,
    pub series: PriceSeries,
    // 区间内没有行情数据
    pub no_data: bool,
    // AI 分析或 `Error: ...` 文本；无数据时为空
    pub summary: Option<String>,
}

/// # Summary
/// 对比视图中的一侧。`quote` 缺失表示代码非法或行情源不可用。
#[derive(Debug, Clone)]
pub struct CompareSide {
    pub ticker: Ticker,
    pub quote: Option<Quote>,
    pub series: Option<PriceSeries>,
}

#[derive(Debug, Clone)]
pub struct CompareView {
    pub first: CompareSide,
    pub second: CompareSide,
    // AI 对比结论或 `Error: ...` 文本
    pub verdict: String,
}

#[derive(Debug, Clone)]
pub struct ReportView {
    pub quote: Quote,
    pub statements: FinancialStatements,
}

/// # Summary
/// 对话视图：只包含用户可见的轮次。
#[derive(Debug, Clone)]
pub struct ChatView {
    pub seeded: bool,
    pub state: ChatState,
    pub messages: Vec<ChatMessage>,
}

impl ChatView {
    fn of(conversation: &Conversation) -> Self {
        Self {
            seeded: conversation.is_seeded(),
            state: conversation.state(),
            messages: conversation.transcript().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StockSelection {
    ticker: Ticker,
    params: HistoryParams,
}

/// 各视图当前选中的代码与对话记录
#[derive(Default)]
struct SessionState {
    stock: Option<StockSelection>,
    compare: Option<(Ticker, Ticker)>,
    report: Option<Ticker>,
    conversation: Option<Conversation>,
}

impl SessionState {
    /// 代码是否仍被任一视图使用
    fn in_use(&self, ticker: &Ticker) -> bool {
        self.stock.as_ref().is_some_and(|s| &s.ticker == ticker)
            || self
                .compare
                .as_ref()
                .is_some_and(|(a, b)| a == ticker || b == ticker)
            || self.report.as_ref() == Some(ticker)
    }
}

/// # Summary
/// 单个用户会话：持有独立的数据缓存、视图选择与对话记录。
///
/// # Invariants
/// - 同一会话内的交互经 `state` 互斥锁串行执行，同一时刻最多一个上游调用在途。
/// - 缓存只属于本会话，会话结束后整体丢弃。
/// - 某个代码不再被任何视图使用时，它的全部缓存条目被清除。
pub struct DashboardSession {
    id: String,
    cache: SessionCache,
    market: Arc<dyn MarketDataProvider>,
    analysis: AnalysisService,
    assistant: ChatAssistant,
    state: Mutex<SessionState>,
    // 最近一次交互的 Unix 毫秒
    last_active: AtomicI64,
}

impl DashboardSession {
    pub fn new(
        id: String,
        market: Arc<dyn MarketDataProvider>,
        analysis: AnalysisService,
    ) -> Self {
        Self {
            id,
            cache: SessionCache::in_memory(),
            market,
            assistant: ChatAssistant::new(analysis.client()),
            analysis,
            state: Mutex::new(SessionState::default()),
            last_active: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    fn touch(&self) {
        self.last_active
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// 距最近一次交互的时长
    pub fn idle_for(&self) -> TimeDelta {
        let last = self.last_active.load(Ordering::Relaxed);
        TimeDelta::milliseconds(Utc::now().timestamp_millis().saturating_sub(last))
    }

    // ============================================================
    //  缓存读取
    // ============================================================

    async fn quote(&self, ticker: &Ticker) -> Result<Quote, DashboardError> {
        self.cache
            .get_or_fetch(&CacheKey::quote(ticker), &(), |_| async move {
                self.market
                    .latest_quote(ticker)
                    .await
                    .map_err(DashboardError::from)
            })
            .await
    }

    /// 经 `key` 读取历史行情；个股视图与对比视图各用一个键
    async fn history(
        &self,
        key: &CacheKey,
        ticker: &Ticker,
        params: &HistoryParams,
    ) -> Result<PriceSeries, DashboardError> {
        self.cache
            .get_or_fetch(key, params, |p| async move {
                self.market
                    .history(ticker, &p)
                    .await
                    .map_err(DashboardError::from)
            })
            .await
    }

    async fn financials(&self, ticker: &Ticker) -> Result<FinancialStatements, DashboardError> {
        self.cache
            .get_or_fetch(&CacheKey::financials(ticker), &(), |_| async move {
                self.market
                    .financial_statements(ticker)
                    .await
                    .map_err(DashboardError::from)
            })
            .await
    }

    /// # Summary
    /// 读取或生成 AI 分析。
    ///
    /// # Logic
    /// 以产生序列的 `HistoryParams` 为参数缓存；分析失败渲染为 `Error: ...` 文本且不写入缓存。
    async fn summary(&self, series: &PriceSeries) -> Result<String, DashboardError> {
        let result = self
            .cache
            .get_or_fetch(
                &CacheKey::ai_summary(&series.ticker),
                &series.params,
                |_| async move {
                    self.analysis
                        .try_summarize(&series.ticker, series)
                        .await
                        .map_err(DashboardError::from)
                },
            )
            .await;
        match result {
            Err(DashboardError::Analysis(e)) => Ok(error_text(&e)),
            other => other,
        }
    }

    /// 行情源错误视为该侧缺失，其余错误照常返回
    fn optional<T>(
        ticker: &Ticker,
        fetched: Result<T, DashboardError>,
    ) -> Result<Option<T>, DashboardError> {
        match fetched {
            Ok(v) => Ok(Some(v)),
            Err(DashboardError::Market(e)) => {
                warn!("Comparison side {} unavailable: {}", ticker, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn compare_side(
        &self,
        ticker: &Ticker,
        params: &HistoryParams,
    ) -> Result<CompareSide, DashboardError> {
        let quote = Self::optional(ticker, self.quote(ticker).await)?;
        let series = match quote {
            Some(_) => {
                let key = CacheKey::compare_history(ticker);
                Self::optional(ticker, self.history(&key, ticker, params).await)?
            }
            None => None,
        };
        Ok(CompareSide {
            ticker: ticker.clone(),
            quote,
            series,
        })
    }

    async fn release(&self, state: &SessionState, old: Option<Ticker>) -> Result<(), DashboardError> {
        if let Some(old) = old {
            if !state.in_use(&old) {
                let removed = self.cache.invalidate_ticker(&old).await?;
                debug!("Session {} released {} ({} entries)", self.id, old, removed);
            }
        }
        Ok(())
    }

    // ============================================================
    //  视图
    // ============================================================

    /// # Summary
    /// 个股视图：报价、历史行情与 AI 分析。
    ///
    /// # Logic
    /// 1. 校验日期区间。
    /// 2. 更换代码时清除旧代码的缓存 (仍被其他视图使用的除外)。
    /// 3. 报价与历史行情分别经缓存获取。
    /// 4. 序列非空时经缓存获取 AI 分析；为空时标记 `no_data`，不请求分析。
    ///
    /// # Arguments
    /// * `ticker`: 证券代码。
    /// * `params`: 历史行情参数。
    ///
    /// # Returns
    /// 渲染所需的全部数据；代码非法或行情源失败时返回错误。
    pub async fn stock_view(
        &self,
        ticker: &Ticker,
        params: &HistoryParams,
    ) -> Result<StockView, DashboardError> {
        if !params.is_valid_range() {
            return Err(DashboardError::BadRequest(format!(
                "start date {} is after end date {}",
                params.start, params.end
            )));
        }

        let mut state = self.state.lock().await;
        self.touch();

        let old = state
            .stock
            .replace(StockSelection {
                ticker: ticker.clone(),
                params: params.clone(),
            })
            .map(|s| s.ticker)
            .filter(|t| t != ticker);
        self.release(&state, old).await?;

        let quote = self.quote(ticker).await?;
        let series = self
            .history(&CacheKey::history(ticker), ticker, params)
            .await?;

        if series.is_empty() {
            debug!("No rows for {} in {} ~ {}", ticker, params.start, params.end);
            return Ok(StockView {
                quote,
                series,
                no_data: true,
                summary: None,
            });
        }

        let summary = self.summary(&series).await?;
        Ok(StockView {
            quote,
            series,
            no_data: false,
            summary: Some(summary),
        })
    }

    /// # Summary
    /// 仅重新获取报价，历史行情与 AI 分析保持不变。
    pub async fn refresh_quote(&self, ticker: &Ticker) -> Result<Quote, DashboardError> {
        let _state = self.state.lock().await;
        self.touch();
        self.cache.invalidate(&CacheKey::quote(ticker)).await?;
        self.quote(ticker).await
    }

    /// # Summary
    /// 对比视图。
    ///
    /// # Logic
    /// 1. 更换任一代码时清除旧组合的对比结论及不再使用的代码的缓存。
    /// 2. 两侧报价与历史行情经缓存获取；行情源失败的一侧记为缺失。
    /// 3. 两侧报价齐全时经缓存获取对比结论，否则直接返回错误文本，不调用补全接口。
    pub async fn compare_view(
        &self,
        first: &Ticker,
        second: &Ticker,
        params: &HistoryParams,
    ) -> Result<CompareView, DashboardError> {
        if !params.is_valid_range() {
            return Err(DashboardError::BadRequest(format!(
                "start date {} is after end date {}",
                params.start, params.end
            )));
        }

        let mut state = self.state.lock().await;
        self.touch();

        let pair = (first.clone(), second.clone());
        if let Some((old_a, old_b)) = state.compare.replace(pair.clone()) {
            if (old_a.clone(), old_b.clone()) != pair {
                self.cache
                    .invalidate(&CacheKey::comparison(&old_a, &old_b))
                    .await?;
                self.release(&state, Some(old_a)).await?;
                self.release(&state, Some(old_b)).await?;
            }
        }

        let first_side = self.compare_side(first, params).await?;
        let second_side = self.compare_side(second, params).await?;

        let verdict = match (&first_side.quote, &second_side.quote) {
            (Some(qa), Some(qb)) => {
                let result = self
                    .cache
                    .get_or_fetch(&CacheKey::comparison(first, second), &(), |_| async move {
                        self.analysis
                            .try_compare(first, Some(qa), second, Some(qb))
                            .await
                            .map_err(DashboardError::from)
                    })
                    .await;
                match result {
                    Err(DashboardError::Analysis(e)) => error_text(&e),
                    other => other?,
                }
            }
            (qa, qb) => {
                self.analysis
                    .compare(first, qa.as_ref(), second, qb.as_ref())
                    .await
            }
        };

        Ok(CompareView {
            first: first_side,
            second: second_side,
            verdict,
        })
    }

    /// # Summary
    /// 财报视图：报价与三大报表。
    pub async fn report_view(&self, ticker: &Ticker) -> Result<ReportView, DashboardError> {
        let mut state = self.state.lock().await;
        self.touch();

        let old = state.report.replace(ticker.clone()).filter(|t| t != ticker);
        self.release(&state, old).await?;

        let quote = self.quote(ticker).await?;
        let statements = self.financials(ticker).await?;
        Ok(ReportView { quote, statements })
    }

    /// # Summary
    /// 取得当前对话，不存在时创建。
    ///
    /// # Logic
    /// 1. 个股视图已有 AI 分析时，以代码、分析与最近行情作为种子。
    /// 2. 上一轮被中断时补写错误回复。
    async fn conversation<'a>(
        &self,
        state: &'a mut SessionState,
    ) -> Result<&'a mut Conversation, DashboardError> {
        let conversation = match state.conversation.take() {
            Some(existing) => existing,
            None => {
                let seed = match &state.stock {
                    Some(selection) => self.seed(selection).await?,
                    None => None,
                };
                info!("Session {} started a conversation (seeded={})", self.id, seed.is_some());
                Conversation::new(ANALYST_SYSTEM_PROMPT, seed)
            }
        };
        let conversation = state.conversation.insert(conversation);
        ChatAssistant::recover(conversation)?;
        Ok(conversation)
    }

    /// # Summary
    /// 由个股视图当前选择构建对话种子。
    ///
    /// # Logic
    /// 分析与历史行情必须都由当前选择的 `HistoryParams` 产生，否则不加种子。
    async fn seed(&self, selection: &StockSelection) -> Result<Option<String>, DashboardError> {
        let ticker = &selection.ticker;
        let summary: Option<CacheEntry<HistoryParams, String>> =
            self.cache.peek(&CacheKey::ai_summary(ticker)).await?;
        let series: Option<CacheEntry<HistoryParams, PriceSeries>> =
            self.cache.peek(&CacheKey::history(ticker)).await?;
        Ok(match (summary, series) {
            (Some(summary), Some(series))
                if summary.params == selection.params && series.params == selection.params =>
            {
                Some(chat_seed(ticker, &summary.value, &series.value))
            }
            _ => None,
        })
    }

    pub async fn chat_history(&self) -> Result<ChatView, DashboardError> {
        let mut state = self.state.lock().await;
        self.touch();
        let conversation = self.conversation(&mut state).await?;
        Ok(ChatView::of(conversation))
    }

    /// # Summary
    /// 提交一条消息并等待回复。
    ///
    /// # Returns
    /// 本轮之后的对话视图；空白输入返回错误且不调用补全接口。
    pub async fn chat_submit(&self, text: &str) -> Result<ChatView, DashboardError> {
        let mut state = self.state.lock().await;
        self.touch();
        let conversation = self.conversation(&mut state).await?;
        self.assistant.submit(conversation, text).await?;
        Ok(ChatView::of(conversation))
    }

    /// 丢弃对话记录，下次访问时重新创建
    pub async fn chat_reset(&self) {
        let mut state = self.state.lock().await;
        self.touch();
        state.conversation = None;
    }

    /// 清空本会话的全部缓存
    pub async fn clear(&self) -> Result<(), DashboardError> {
        let _state = self.state.lock().await;
        self.touch();
        self.cache.clear().await?;
        info!("Session {} cache cleared", self.id);
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use kabu_core::common::{Interval, Ticker};
use kabu_core::config::MarketConfig;
use kabu_core::market::entity::{
    FinancialStatements, HistoryParams, PriceRow, PriceSeries, Quote, StatementTable,
};
use kabu_core::market::error::MarketError;
use kabu_core::market::port::MarketDataProvider;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// # Summary
/// Yahoo Finance 行情提供者实现。
///
/// # Invariants
/// - 使用 `reqwest` 异步客户端进行通讯，客户端自带 Cookie 存储。
/// - `base_url` 不带结尾斜杠，测试时可指向本地模拟服务。
/// - quoteSummary 请求总是携带与 Cookie 配套的 crumb；crumb 首次使用时获取，被拒绝后重新获取一次。
#[derive(Clone)]
pub struct YahooProvider {
    /// 内部使用的 HTTP 客户端
    client: Client,
    /// 接口根地址，如 `https://query1.finance.yahoo.com`
    base_url: String,
    /// 下发会话 Cookie 的地址
    cookie_url: String,
    /// 当前 crumb，所有克隆共享
    crumb: Arc<Mutex<Option<String>>>,
}

impl YahooProvider {
    /// # Summary
    /// 创建一个新的 YahooProvider 实例。
    ///
    /// # Logic
    /// 1. 按配置设置超时。
    /// 2. 设置伪装浏览器 Header (User-Agent) 以减少被拦截风险。
    /// 3. 启用 Cookie 存储并初始化 reqwest 客户端。
    ///
    /// # Arguments
    /// * `config`: 行情源配置。
    ///
    /// # Returns
    /// 初始化后的 YahooProvider；客户端构建失败时返回 `UpstreamUnavailable`。
    pub fn new(config: &MarketConfig) -> Result<Self, MarketError> {
        kabu_core::tls::install_crypto_provider();

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| MarketError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_url: config.cookie_url.clone(),
            crumb: Arc::new(Mutex::new(None)),
        })
    }

    /// # Summary
    /// 发起 GET 请求，返回状态码与响应体文本。
    ///
    /// # Logic
    /// 传输失败映射为 `UpstreamUnavailable`；状态码由调用方解释。
    async fn send(
        &self,
        ticker: &Ticker,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(StatusCode, String), MarketError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Yahoo request {} {:?}", url, query);

        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!("Yahoo request for {} failed: {}", ticker, e);
                MarketError::UpstreamUnavailable(e.to_string())
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MarketError::UpstreamUnavailable(e.to_string()))?;
        Ok((status, body))
    }

    /// # Summary
    /// 返回可用的 crumb，必要时完成 Cookie + crumb 握手。
    ///
    /// # Logic
    /// 1. 已有 crumb 且不是刚被拒绝的那个时直接返回。
    /// 2. 访问 `cookie_url` 取得会话 Cookie (该地址通常返回 404，只关心 Set-Cookie)。
    /// 3. 携带 Cookie 请求 `/v1/test/getcrumb`，响应体即 crumb。
    ///
    /// # Arguments
    /// * `rejected`: 刚被上游拒绝的 crumb。
    async fn crumb(&self, rejected: Option<&str>) -> Result<String, MarketError> {
        let mut slot = self.crumb.lock().await;
        if let Some(current) = slot.as_deref() {
            if rejected != Some(current) {
                return Ok(current.to_string());
            }
        }

        match self.client.get(&self.cookie_url).send().await {
            Ok(resp) => debug!("Yahoo cookie endpoint answered HTTP {}", resp.status()),
            Err(e) => warn!("Yahoo cookie request failed: {}", e),
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            warn!("Yahoo crumb request failed: {}", e);
            MarketError::UpstreamUnavailable(e.to_string())
        })?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MarketError::UpstreamUnavailable(e.to_string()))?;

        let crumb = body.trim();
        if !status.is_success() || crumb.is_empty() || crumb.contains(['<', '{', ' ']) {
            warn!("Yahoo crumb unavailable (HTTP {})", status);
            return Err(MarketError::UpstreamUnavailable(format!(
                "crumb unavailable (HTTP {})",
                status
            )));
        }

        info!("Yahoo crumb acquired");
        *slot = Some(crumb.to_string());
        Ok(crumb.to_string())
    }

    /// # Summary
    /// 拉取 quoteSummary 指定模块并返回第一条结果。
    ///
    /// # Logic
    /// 1. 携带 crumb 请求；HTTP 401 时刷新 crumb 重试一次。
    /// 2. HTTP 404 或 "Not Found" 错误体映射为 `InvalidTicker`，其他非 2xx 映射为 `UpstreamUnavailable`。
    /// 3. 结果为空映射为 `InvalidTicker`。
    async fn quote_summary(
        &self,
        ticker: &Ticker,
        modules: &str,
    ) -> Result<QuoteSummaryResult, MarketError> {
        let path = format!("/v10/finance/quoteSummary/{}", ticker);
        let query = |crumb: &str| {
            [
                ("modules", modules.to_string()),
                ("crumb", crumb.to_string()),
            ]
        };

        let crumb = self.crumb(None).await?;
        let (mut status, mut body) = self.send(ticker, &path, &query(&crumb)).await?;
        if status == StatusCode::UNAUTHORIZED {
            debug!("Yahoo rejected the crumb for {}, refreshing", ticker);
            let crumb = self.crumb(Some(crumb.as_str())).await?;
            (status, body) = self.send(ticker, &path, &query(&crumb)).await?;
        }

        if status == StatusCode::NOT_FOUND {
            return Err(MarketError::InvalidTicker(ticker.to_string()));
        }
        if !status.is_success() {
            warn!("Yahoo returned HTTP {} for {}", status, ticker);
            return Err(decode::<QuoteSummaryResponse>(&body)
                .ok()
                .and_then(|r| r.quote_summary.error)
                .map(|err| classify_error(ticker, err))
                .unwrap_or_else(|| MarketError::UpstreamUnavailable(format!("HTTP {}", status))));
        }

        let resp: QuoteSummaryResponse = decode(&body)?;
        if let Some(err) = resp.quote_summary.error {
            return Err(classify_error(ticker, err));
        }
        resp.quote_summary
            .result
            .and_then(|mut list| list.pop())
            .ok_or_else(|| MarketError::InvalidTicker(ticker.to_string()))
    }
}

/// 响应体结构不符映射为 `Parse`
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, MarketError> {
    serde_json::from_str(body).map_err(|e| MarketError::Parse(e.to_string()))
}

/// # Summary
/// Yahoo 返回的 `{code, description}` 错误体。
#[derive(Deserialize, Debug)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

/// # Summary
/// chart 错误是否表示该代码在所请求的周期/区间下没有数据。
///
/// # Logic
/// 例如 `1m data not available for startTime=...` 或 `Data doesn't exist for startDate = ...`。
fn is_data_unavailable(err: &YahooError) -> bool {
    let description = err
        .description
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    err.code.as_deref() != Some("Not Found")
        && (description.contains("not available")
            || description.contains("doesn't exist")
            || description.contains("does not exist"))
}

/// "Not Found" 类错误视为代码非法，其余视为上游不可用
fn classify_error(ticker: &Ticker, err: YahooError) -> MarketError {
    let description = err.description.unwrap_or_default();
    match err.code.as_deref() {
        Some("Not Found") => MarketError::InvalidTicker(ticker.to_string()),
        code => MarketError::UpstreamUnavailable(format!(
            "{}: {}",
            code.unwrap_or("unknown"),
            description
        )),
    }
}

// ============================================================
//  quoteSummary 响应结构
// ============================================================

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryBody,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetailModule>,
    income_statement_history: Option<Value>,
    balance_sheet_history: Option<Value>,
    cashflow_statement_history: Option<Value>,
}

/// `{ "raw": 1.0, "fmt": "1.00" }` 形式的数值，空对象表示缺失
#[derive(Deserialize, Debug, Default)]
struct RawNumber {
    raw: Option<f64>,
}

fn raw(value: &Option<RawNumber>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    regular_market_price: Option<RawNumber>,
    market_cap: Option<RawNumber>,
    regular_market_day_high: Option<RawNumber>,
    regular_market_day_low: Option<RawNumber>,
    regular_market_previous_close: Option<RawNumber>,
    regular_market_volume: Option<RawNumber>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    trailing_pe: Option<RawNumber>,
    previous_close: Option<RawNumber>,
}

// ============================================================
//  v8 chart 响应结构
// ============================================================

/// # Summary
/// Yahoo API 响应顶层结构。
///
/// # Invariants
/// - 映射自 Yahoo v8 chart 接口。
#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

/// # Summary
/// 单个时间序列结果；区间内无数据时 `timestamp` 缺失。
#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
    events: Option<ChartEvents>,
}

#[derive(Deserialize, Debug)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    // 调整后的价格数据
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Deserialize, Debug)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// # Summary
/// 原始 OHLCV 列，每列与 `timestamp` 等长，缺失值为 null。
#[derive(Deserialize, Debug, Default)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Deserialize, Debug, Default)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Deserialize, Debug)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Deserialize, Debug)]
struct SplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

/// 自然日零点对应的 Unix 秒
fn day_start(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// # Summary
/// 将 chart 结果展开为行。
///
/// # Logic
/// 1. OHLC 任一缺失的行被跳过 (停牌或盘前空档)，成交量缺失按 0 处理。
/// 2. `auto_adjust` 时按 `adjclose / close` 缩放 OHLC。
/// 3. `include_actions` 时按时间戳挂接分红与拆股。
fn rows_from_chart(result: ChartResult, params: &HistoryParams) -> Vec<PriceRow> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_close = result
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|v| v.adjclose)
        .unwrap_or_default();

    let events = result.events.unwrap_or_default();
    let dividends: HashMap<i64, f64> = events
        .dividends
        .into_values()
        .map(|d| (d.date, d.amount))
        .collect();
    let splits: HashMap<i64, f64> = events
        .splits
        .into_values()
        .filter(|s| s.denominator != 0.0)
        .map(|s| (s.date, s.numerator / s.denominator))
        .collect();

    let mut rows = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) else {
            continue;
        };
        let Some(time) = Utc.timestamp_opt(ts, 0).single() else {
            continue;
        };

        let factor = match at(&adj_close, i) {
            Some(adj) if params.auto_adjust && close != 0.0 => adj / close,
            _ => 1.0,
        };

        rows.push(PriceRow {
            time,
            open: open * factor,
            high: high * factor,
            low: low * factor,
            close: close * factor,
            volume: at(&quote.volume, i).unwrap_or(0.0),
            dividend: params
                .include_actions
                .then(|| dividends.get(&ts).copied())
                .flatten(),
            split: params
                .include_actions
                .then(|| splits.get(&ts).copied())
                .flatten(),
        });
    }
    rows
}

/// # Summary
/// 将 quoteSummary 的报表数组转换为以报告期为行的表。
///
/// # Logic
/// 1. 每个元素取 `endDate.raw` 作为报告期。
/// 2. 其余带 `raw` 数值的字段作为科目；`maxAge` 等元字段被忽略。
fn statement_table(module: Option<&Value>, list_field: &str) -> StatementTable {
    let mut table = StatementTable::new();
    let Some(items) = module
        .and_then(|m| m.get(list_field))
        .and_then(Value::as_array)
    else {
        return table;
    };

    for item in items {
        let Some(fields) = item.as_object() else {
            continue;
        };
        let period = fields
            .get("endDate")
            .and_then(|d| d.get("raw"))
            .and_then(Value::as_i64)
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive());
        let Some(period) = period else {
            continue;
        };

        let line_items: BTreeMap<String, f64> = fields
            .iter()
            .filter(|(name, _)| name.as_str() != "endDate" && name.as_str() != "maxAge")
            .filter_map(|(name, v)| v.get("raw").and_then(Value::as_f64).map(|n| (name.clone(), n)))
            .collect();
        table.insert(period, line_items);
    }
    table
}

/// 数据不可用的 chart 错误转为空序列，其余按错误码分类
fn chart_error(
    ticker: &Ticker,
    params: &HistoryParams,
    err: YahooError,
) -> Result<PriceSeries, MarketError> {
    if is_data_unavailable(&err) {
        debug!(
            "No {} data for {}: {}",
            params.interval,
            ticker,
            err.description.as_deref().unwrap_or_default()
        );
        return Ok(PriceSeries::new(ticker.clone(), params.clone(), Vec::new()));
    }
    Err(classify_error(ticker, err))
}

/// Yahoo 使用 `60m` 表示小时线
fn interval_param(interval: Interval) -> &'static str {
    match interval {
        Interval::Hour1 => "60m",
        other => other.code(),
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    /// # Summary
    /// 通过 quoteSummary 的 price 与 summaryDetail 模块获取报价。
    ///
    /// # Logic
    /// 1. 请求两个模块。
    /// 2. price 模块缺失视为代码非法。
    /// 3. 名称缺失时回退为短名称，再回退为代码本身。
    async fn latest_quote(&self, ticker: &Ticker) -> Result<Quote, MarketError> {
        let result = self.quote_summary(ticker, "price,summaryDetail").await?;
        let price = result
            .price
            .ok_or_else(|| MarketError::InvalidTicker(ticker.to_string()))?;
        let detail = result.summary_detail.unwrap_or_default();

        let name = price
            .long_name
            .clone()
            .or_else(|| price.short_name.clone())
            .unwrap_or_else(|| ticker.to_string());

        Ok(Quote {
            ticker: ticker.clone(),
            name,
            price: raw(&price.regular_market_price),
            market_cap: raw(&price.market_cap),
            day_high: raw(&price.regular_market_day_high),
            day_low: raw(&price.regular_market_day_low),
            previous_close: raw(&price.regular_market_previous_close)
                .or_else(|| raw(&detail.previous_close)),
            trailing_pe: raw(&detail.trailing_pe),
            volume: raw(&price.regular_market_volume),
        })
    }

    /// # Summary
    /// 从 Yahoo Finance v8 chart 接口抓取历史行情。
    ///
    /// # Logic
    /// 1. `period1` 取开始日零点，`period2` 取结束日零点 (结束日不包含在内)。
    /// 2. 映射 interval、盘前盘后、公司行为参数。
    /// 3. 发起请求并解析嵌套的 JSON 数据。
    /// 4. 结果为空数组视为代码非法；有结果但无时间戳视为区间内无数据。
    /// 5. 错误体声明该周期/区间数据不可用时 (含 4xx) 返回空序列。
    async fn history(
        &self,
        ticker: &Ticker,
        params: &HistoryParams,
    ) -> Result<PriceSeries, MarketError> {
        let mut query = vec![
            ("period1", day_start(params.start).to_string()),
            ("period2", day_start(params.end).to_string()),
            ("interval", interval_param(params.interval).to_string()),
            ("includePrePost", params.include_prepost.to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];
        if params.include_actions {
            query.push(("events", "div|split".to_string()));
        }

        let (status, body) = self
            .send(ticker, &format!("/v8/finance/chart/{}", ticker), &query)
            .await?;

        if status == StatusCode::NOT_FOUND {
            return Err(MarketError::InvalidTicker(ticker.to_string()));
        }
        if !status.is_success() {
            let err = decode::<ChartResponse>(&body)
                .ok()
                .and_then(|r| r.chart.error);
            return match err {
                Some(err) if status.is_client_error() => chart_error(ticker, params, err),
                _ => {
                    warn!("Yahoo returned HTTP {} for {}", status, ticker);
                    Err(MarketError::UpstreamUnavailable(format!("HTTP {}", status)))
                }
            };
        }

        let resp: ChartResponse = decode(&body)?;
        if let Some(err) = resp.chart.error {
            return chart_error(ticker, params, err);
        }

        let result = resp
            .chart
            .result
            .and_then(|mut list| list.pop())
            .ok_or_else(|| MarketError::InvalidTicker(ticker.to_string()))?;

        let rows = rows_from_chart(result, params);
        debug!("Fetched {} rows for {} ({})", rows.len(), ticker, params.interval);
        Ok(PriceSeries::new(ticker.clone(), params.clone(), rows))
    }

    /// # Summary
    /// 通过 quoteSummary 的年度报表模块获取三大报表。
    async fn financial_statements(
        &self,
        ticker: &Ticker,
    ) -> Result<FinancialStatements, MarketError> {
        let result = self
            .quote_summary(
                ticker,
                "incomeStatementHistory,balanceSheetHistory,cashflowStatementHistory",
            )
            .await?;

        Ok(FinancialStatements {
            ticker: ticker.clone(),
            income_statement: statement_table(
                result.income_statement_history.as_ref(),
                "incomeStatementHistory",
            ),
            balance_sheet: statement_table(
                result.balance_sheet_history.as_ref(),
                "balanceSheetStatements",
            ),
            cash_flow: statement_table(
                result.cashflow_statement_history.as_ref(),
                "cashflowStatements",
            ),
        })
    }
}

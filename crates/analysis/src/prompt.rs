use kabu_core::common::Ticker;
use kabu_core::market::entity::{PriceSeries, Quote};

/// 对话种子附带的近期行情行数
pub const SEED_ROWS: usize = 10;

const NOT_AVAILABLE: &str = "N/A";

/// # Summary
/// 把行情序列渲染为紧凑的 CSV 文本。
///
/// # Logic
/// 1. 首行为表头 `date,open,high,low,close,volume`。
/// 2. 日内周期带时分，其余只保留日期。
/// 3. 只取最后 `limit` 行 (为 `None` 时取全部)。
pub fn series_table(series: &PriceSeries, limit: Option<usize>) -> String {
    let rows = match limit {
        Some(n) => series.tail(n),
        None => series.rows(),
    };
    let time_format = if series.params.interval.is_intraday() {
        "%Y-%m-%d %H:%M"
    } else {
        "%Y-%m-%d"
    };

    let mut out = String::from("date,open,high,low,close,volume");
    for row in rows {
        out.push_str(&format!(
            "\n{},{:.2},{:.2},{:.2},{:.2},{:.0}",
            row.time.format(time_format),
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume
        ));
    }
    out
}

/// 趋势分析的用户提示词
pub fn summary_prompt(ticker: &Ticker, series: &PriceSeries) -> String {
    format!(
        "Based on the following stock data:\n{}\n\n\
         Provide an analysis on current trends, potential risks, and investment suggestions for {}.",
        series_table(series, None),
        ticker
    )
}

fn money(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |v| format!("${:.*}", decimals, v),
    )
}

fn plain(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.*}", decimals, v))
}

fn quote_block(index: usize, ticker: &Ticker, quote: &Quote) -> String {
    format!(
        "**Stock {}:** {} ({})\n\
         - Current Price: {}\n\
         - Market Cap: {}\n\
         - Day High: {}\n\
         - Day Low: {}\n\
         - P/E Ratio: {}\n\
         - Volume: {}",
        index,
        quote.name,
        ticker,
        money(quote.price, 2),
        money(quote.market_cap, 0),
        money(quote.day_high, 2),
        money(quote.day_low, 2),
        plain(quote.trailing_pe, 2),
        plain(quote.volume, 0),
    )
}

/// 两只股票对比的用户提示词
pub fn comparison_prompt(a: &Ticker, quote_a: &Quote, b: &Ticker, quote_b: &Quote) -> String {
    format!(
        "Compare the following two stocks based on financial data:\n\n\
         {}\n\n\
         {}\n\n\
         Analyze and determine:\n\
         - Which stock is currently performing better?\n\
         - Which stock has better growth potential?\n\
         - Any risks or concerns?\n\
         - If an investor had to choose, which would be a better buy and why?",
        quote_block(1, a, quote_a),
        quote_block(2, b, quote_b),
    )
}

/// # Summary
/// 对话上下文种子：代码、已有的 AI 分析与最近的行情行。
pub fn chat_seed(ticker: &Ticker, summary: &str, series: &PriceSeries) -> String {
    format!(
        "Stock analysis for {}:\n\n{}\n\nRecent Stock Prices:\n```\n{}\n```",
        ticker,
        summary,
        series_table(series, Some(SEED_ROWS))
    )
}

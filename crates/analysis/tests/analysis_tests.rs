use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use kabu_analysis::chat::{ChatAssistant, INTERRUPTED_REPLY};
use kabu_analysis::prompt::chat_seed;
use kabu_analysis::service::{AnalysisError, AnalysisService};
use kabu_core::chat::entity::{ChatState, Conversation};
use kabu_core::chat::error::ChatError;
use kabu_core::common::Ticker;
use kabu_core::llm::entity::{ANALYST_SYSTEM_PROMPT, ChatMessage, Role};
use kabu_core::llm::error::CompletionError;
use kabu_core::llm::port::CompletionClient;
use kabu_core::market::entity::{HistoryParams, PriceRow, PriceSeries, Quote};
use std::sync::{Arc, Mutex};

/// # Summary
/// 记录每次调用的模拟补全客户端。
#[derive(Default)]
struct MockCompletion {
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    fail: bool,
}

impl MockCompletion {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last_call(&self) -> Vec<ChatMessage> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(messages.to_vec());
        if self.fail {
            return Err(CompletionError::Status {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(format!("reply #{}", calls.len()))
    }
}

fn ticker(s: &str) -> Ticker {
    Ticker::parse(s).unwrap()
}

fn quote(symbol: &str, price: f64) -> Quote {
    Quote {
        ticker: ticker(symbol),
        name: format!("{} Corp", symbol),
        price: Some(price),
        market_cap: Some(1.0e12),
        day_high: Some(price + 1.0),
        day_low: Some(price - 1.0),
        previous_close: Some(price),
        trailing_pe: Some(25.0),
        volume: Some(1_000_000.0),
    }
}

fn series(symbol: &str, days: i64) -> PriceSeries {
    let params = HistoryParams::ending_on(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let rows = (0..days)
        .map(|i| PriceRow {
            time: base + chrono::Duration::days(i),
            open: 100.0,
            high: 102.0,
            low: 98.0,
            close: 101.0,
            volume: 5000.0,
            dividend: None,
            split: None,
        })
        .collect();
    PriceSeries::new(ticker(symbol), params, rows)
}

#[tokio::test]
async fn test_summarize_sends_system_prompt_and_rows() {
    let mock = Arc::new(MockCompletion::default());
    let service = AnalysisService::new(mock.clone());

    let text = service.summarize(&ticker("AAPL"), &series("AAPL", 3)).await;
    assert_eq!(text, "reply #1");

    let sent = mock.last_call();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], ChatMessage::system(ANALYST_SYSTEM_PROMPT));
    assert_eq!(sent[1].role, Role::User);
    assert!(sent[1].content.contains("2024-01-03,100.00,102.00,98.00,101.00,5000"));
    assert!(
        sent[1]
            .content
            .ends_with("potential risks, and investment suggestions for AAPL.")
    );
}

#[tokio::test]
async fn test_summarize_empty_series_makes_no_call() {
    let mock = Arc::new(MockCompletion::default());
    let service = AnalysisService::new(mock.clone());

    let result = service
        .try_summarize(&ticker("AAPL"), &series("AAPL", 0))
        .await;
    assert_eq!(result, Err(AnalysisError::EmptySeries("AAPL".to_string())));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_summarize_failure_rendered_inline() {
    let service = AnalysisService::new(Arc::new(MockCompletion::failing()));
    let text = service.summarize(&ticker("AAPL"), &series("AAPL", 3)).await;
    assert_eq!(text, "Error: HTTP 503: overloaded");
}

#[tokio::test]
async fn test_compare_prompt_lists_both_stocks() {
    let mock = Arc::new(MockCompletion::default());
    let service = AnalysisService::new(mock.clone());
    let (aapl, msft) = (quote("AAPL", 190.0), quote("MSFT", 410.0));

    let text = service
        .compare(&ticker("AAPL"), Some(&aapl), &ticker("MSFT"), Some(&msft))
        .await;
    assert_eq!(text, "reply #1");

    let prompt = &mock.last_call()[1].content;
    assert!(prompt.contains("**Stock 1:** AAPL Corp (AAPL)"));
    assert!(prompt.contains("**Stock 2:** MSFT Corp (MSFT)"));
    assert!(prompt.contains("- Current Price: $410.00"));
    assert!(prompt.contains("which would be a better buy and why?"));
}

/// # Summary
/// 任一侧报价缺失时必须直接失败，且不调用补全接口。
#[tokio::test]
async fn test_compare_fails_closed_on_missing_quote() {
    let mock = Arc::new(MockCompletion::default());
    let service = AnalysisService::new(mock.clone());
    let aapl = quote("AAPL", 190.0);

    let text = service
        .compare(&ticker("AAPL"), Some(&aapl), &ticker("ZZZZ"), None)
        .await;
    assert_eq!(text, "Error: One or both stock tickers are invalid.");

    let result = service
        .try_compare(&ticker("ZZZZ"), None, &ticker("AAPL"), Some(&aapl))
        .await;
    assert_eq!(result, Err(AnalysisError::MissingQuote));
    assert_eq!(mock.call_count(), 0);
}

/// # Summary
/// 对话每轮发送完整历史：1 条系统提示词 + 种子 (0 或 1) + 2N 条往来。
#[tokio::test]
async fn test_chat_sends_full_history_each_turn() {
    let mock = Arc::new(MockCompletion::default());
    let assistant = ChatAssistant::new(mock.clone());
    let seed = chat_seed(&ticker("AAPL"), "Uptrend.", &series("AAPL", 15));
    let mut conv = Conversation::new(ANALYST_SYSTEM_PROMPT, Some(seed));

    for turn in 0..3 {
        let reply = assistant
            .submit(&mut conv, &format!("question {}", turn))
            .await
            .unwrap();
        assert_eq!(reply, format!("reply #{}", turn + 1));
        let sent = mock.last_call();
        assert_eq!(sent.len(), 1 + 1 + 2 * turn + 1);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[1].content.starts_with("Stock analysis for AAPL:"));
    }

    assert_eq!(conv.messages().len(), 2 + 6);
    assert_eq!(conv.transcript().len(), 6);
    assert_eq!(conv.state(), ChatState::AwaitingInput);
}

#[tokio::test]
async fn test_chat_unseeded_and_empty_input() {
    let mock = Arc::new(MockCompletion::default());
    let assistant = ChatAssistant::new(mock.clone());
    let mut conv = Conversation::new(ANALYST_SYSTEM_PROMPT, None);

    assert_eq!(
        assistant.submit(&mut conv, "   ").await,
        Err(ChatError::EmptyMessage)
    );
    assert_eq!(mock.call_count(), 0);

    assistant.submit(&mut conv, "hello").await.unwrap();
    assert_eq!(mock.last_call().len(), 2);
}

#[tokio::test]
async fn test_chat_failure_becomes_error_turn() {
    let assistant = ChatAssistant::new(Arc::new(MockCompletion::failing()));
    let mut conv = Conversation::new(ANALYST_SYSTEM_PROMPT, None);

    let reply = assistant.submit(&mut conv, "hello").await.unwrap();
    assert_eq!(reply, "Error: HTTP 503: overloaded");
    let last = conv.messages().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(conv.state(), ChatState::AwaitingInput);
}

#[tokio::test]
async fn test_interrupted_turn_is_closed() {
    let mut conv = Conversation::new(ANALYST_SYSTEM_PROMPT, None);
    assert!(!ChatAssistant::recover(&mut conv).unwrap());

    conv.begin_turn("lost").unwrap();
    assert!(ChatAssistant::recover(&mut conv).unwrap());
    assert_eq!(conv.state(), ChatState::AwaitingInput);
    assert_eq!(
        conv.messages().last().unwrap().content,
        format!("Error: {}", INTERRUPTED_REPLY)
    );
}

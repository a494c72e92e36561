use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use kabu_core::config::LlmConfig;
use kabu_core::llm::entity::{ANALYST_SYSTEM_PROMPT, ChatMessage};
use kabu_core::llm::error::CompletionError;
use kabu_core::llm::port::{CompletionClient, CompletionExt};
use kabu_llm::openai::OpenAiClient;
use serde_json::{Value, json};
use std::env;

/// 回显最后一条消息，同时校验请求头与请求体结构
async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "bad key"}})),
        );
    }
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let last = messages
        .last()
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();
    let reply = format!(
        "{}|{}|{}|{}",
        body["model"].as_str().unwrap_or_default(),
        messages.len(),
        messages
            .first()
            .and_then(|m| m["role"].as_str())
            .unwrap_or_default(),
        last
    );
    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": reply}}]
        })),
    )
}

async fn spawn_mock() -> anyhow::Result<String> {
    let app = Router::new()
        .route("/chat", post(echo))
        .route(
            "/fail",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/empty", post(|| async { Json(json!({"choices": []})) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok(format!("http://{}", addr))
}

fn config(base: &str, path: &str, key: Option<&str>) -> LlmConfig {
    LlmConfig {
        api_key: key.map(str::to_string),
        api_base: format!("{}{}", base, path),
        model: "gpt-test".to_string(),
        ..LlmConfig::default()
    }
}

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANALYST_SYSTEM_PROMPT),
        ChatMessage::user("How is AAPL doing?"),
    ]
}

#[tokio::test]
async fn test_completion_success() -> anyhow::Result<()> {
    let base = spawn_mock().await?;
    let client = OpenAiClient::new(&config(&base, "/chat", Some("test-key")));

    let reply = client.complete(&messages()).await?;
    assert_eq!(reply, "gpt-test|2|system|How is AAPL doing?");
    Ok(())
}

#[tokio::test]
async fn test_missing_api_key_fails_without_request() -> anyhow::Result<()> {
    let client = OpenAiClient::new(&config("http://127.0.0.1:9", "/chat", None));
    assert!(!client.has_api_key());
    assert_eq!(
        client.complete(&messages()).await,
        Err(CompletionError::MissingApiKey)
    );

    let blank = OpenAiClient::new(&config("http://127.0.0.1:9", "/chat", Some("  ")));
    assert_eq!(
        blank.complete(&messages()).await,
        Err(CompletionError::MissingApiKey)
    );
    Ok(())
}

#[tokio::test]
async fn test_http_error_rendered_as_text() -> anyhow::Result<()> {
    let base = spawn_mock().await?;
    let client = OpenAiClient::new(&config(&base, "/fail", Some("test-key")));

    assert_eq!(
        client.complete(&messages()).await,
        Err(CompletionError::Status {
            status: 500,
            body: "boom".to_string()
        })
    );
    assert_eq!(client.complete_text(&messages()).await, "Error: HTTP 500: boom");
    Ok(())
}

#[tokio::test]
async fn test_wrong_key_is_status_error() -> anyhow::Result<()> {
    let base = spawn_mock().await?;
    let client = OpenAiClient::new(&config(&base, "/chat", Some("other-key")));

    let result = client.complete(&messages()).await;
    assert!(matches!(
        result,
        Err(CompletionError::Status { status: 401, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_malformed_reply_is_parse_error() -> anyhow::Result<()> {
    let base = spawn_mock().await?;
    let client = OpenAiClient::new(&config(&base, "/empty", Some("test-key")));

    let text = client.complete_text(&messages()).await;
    assert!(text.starts_with("Error: Parse error"), "got {}", text);
    Ok(())
}

/// # Summary
/// 集成测试：真实补全接口。
///
/// # Logic
/// 1. 加载 .env 环境变量。
/// 2. 从环境变量获取 API Key、接口地址与模型。
/// 3. 发送一条消息并断言返回非错误文本。
#[tokio::test]
#[ignore] // 默认忽略，仅在手动测试时通过环境变量开启
async fn test_real_completion() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut cfg = LlmConfig {
        api_key: Some(env::var("OPENAI_API_KEY")?),
        ..LlmConfig::default()
    };
    if let Ok(base) = env::var("OPENAI_API_BASE") {
        cfg.api_base = base;
    }
    if let Ok(model) = env::var("MODEL_NAME") {
        cfg.model = model;
    }

    let client = OpenAiClient::new(&cfg);
    let text = client.complete_text(&messages()).await;
    assert!(!text.starts_with("Error: "), "completion failed: {}", text);
    Ok(())
}

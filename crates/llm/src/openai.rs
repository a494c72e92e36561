use async_trait::async_trait;
use kabu_core::config::LlmConfig;
use kabu_core::llm::entity::ChatMessage;
use kabu_core::llm::error::CompletionError;
use kabu_core::llm::port::CompletionClient;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// # Summary
/// A completion client for OpenAI-compatible chat completion endpoints.
///
/// # Invariants
/// * `endpoint` is the full completion URL; requests are POSTed to it as-is.
/// * A missing `api_key` does not prevent construction; every call then fails with
///   `CompletionError::MissingApiKey` without touching the network.
pub struct OpenAiClient {
    /// The full chat completion URL.
    endpoint: String,
    /// The model name sent with every request.
    model: String,
    /// The API key, if configured.
    api_key: Option<String>,
    /// The header carrying the API key.
    api_key_header: String,
    /// The HTTP client used for requests.
    client: reqwest::Client,
}

/// # Summary
/// Request body for the chat completion endpoint.
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// # Summary
    /// Creates a new `OpenAiClient` from the completion settings.
    ///
    /// # Logic
    /// 1. Installs the process-wide TLS crypto provider.
    /// 2. Builds an HTTP client with the configured timeout, falling back to a default
    ///    client if the builder fails.
    ///
    /// # Arguments
    /// * `config` - Endpoint, model, key and timeout settings.
    ///
    /// # Returns
    /// * A new instance of `OpenAiClient`.
    pub fn new(config: &LlmConfig) -> Self {
        kabu_core::tls::install_crypto_provider();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build completion HTTP client, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            endpoint: config.api_base.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            api_key_header: config.api_key_header.clone(),
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    /// # Summary
    /// Sends the full message list to the completion endpoint.
    ///
    /// # Logic
    /// 1. Fails fast when no API key is configured.
    /// 2. POSTs `{model, messages}` with the key in the configured header.
    /// 3. Maps non-success statuses to `CompletionError::Status` with the response body.
    /// 4. Extracts `choices[0].message.content`.
    ///
    /// # Arguments
    /// * `messages` - Ordered role-tagged messages, system prompt first.
    ///
    /// # Returns
    /// * The assistant reply text.
    /// * `Err(CompletionError)` on missing key, transport, status or parse failures.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;

        let header_name = HeaderName::from_bytes(self.api_key_header.as_bytes())
            .map_err(|e| CompletionError::Network(format!("invalid api key header: {}", e)))?;
        let header_value = HeaderValue::from_str(api_key)
            .map_err(|e| CompletionError::Network(format!("invalid api key: {}", e)))?;

        let payload = CompletionRequest {
            model: &self.model,
            messages,
        };

        debug!(
            "Sending {} messages to completion endpoint (model={})",
            messages.len(),
            self.model
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(header_name, header_value)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Parse("missing choices[0].message.content".to_string()))
    }
}

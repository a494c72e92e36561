use crate::llm::entity::ChatMessage;
use crate::llm::error::CompletionError;
use async_trait::async_trait;

/// 错误文本统一前缀，展示层据此渲染而无需特殊处理
pub const ERROR_PREFIX: &str = "Error: ";

/// # Summary
/// 对话补全接口 (Port)。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync` 以支持并发调用。
/// - `messages` 的第一条应为系统提示词。
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// # Summary
    /// 发送完整的消息序列并返回助手回复。
    ///
    /// # Arguments
    /// * `messages` - 按顺序排列的带角色消息。
    ///
    /// # Returns
    /// * 成功返回助手回复文本。
    /// * 失败返回 `CompletionError`。
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// # Summary
/// 补全接口扩展，把错误折叠为可直接展示的文本。
#[async_trait]
pub trait CompletionExt: CompletionClient {
    /// # Summary
    /// 发送消息并总是返回文本。
    ///
    /// # Logic
    /// 1. 调用 `complete`。
    /// 2. 失败时返回 `Error: {e}`，记录告警日志。
    async fn complete_text(&self, messages: &[ChatMessage]) -> String {
        match self.complete(messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Completion failed: {}", e);
                error_text(&e)
            }
        }
    }
}

impl<T: CompletionClient + ?Sized> CompletionExt for T {}

/// 把任意错误渲染为 `Error: ...` 文本
pub fn error_text(err: &impl std::fmt::Display) -> String {
    format!("{}{}", ERROR_PREFIX, err)
}

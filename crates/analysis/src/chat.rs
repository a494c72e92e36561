use kabu_core::chat::entity::{ChatState, Conversation};
use kabu_core::chat::error::ChatError;
use kabu_core::llm::port::{CompletionClient, CompletionExt, error_text};
use std::sync::Arc;
use tracing::{debug, warn};

/// 上一轮未等到回复即被中断时补写的助手消息
pub const INTERRUPTED_REPLY: &str = "The previous request was interrupted before a reply arrived.";

/// # Summary
/// 驱动对话轮次的助手。
///
/// # Invariants
/// - 每次提交最多发起一次补全调用。
/// - 补全失败时写入 `Error: ...` 文本作为助手回复，对话保持用户/助手交替。
#[derive(Clone)]
pub struct ChatAssistant {
    client: Arc<dyn CompletionClient>,
}

impl ChatAssistant {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// # Summary
    /// 完成一轮对话。
    ///
    /// # Logic
    /// 1. 追加用户消息 (空白输入或上一轮未结束时拒绝，不发起调用)。
    /// 2. 将包含系统提示词与种子在内的完整历史发送给补全接口。
    /// 3. 追加助手回复或错误文本。
    ///
    /// # Arguments
    /// * `conversation`: 会话对话记录。
    /// * `text`: 用户输入。
    ///
    /// # Returns
    /// 本轮写入的助手消息内容。
    pub async fn submit(
        &self,
        conversation: &mut Conversation,
        text: &str,
    ) -> Result<String, ChatError> {
        let messages = conversation.begin_turn(text)?.to_vec();
        debug!("Chat turn with {} messages", messages.len());
        let reply = self.client.complete_text(&messages).await;
        conversation.complete_turn(reply.clone())?;
        Ok(reply)
    }

    /// # Summary
    /// 关闭被中断的轮次。
    ///
    /// # Returns
    /// 是否补写了错误回复。
    pub fn recover(conversation: &mut Conversation) -> Result<bool, ChatError> {
        if conversation.state() != ChatState::AwaitingResponse {
            return Ok(false);
        }
        warn!("Closing interrupted chat turn");
        conversation.complete_turn(error_text(&INTERRUPTED_REPLY))?;
        Ok(true)
    }
}

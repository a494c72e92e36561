use crate::chat::error::ChatError;
use crate::llm::entity::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// # Summary
/// 对话状态机的两个状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ChatState {
    // 等待用户输入
    AwaitingInput,
    // 已追加用户消息，等待补全返回
    AwaitingResponse,
}

/// # Summary
/// 会话级对话记录。
///
/// # Invariants
/// - 第一条消息永远是系统提示词；可选的上下文种子消息紧随其后，仅在创建时插入一次。
/// - 只追加，不重排、不截断。
/// - 助手回复只会在对应的用户消息追加之后、补全调用返回之后写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    // 开场消息数量 (系统提示词 + 种子)
    preamble_len: usize,
    state: ChatState,
}

impl Conversation {
    /// # Summary
    /// 创建对话并写入开场消息。
    ///
    /// # Arguments
    /// * `system_prompt`: 固定系统提示词。
    /// * `seed`: 可选上下文 (代码、已有 AI 分析、近期行情)，以用户消息身份插入。
    ///
    /// # Returns
    /// 处于 `AwaitingInput` 状态的新对话。
    pub fn new(system_prompt: &str, seed: Option<String>) -> Self {
        let mut messages = vec![ChatMessage::system(system_prompt)];
        if let Some(context) = seed {
            messages.push(ChatMessage::user(context));
        }
        Self {
            preamble_len: messages.len(),
            messages,
            state: ChatState::AwaitingInput,
        }
    }

    /// # Summary
    /// 开始一轮对话：追加用户消息并进入等待回复状态。
    ///
    /// # Logic
    /// 1. 拒绝空白输入。
    /// 2. 拒绝上一轮尚未结束时的新输入。
    /// 3. 追加用户消息，状态切换为 `AwaitingResponse`。
    ///
    /// # Arguments
    /// * `text`: 用户输入。
    ///
    /// # Returns
    /// 成功返回需要发送给补全接口的完整消息序列。
    pub fn begin_turn(&mut self, text: &str) -> Result<&[ChatMessage], ChatError> {
        if self.state == ChatState::AwaitingResponse {
            return Err(ChatError::TurnInProgress);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.messages.push(ChatMessage::user(text));
        self.state = ChatState::AwaitingResponse;
        Ok(&self.messages)
    }

    /// # Summary
    /// 结束一轮对话：无论补全成功与否都追加一条助手消息。
    ///
    /// # Arguments
    /// * `reply`: 助手回复或 `Error: ...` 文本。
    ///
    /// # Returns
    /// 不在等待回复状态时返回 `ChatError::NoTurnInProgress`。
    pub fn complete_turn(&mut self, reply: String) -> Result<(), ChatError> {
        if self.state != ChatState::AwaitingResponse {
            return Err(ChatError::NoTurnInProgress);
        }
        self.messages.push(ChatMessage::assistant(reply));
        self.state = ChatState::AwaitingInput;
        Ok(())
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// 全部消息 (含系统提示词与种子)
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// 是否带有上下文种子
    pub fn is_seeded(&self) -> bool {
        self.preamble_len > 1
    }

    /// 用户可见的对话轮次 (不含系统提示词与种子)
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.messages[self.preamble_len..]
    }

    /// 已完成的轮次数
    pub fn completed_turns(&self) -> usize {
        self.transcript()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_state_machine() {
        let mut conv = Conversation::new("sys", None);
        assert_eq!(conv.state(), ChatState::AwaitingInput);

        let sent = conv.begin_turn("  hello ").unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].content, "hello");
        assert_eq!(conv.state(), ChatState::AwaitingResponse);

        assert_eq!(conv.begin_turn("again"), Err(ChatError::TurnInProgress));

        conv.complete_turn("hi".to_string()).unwrap();
        assert_eq!(conv.state(), ChatState::AwaitingInput);
        assert_eq!(
            conv.complete_turn("stray".to_string()),
            Err(ChatError::NoTurnInProgress)
        );
        assert_eq!(conv.completed_turns(), 1);
    }

    #[test]
    fn test_seed_inserted_once_and_hidden_from_transcript() {
        let mut conv = Conversation::new("sys", Some("context".to_string()));
        assert!(conv.is_seeded());
        conv.begin_turn("q1").unwrap();
        conv.complete_turn("a1".to_string()).unwrap();
        conv.begin_turn("q2").unwrap();
        conv.complete_turn("a2".to_string()).unwrap();

        assert_eq!(conv.messages().len(), 1 + 1 + 4);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[1].content, "context");
        let transcript: Vec<&str> = conv.transcript().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(transcript, vec!["q1", "a1", "q2", "a2"]);
        let seeds = conv
            .messages()
            .iter()
            .filter(|m| m.content == "context")
            .count();
        assert_eq!(seeds, 1);
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut conv = Conversation::new("sys", None);
        assert_eq!(conv.begin_turn("   "), Err(ChatError::EmptyMessage));
        assert_eq!(conv.messages().len(), 1);
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 所有分析与对话共用的系统提示词
pub const ANALYST_SYSTEM_PROMPT: &str = "You are an AI financial analyst.";

/// # Summary
/// 对话消息的角色标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// # Summary
/// 带角色标签的单条消息，序列化后直接作为补全接口 `messages` 数组的元素。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

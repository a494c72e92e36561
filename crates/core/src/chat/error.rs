use thiserror::Error;

/// # Summary
/// 对话状态机错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("A reply is still pending for the previous message")]
    TurnInProgress,
    #[error("No message is waiting for a reply")]
    NoTurnInProgress,
}

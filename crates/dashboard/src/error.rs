use kabu_analysis::service::AnalysisError;
use kabu_core::cache::error::CacheError;
use kabu_core::chat::error::ChatError;
use kabu_core::market::error::MarketError;
use thiserror::Error;

/// # Summary
/// Dashboard 层的统一错误类型。
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Market error: {0}")]
    Market(#[from] MarketError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

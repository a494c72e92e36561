use thiserror::Error;

/// # Summary
/// 大模型补全接口错误枚举。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - 在客户端边界被转换为 `Error: ...` 文本，不向展示层抛出。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// 未配置 API Key
    #[error("API key is not configured")]
    MissingApiKey,

    /// 网络连接或传输错误
    #[error("Network error: {0}")]
    Network(String),

    /// 接口返回非 2xx 状态码
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 响应体缺少 `choices[0].message.content`
    #[error("Parse error: {0}")]
    Parse(String),
}

use thiserror::Error;

/// # Summary
/// 缓存域错误枚举，处理条目序列化及底层存储故障。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    // 条目序列化失败
    #[error("Serialize error: {0}")]
    Serialize(String),
    // 条目反序列化失败 (同一个键被以不同类型读取)
    #[error("Deserialize error: {0}")]
    Deserialize(String),
    // 底层存储引擎故障
    #[error("Storage error: {0}")]
    Storage(String),
}

use crate::cache::entity::CacheKey;
use crate::cache::error::CacheError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// # Summary
/// 会话缓存的底层字节存储接口 (Port)。
///
/// # Invariants
/// - 处理原始字节，确保 Trait 是对象安全的 (Object Safe)。
/// - 一个实例只服务一个会话，不在会话之间共享。
/// - 失效与依赖关系由上游 `SessionCache` 负责。
#[async_trait]
pub trait Cache: Send + Sync {
    /// # Summary
    /// 写入原始字节，若键已存在则整体覆盖。
    ///
    /// # Arguments
    /// * `key`: 缓存键。
    /// * `value`: 序列化后的条目。
    ///
    /// # Returns
    /// 成功返回 Ok，失败返回 `CacheError`。
    async fn set_raw(&self, key: &CacheKey, value: Vec<u8>) -> Result<(), CacheError>;

    /// # Summary
    /// 读取原始字节。
    ///
    /// # Returns
    /// 存在则返回 `Some(Vec<u8>)`，否则返回 `None`。
    async fn get_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// # Summary
    /// 删除指定键。
    ///
    /// # Returns
    /// 返回键删除前是否存在。
    async fn del(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// # Summary
    /// 列出当前所有键，顺序不保证。
    async fn keys(&self) -> Result<Vec<CacheKey>, CacheError>;

    /// # Summary
    /// 清空全部条目。
    async fn clear(&self) -> Result<(), CacheError>;
}

/// # Summary
/// 缓存泛型扩展接口，提供 JSON 序列化支持。
///
/// # Invariants
/// - 自动为所有实现 `Cache` 的类型提供支持。
#[async_trait]
pub trait CacheExt: Cache {
    /// # Summary
    /// 存入强类型对象。
    ///
    /// # Logic
    /// 1. 使用 JSON 序列化对象。
    /// 2. 调用底层 `set_raw` 写入。
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &CacheKey,
        value: &T,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialize(e.to_string()))?;
        self.set_raw(key, bytes).await
    }

    /// # Summary
    /// 取出强类型对象。
    ///
    /// # Logic
    /// 1. 调用底层 `get_raw` 获取字节。
    /// 2. 使用 JSON 反序列化为目标类型。
    async fn get<T: DeserializeOwned + Send>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<T>, CacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => {
                let val = serde_json::from_slice(&bytes)
                    .map_err(|e| CacheError::Deserialize(e.to_string()))?;
                Ok(Some(val))
            }
            None => Ok(None),
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}

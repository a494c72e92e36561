use async_trait::async_trait;
use dashmap::DashMap;
use kabu_core::cache::entity::CacheKey;
use kabu_core::cache::error::CacheError;
use kabu_core::cache::port::Cache;

/// # Summary
/// 基于 DashMap 的会话内存缓存实现。
///
/// # Invariants
/// - 每个会话持有独立实例，会话结束后随之释放。
/// - 不提供自动过期或容量限制，失效由 `SessionCache` 驱动。
#[derive(Default)]
pub struct MemCache {
    // 缓存键 → 序列化后的条目
    storage: DashMap<CacheKey, Vec<u8>>,
}

impl MemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl Cache for MemCache {
    async fn set_raw(&self, key: &CacheKey, value: Vec<u8>) -> Result<(), CacheError> {
        self.storage.insert(key.clone(), value);
        Ok(())
    }

    async fn get_raw(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.storage.get(key).map(|v| v.value().clone()))
    }

    async fn del(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.storage.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        Ok(self.storage.iter().map(|e| e.key().clone()).collect())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.storage.clear();
        Ok(())
    }
}

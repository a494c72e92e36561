use crate::mem::MemCache;
use kabu_core::cache::entity::{CacheEntry, CacheKey};
use kabu_core::cache::error::CacheError;
use kabu_core::cache::port::{Cache, CacheExt};
use kabu_core::common::Ticker;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// # Summary
/// 会话级数据获取缓存，决定每次交互是复用已获取的数据还是重新请求上游。
///
/// # Invariants
/// - 每个逻辑键只保留最近一次成功获取的条目及产生它的完整参数。
/// - 失败的获取永远不会被写入，下一次访问必然重试。
/// - 上游数据集重新获取后，同一代码的下游派生条目被标记为过期 (见 `Dataset::dependents`)；
///   以相同参数派生的 AI 分析除外。
/// - 实例只属于一个会话，不跨会话共享。
pub struct SessionCache {
    // 底层字节存储
    store: Arc<dyn Cache>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn Cache>) -> Self {
        Self { store }
    }

    /// 基于独立 `MemCache` 的会话缓存
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemCache::new()))
    }

    /// # Summary
    /// 命中则直接返回，否则调用 `fetch` 获取并写入。
    ///
    /// # Logic
    /// 1. 读取 `key` 对应条目；若有效且参数逐字段相等，直接返回缓存值，不调用 `fetch`。
    /// 2. 否则以参数副本调用 `fetch`；失败原样返回，不写入任何条目。
    /// 3. 成功则以 `(params, value)` 覆盖该键，并将下游派生条目标记为过期。
    ///
    /// # Arguments
    /// * `key`: 逻辑缓存键。
    /// * `params`: 影响结果的全部参数。
    /// * `fetch`: 实际的获取函数。
    ///
    /// # Returns
    /// 缓存值或新获取的值；获取失败或存储失败时返回错误。
    pub async fn get_or_fetch<P, V, E, F, Fut>(
        &self,
        key: &CacheKey,
        params: &P,
        fetch: F,
    ) -> Result<V, E>
    where
        P: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync,
        V: Serialize + DeserializeOwned + Send + Sync,
        E: From<CacheError> + Send,
        F: FnOnce(P) -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        if let Some(entry) = self.store.get::<CacheEntry<P, V>>(key).await? {
            if entry.serves(params) {
                debug!("Session cache hit: {}", key);
                return Ok(entry.value);
            }
            debug!(
                "Session cache entry {} no longer serves the request (valid={})",
                key, entry.valid
            );
        } else {
            debug!("Session cache miss: {}", key);
        }

        let value = fetch(params.clone()).await?;

        self.store
            .set(key, &CacheEntry::fresh(params.clone(), &value))
            .await?;
        let upstream =
            serde_json::to_value(params).map_err(|e| CacheError::Serialize(e.to_string()))?;
        self.cascade(key, &upstream).await?;
        Ok(value)
    }

    /// # Summary
    /// 读取条目而不校验参数与有效标记。
    pub async fn peek<P, V>(&self, key: &CacheKey) -> Result<Option<CacheEntry<P, V>>, CacheError>
    where
        P: DeserializeOwned + Send,
        V: DeserializeOwned + Send,
    {
        self.store.get(key).await
    }

    /// # Summary
    /// 删除指定键的条目，其他键不受影响。
    ///
    /// # Returns
    /// 条目删除前是否存在。
    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let removed = self.store.del(key).await?;
        if removed {
            debug!("Session cache invalidated: {}", key);
        }
        Ok(removed)
    }

    /// # Summary
    /// 删除所有涉及该代码的条目 (报价、历史、财报、AI 分析及相关对比)。
    ///
    /// # Returns
    /// 删除的条目数。
    pub async fn invalidate_ticker(&self, ticker: &Ticker) -> Result<usize, CacheError> {
        let mut removed = 0;
        for key in self.store.keys().await? {
            if key.involves(ticker) && self.store.del(&key).await? {
                removed += 1;
            }
        }
        debug!("Session cache dropped {} entries for {}", removed, ticker);
        Ok(removed)
    }

    /// # Summary
    /// 保留条目但清除有效标记，下一次 `get_or_fetch` 必然重新获取。
    ///
    /// # Logic
    /// 以无类型 JSON 形式读写，无需知道条目的具体类型。
    ///
    /// # Returns
    /// 条目是否存在。
    pub async fn mark_stale(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match self.store.get::<CacheEntry<Value, Value>>(key).await? {
            Some(mut entry) => {
                if entry.valid {
                    entry.valid = false;
                    self.store.set(key, &entry).await?;
                    debug!("Session cache marked stale: {}", key);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn contains(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.store.get_raw(key).await?.is_some())
    }

    pub async fn keys(&self) -> Result<Vec<CacheKey>, CacheError> {
        self.store.keys().await
    }

    pub async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.store.keys().await?.len())
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await
    }

    /// # Summary
    /// 将与 `key` 共享代码的下游派生条目标记为过期。
    ///
    /// # Logic
    /// 以上游参数为参数的下游条目 (见 `Dataset::keyed_by_upstream_params`)
    /// 若参数与 `upstream` 相同则保持有效。
    async fn cascade(&self, key: &CacheKey, upstream: &Value) -> Result<(), CacheError> {
        let dependents = key.dataset.dependents();
        if dependents.is_empty() {
            return Ok(());
        }
        for other in self.store.keys().await? {
            let derived = dependents.contains(&other.dataset)
                && key.tickers.iter().any(|t| other.involves(t));
            if !derived {
                continue;
            }
            if other.dataset.keyed_by_upstream_params() {
                let entry = self.store.get::<CacheEntry<Value, Value>>(&other).await?;
                if entry.is_some_and(|e| e.params == *upstream) {
                    continue;
                }
            }
            self.mark_stale(&other).await?;
        }
        Ok(())
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

use crate::error::DashboardError;
use crate::session::DashboardSession;
use chrono::TimeDelta;
use dashmap::DashMap;
use kabu_analysis::service::AnalysisService;
use kabu_core::market::port::MarketDataProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

/// # Summary
/// 会话注册表，系统的应用服务层门面 (Facade)。
/// 编译期仅依赖 `kabu-core` 中的 Trait 定义，行情源与补全接口通过构造函数注入。
///
/// # Invariants
/// - 每个会话 ID (UUID v4) 对应一个独立的 `DashboardSession`，会话之间不共享缓存。
/// - 行情源与分析服务在所有会话间共享，它们本身无状态。
pub struct SessionRegistry {
    // 会话 ID → 会话
    sessions: DashMap<String, Arc<DashboardSession>>,
    market: Arc<dyn MarketDataProvider>,
    analysis: AnalysisService,
}

impl SessionRegistry {
    /// # Summary
    /// 创建 SessionRegistry 实例。
    ///
    /// # Arguments
    /// * `market` - 行情源的具体实现。
    /// * `analysis` - AI 分析服务。
    ///
    /// # Returns
    /// * `Arc<Self>` - 可共享的注册表实例。
    pub fn new(market: Arc<dyn MarketDataProvider>, analysis: AnalysisService) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            market,
            analysis,
        })
    }

    /// 创建新会话
    pub fn create(&self) -> Arc<DashboardSession> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(DashboardSession::new(
            id.clone(),
            self.market.clone(),
            self.analysis.clone(),
        ));
        self.sessions.insert(id.clone(), session.clone());
        info!("Session {} created ({} active)", id, self.sessions.len());
        session
    }

    pub fn get(&self, id: &str) -> Result<Arc<DashboardSession>, DashboardError> {
        self.sessions
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| DashboardError::SessionNotFound(id.to_string()))
    }

    /// # Summary
    /// 结束会话，释放其缓存与对话记录。
    ///
    /// # Returns
    /// 会话是否存在。
    pub fn end(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!("Session {} ended", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// # Summary
    /// 回收空闲超过 `max_idle` 的会话。
    ///
    /// # Returns
    /// 回收的会话数。
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let limit = TimeDelta::from_std(max_idle).unwrap_or(TimeDelta::MAX);
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.idle_for() <= limit);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            info!("Evicted {} idle sessions ({} active)", evicted, self.sessions.len());
        }
        evicted
    }

    /// # Summary
    /// 启动后台巡检协程，周期性回收空闲会话。
    ///
    /// # Arguments
    /// * `max_idle` - 最大空闲时长。
    /// * `every` - 巡检间隔。
    pub fn spawn_sweeper(self: &Arc<Self>, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            // 首个 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.evict_idle(max_idle);
            }
        })
    }
}

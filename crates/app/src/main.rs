mod settings;

use std::sync::Arc;
use std::time::Duration;

use kabu_analysis::service::AnalysisService;
use kabu_api::server::{AppState, start_server};
use kabu_dashboard::registry::SessionRegistry;
use kabu_feed::yahoo::YahooProvider;
use kabu_llm::openai::OpenAiClient;
use tracing::{info, warn};

/// # Summary
/// 应用启动入口，纯粹的装配容器。
/// 负责实例化所有具体实现组件并通过 Arc<dyn Trait> 注入到 SessionRegistry。
///
/// # Logic
/// 1. 加载 `.env` 与分层配置，初始化全局日志。
/// 2. 实例化基础设施层（行情源、补全客户端）。
/// 3. 构造应用服务层（AnalysisService、SessionRegistry）并启动空闲会话巡检。
/// 4. 启动 HTTP 服务，直到收到退出信号。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env loaded: {}", e);
    }
    let config = settings::load_config(settings::CONFIG_FILE, None)?;
    let _log_guard = settings::init_tracing(&config.log);
    info!("Kabu dashboard starting...");

    // 2. 基础设施层
    let market = Arc::new(YahooProvider::new(&config.market)?);
    let llm = Arc::new(OpenAiClient::new(&config.llm));
    if llm.has_api_key() {
        info!("Completion model: {}", llm.model());
    } else {
        warn!("No completion API key configured; AI analysis will return error text");
    }

    // 3. 应用服务层
    let analysis = AnalysisService::new(llm);
    let sessions = SessionRegistry::new(market, analysis);
    let sweeper = sessions.spawn_sweeper(
        Duration::from_secs(config.session.idle_timeout_secs),
        Duration::from_secs(config.session.sweep_interval_secs),
    );

    // 4. HTTP 服务
    let result = start_server(AppState { sessions }, &config.server.bind_addr()).await;
    sweeper.abort();
    info!("Shutdown complete");

    result
}

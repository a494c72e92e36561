//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 的装配代码持有并调用。

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use kabu_dashboard::registry::SessionRegistry;

use crate::routes::{chat, compare, health, report, session, stock};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - `sessions` 在服务启动前由装配代码注入，生命周期与进程等同。
#[derive(Clone)]
pub struct AppState {
    /// 会话注册表 (Facade)
    pub sessions: Arc<SessionRegistry>,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kabu 股票洞察 API",
        version = "0.1.0",
        description = "股票报价、历史行情、AI 分析、双股对比与 AI 对话的 RESTful API。所有视图状态按会话隔离。",
        license(name = "MIT")
    ),
    tags(
        (name = "会话 (Session)", description = "会话的创建与结束"),
        (name = "个股 (Stock)", description = "报价、历史行情与 AI 分析"),
        (name = "对比 (Compare)", description = "两只股票的并列对比与 AI 结论"),
        (name = "财报 (Report)", description = "年度财务报表"),
        (name = "对话 (Chat)", description = "围绕当前个股的多轮 AI 对话"),
        (name = "系统 (System)", description = "健康检查")
    )
)]
pub struct ApiDoc;

// ============================================================
//  服务构建与启动
// ============================================================

/// 构建完整的 axum 应用路由树 (含 Swagger UI 与 CORS)。
pub fn build_router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(health::health))
        .routes(routes!(session::create_session))
        .routes(routes!(session::end_session))
        .routes(routes!(stock::stock_view))
        .routes(routes!(stock::refresh_quote))
        .routes(routes!(compare::compare))
        .routes(routes!(report::report))
        .routes(routes!(chat::chat_history, chat::chat_submit, chat::chat_reset))
        .with_state(state)
        .split_for_parts();

    // 开发阶段允许所有来源
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// 绑定端口并启动 HTTP 监听，收到 Ctrl-C 后优雅退出。
///
/// # Arguments
/// * `state` - 由装配代码注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:8080"`
///
/// # Returns
/// TCP 绑定失败或服务异常退出时返回错误。
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    tracing::info!("🚀 Kabu API Server listening on {}", bind_addr);
    tracing::info!("📖 Swagger UI: http://{}/swagger-ui/", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes::{self, AppState};
use service::{
    file::state_store::StateStore,
    onebot::OneBotClient,
    possession::{GroupFilter, PossessionService, Scheduler},
    runtime,
};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Wire the store, OneBot client and possession service together.
pub async fn build_service(cfg: &AppConfig) -> anyhow::Result<Arc<PossessionService>> {
    runtime::ensure_env(&cfg.storage.state_path).await?;

    let store = StateStore::open(&cfg.storage.state_path).await?;
    let directory = OneBotClient::new(&cfg.onebot)?;
    let filter = GroupFilter::from_config(&cfg.possession);
    info!(
        state_path = %cfg.storage.state_path,
        onebot = %cfg.onebot.base_url,
        group_mode = %filter.mode(),
        "possession service ready"
    );
    Ok(Arc::new(PossessionService::new(Arc::new(directory), store, filter)))
}

/// Public entry: start the scheduler (if enabled) and serve HTTP until `shutdown` resolves.
pub async fn run<F>(cfg: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let service = build_service(&cfg).await?;

    let scheduler = if cfg.possession.auto_enabled {
        Some(Scheduler::start(Arc::clone(&service), cfg.possession.auto_interval))
    } else {
        info!("automatic possession disabled");
        None
    };

    let app: Router = routes::build_router(AppState { service }, build_cors());

    let addr: SocketAddr = cfg.server.bind_addr().parse()?;
    info!(%addr, "starting possession server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;

    // 先停调度器，再返回 serve 的结果
    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    served?;
    Ok(())
}

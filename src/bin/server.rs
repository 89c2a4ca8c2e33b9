use std::net::SocketAddr;
use std::sync::Arc;

use memento::blob::FsBlobStore;
use memento::config::Config;
use memento::control::ControlStore;
use memento::llm::NullLlm;
use memento::scheduler::{self, SchedulerConfig, SchedulerStats};
use memento::state::AppState;
use memento::vector_backend::NullVectorBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    memento::init_logging();

    let config = Config::from_env();
    tracing::info!(environment = %config.environment, bind_addr = %config.bind_addr, "starting memento");

    if config.master_key.is_none() && config.is_production() {
        tracing::warn!("MEMENTO_MASTER_KEY is unset in production; all fields will be stored in plaintext");
    }

    tokio::fs::create_dir_all(&config.workspace_db_dir).await.ok();
    let blob_dir = format!("{}/blobs", config.workspace_db_dir);
    tokio::fs::create_dir_all(&blob_dir).await.ok();

    let control = ControlStore::open(&config.control_db_url, config.control_db_token.as_deref()).await?;

    let bind_addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState::new(
        config,
        control,
        Arc::new(NullVectorBackend),
        Arc::new(NullLlm),
        Arc::new(FsBlobStore::new(blob_dir)),
    ));

    scheduler::spawn(state.clone(), SchedulerConfig::default(), Arc::new(SchedulerStats::default()));

    let router = memento::http::router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}

#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::pool::manager::BrowserPool;
use server::render::chrome::ChromeLauncher;
use server::render::supervisor::RenderSupervisor;
use server::service::handler::{AppState, router};
use server::store::{JsonTemplateStore, TemplateStore};
use server::telemetry::init_tracing;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_tracing();

    let store: Arc<dyn TemplateStore> = Arc::new(load_store(&config)?);
    let launcher = Arc::new(ChromeLauncher::new(&config));
    let pool = BrowserPool::new(launcher, config.pool.clone());
    let supervisor = Arc::new(RenderSupervisor::new(
        pool.clone(),
        config.pdf.clone(),
        config.render_timeout,
    ));
    let state = Arc::new(AppState {
        store,
        supervisor,
        pool: pool.clone(),
    });

    let listener = TcpListener::bind(&config.server_addr).await?;
    tracing::info!(
        addr = %config.server_addr,
        max_browsers = config.pool.max_instances,
        "starting document generation service"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(pool))
        .await?;

    tracing::info!("service shut down successfully");
    Ok(())
}

fn load_store(config: &ServerConfig) -> anyhow::Result<JsonTemplateStore> {
    if config.templates_path.exists() {
        let store = JsonTemplateStore::load(&config.templates_path)?;
        if store.is_empty() {
            tracing::warn!(
                path = %config.templates_path.display(),
                "template seed is empty; every fetch will miss"
            );
        } else {
            tracing::info!(
                templates = store.len(),
                path = %config.templates_path.display(),
                "template store loaded"
            );
        }
        Ok(store)
    } else {
        tracing::warn!(
            path = %config.templates_path.display(),
            "template seed file not found; starting with an empty store"
        );
        Ok(JsonTemplateStore::empty())
    }
}

async fn shutdown_signal(pool: BrowserPool) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    pool.shutdown().await;
}

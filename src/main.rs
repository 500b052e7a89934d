// Propbook - Main Entry Point
// Prediction lifecycle and settlement engine behind an axum HTTP surface

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use propbook::{build_router, AppState, ChainClient, Config, FinalizeWorker, RpcChainClient, SharedState};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("propbook=info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "propbook exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    info!(
        bind = %config.bind_addr,
        data_dir = %config.data_dir,
        platform_account = %config.platform_account_id,
        admin_key = config.admin_api_key.is_some(),
        admin_actors = config.admin_actor_ids.len(),
        "starting propbook"
    );

    let state: SharedState = Arc::new(AppState::from_config(&config)?);

    // No claim survives a restart
    let recovered = state.engine.recover_stale_jobs(chrono::Duration::zero())?;
    if recovered > 0 {
        info!(jobs = recovered, "requeued finalize jobs left running by the previous process");
    }

    let chain = RpcChainClient::new(config.chain_rpc_url.clone());
    chain.log_status();
    let chain: Arc<dyn ChainClient> = Arc::new(chain);
    let worker = FinalizeWorker::new(state.engine.clone(), chain, config.finalize_poll).spawn();

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.abort();
    info!("flushing store");
    state.engine.store().flush().await?;
    info!("goodbye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

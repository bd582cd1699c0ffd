use std::sync::Arc;

use args::Args;
use clap::Parser;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args);

    log::info!(version = env!("CARGO_PKG_VERSION"); "starting bifrost");

    let config = config::Config::load(&args.config)?;
    config.validate()?;

    let listen_address = config
        .server
        .listen_address
        .unwrap_or_else(|| "127.0.0.1:2970".parse().expect("valid default listen address"));

    let mcp_manager = Arc::new(mcp::Manager::new(config.mcp.clone()).await?);
    let router = gateway::router(config.clone(), mcp_manager.clone()).await?;

    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    log::info!(address:% = listen_address; "bifrost listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    mcp_manager.shutdown().await;
    fastrace::flush();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("shutdown signal received, draining worker pools");
}

use std::sync::Arc;

use anyhow::Context;
use argo_connector::{
    argo::ArgoClient,
    config::{self, CliArgs},
    cordra::CordraClient,
    create_app,
    ingest::IngestOptions,
    jobs::DEFAULT_DRAIN_TIMEOUT,
    logging::{init_logging, Console},
    AppState,
};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Archives finished Argo workflows in Cordra
#[derive(Parser, Debug)]
#[clap(name = "argo-connector", about = "Archives finished Argo workflows in Cordra")]
struct Args {
    #[command(flatten)]
    config: CliArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenv::dotenv().ok();

    let args = Args::parse().config;
    // Logging comes first so configuration loading is logged too
    let _log_guards = init_logging(&args.log_level, args.log_json, args.log_dir.as_deref(), Console::Stdout)
        .context("Failed to initialise logging")?;
    let config = config::get_config(&args).context("Failed to load configuration")?;

    info!("Starting with {:?}", config);

    let source = ArgoClient::new(&config.argo_base_url, &config.argo_token, config.verify_cert)
        .context("Failed to build Argo client")?;
    let store = CordraClient::new(
        &config.cordra_base_url,
        &config.cordra_user,
        &config.cordra_password,
        config.verify_cert,
    )
    .context("Failed to build Cordra client")?;

    let state = AppState::new(Arc::new(source), Arc::new(store))
        .with_options(IngestOptions {
            file_max_size: config.file_max_size,
        })
        .with_argo_namespace(config.argo_namespace.clone());

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    let tracker = state.tracker.clone();
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if !tracker.drain(DEFAULT_DRAIN_TIMEOUT).await {
        warn!("Interrupted ingests were rolled back");
    }
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

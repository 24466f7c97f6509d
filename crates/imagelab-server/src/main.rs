//! imagelab-server binary.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin imagelab-server -- [OPTIONS]
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use imagelab_server::{Config, logging, router, sweeper};
use imagelab_session::ImageLab;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    logging::init_logging(&config.log_filter);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.lab_settings();
    let lab = Arc::new(ImageLab::open(&settings)?);

    // Files left behind by a previous run belong to no live session.
    let purge = Arc::clone(&lab);
    let ttl = settings.session_ttl;
    match tokio::task::spawn_blocking(move || purge.purge_stale_files(ttl)).await? {
        Ok(removed) => info!(removed, "startup purge finished"),
        Err(err) => warn!(error = %err, "startup purge failed"),
    }

    let sweep_task = sweeper::spawn(Arc::clone(&lab), config.sweep_interval(), ttl);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(lab))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_task.abort();
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

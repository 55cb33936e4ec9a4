use anyhow::anyhow;
use blocksim::{api::Server, config::Config, scheduler::Scheduler};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tokio::time::{Duration, timeout};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*};

/// How long in-flight requests get to finish once shutdown starts
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "blocksim")]
#[command(about = "Groups submitted key/value transactions into chain-linked blocks on disk", long_about = None)]
struct Cli {
    /// Config file name
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,
}

/// The main entry point for the simulator.
///
/// Loads the configuration, initializes logging, starts the scheduler and
/// serves the HTTP API until Ctrl+C or SIGTERM. The scheduler is closed
/// only after the server has stopped handing it transactions, so the final
/// block contains everything that was acknowledged.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    // Logging goes first since every other component uses it
    tracing_subscriber::registry()
        .with(config.logging.env_filter()?)
        .with(fmt::layer())
        .init();
    info!(?config, "Simulator starting");

    config.batch.check_flush_file()?;

    let scheduler = Scheduler::start(&config.batch)?;
    let server = match Server::bind(&config.api, scheduler.input()).await {
        Ok(server) => server,
        Err(e) => {
            scheduler.close().await?;
            return Err(e);
        }
    };

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server_task = tokio::spawn(server.serve(async {
        let _ = stop_rx.await;
    }));

    let stopped_early = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut server_task => Some(result),
    };

    let outcome = match stopped_early {
        Some(result) => match flatten(result) {
            Ok(()) => Err(anyhow!("API server stopped unexpectedly")),
            Err(e) => Err(e.context("API server failed")),
        },
        None => {
            info!("Shutdown with timeout: {:?}", SHUTDOWN_TIMEOUT);
            let _ = stop_tx.send(());
            match timeout(SHUTDOWN_TIMEOUT, &mut server_task).await {
                Ok(result) => match flatten(result) {
                    Ok(()) => info!("Server stopped"),
                    Err(e) => error!(error = %e, "Server stopped with error"),
                },
                Err(_) => {
                    warn!("Server did not stop in time, aborting open connections");
                    server_task.abort();
                }
            }
            Ok(())
        }
    };

    // Close the scheduler after the server stopped feeding it
    scheduler.close().await?;

    outcome
}

fn flatten(result: Result<anyhow::Result<()>, JoinError>) -> anyhow::Result<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(e.into()),
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Interrupt received"),
        _ = terminate => info!("SIGTERM received"),
    }
}

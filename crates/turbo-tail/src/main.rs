//! turbo-tail - live JSON log viewer
//!
//! Reads log lines from stdin, echoes them to stdout and serves them to
//! browser viewers over WebSocket.

use std::io;
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::Parser;
use tail_stream::{StreamCoordinator, StreamError, StreamServer};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use turbo_tail::{Cli, IngestStats, run_ingest};

const DEFAULT_LOG_FILTER: &str = "turbo_tail=info,tail_stream=info,tail_logs=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Stdout carries the echoed input, so diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.stream_config();
    let addr = config.bind_addr;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| StreamError::BindFailed(addr, e))?;

    let server = StreamServer::new(config);
    let input_closed = spawn_ingest(server.coordinator())?;

    info!(
        addr = %addr,
        max_logs = cli.max_logs,
        keep_alive = cli.keep_alive,
        "turbo-tail started"
    );

    tokio::select! {
        result = server.serve_listener(listener, shutdown_signal()) => result?,
        stats = input_closed, if !cli.keep_alive => {
            stats.context("ingestion thread stopped unexpectedly")?;
            info!("Input closed, exiting");
        }
    }

    Ok(())
}

/// Runs the stdin loop on a detached thread, outside the runtime's blocking
/// pool, so a read parked on an open stdin never delays shutdown.
fn spawn_ingest(
    coordinator: Arc<StreamCoordinator>,
) -> anyhow::Result<oneshot::Receiver<IngestStats>> {
    let (done_tx, done_rx) = oneshot::channel();

    thread::Builder::new()
        .name("stdin-ingest".to_string())
        .spawn(move || {
            let stats = run_ingest(io::stdin().lock(), io::stdout().lock(), &coordinator);
            info!(
                lines = stats.lines,
                ingested = stats.ingested,
                passed_through = stats.passed_through,
                "Input ended"
            );
            let _ = done_tx.send(stats);
        })
        .context("failed to start ingestion thread")?;

    Ok(done_rx)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    } else {
        std::future::pending::<()>().await;
    }
}

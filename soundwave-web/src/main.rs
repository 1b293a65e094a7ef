//! Soundwave Web (soundwave-web) - Main entry point
//!
//! Captures audio, converts each block into wave and spectrum frames and
//! streams them to browsers over Server-Sent Events.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundwave_web::api::{self, AppContext};
use soundwave_web::config::{Config, Overrides};
use soundwave_web::pipeline::Pipeline;
use soundwave_web::source;
use soundwave_web::SharedState;

/// Command-line arguments for soundwave-web
#[derive(Parser, Debug)]
#[command(name = "soundwave-web")]
#[command(about = "Real-time audio spectrum hub")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "SOUNDWAVE_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref(), &args.overrides)
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting soundwave-web v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Source: {}, {} Hz, {}, {} ms blocks",
        config.source, config.sample_rate, config.bit_depth, config.buffer_ms
    );

    let config = Arc::new(config);
    let state = Arc::new(SharedState::new(config.send_timeout()));

    // Source -> bounded block queue -> pipeline
    let (block_tx, block_rx) = source::block_channel(config.block_queue, Arc::clone(&state.stats));
    let running_source = source::start(&config, block_tx).context("Failed to start audio source")?;
    let bit_depth = running_source.bit_depth();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = Pipeline::new(bit_depth, state.broadcaster.clone(), Arc::clone(&state.stats));
    let pipeline_task = tokio::spawn(pipeline.run(block_rx, shutdown_rx.clone()));

    let ctx = AppContext {
        state: Arc::clone(&state),
        config: Arc::clone(&config),
        bit_depth,
    };
    let router = api::build_router(ctx);

    // Closing the registry ends every open SSE stream and refuses new ones,
    // so graceful shutdown does not wait on them
    let registry = Arc::clone(&state.registry);
    let mut server_shutdown = shutdown_rx;
    let server_stop = async move {
        let _ = server_shutdown.wait_for(|stop| *stop).await;
        let dropped = registry.close().await;
        info!("Disconnected {} subscribers", dropped);
    };

    let mut server = tokio::spawn(api::run(config.socket_addr(), router, server_stop));

    tokio::select! {
        _ = shutdown_signal() => {}
        joined = &mut server => {
            // Server exited on its own (bind failure)
            let _ = shutdown_tx.send(true);
            running_source.stop().await;
            return flatten(joined);
        }
    }

    let _ = shutdown_tx.send(true);
    running_source.stop().await;

    if let Err(e) = pipeline_task.await {
        warn!("Pipeline task failed: {}", e);
    }
    flatten(server.await)?;

    info!("Shutdown complete");
    Ok(())
}

fn flatten(joined: std::result::Result<soundwave_web::Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined
        .context("HTTP server task panicked")?
        .context("HTTP server error")
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

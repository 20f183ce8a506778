//! minivgg-train - MiniVGGNet training microservice
//!
//! Accepts training requests naming a directory-labeled image dataset,
//! trains a MiniVGGNet classifier on it, scores the model and persists it
//! as `<output_dir>/<taskId>.mpk`.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use minivgg_common::config::{self, OutputDirResolver};
use minivgg_train::pipeline::TrainingPipeline;
use minivgg_train::AppState;

/// Command-line arguments for minivgg-train
#[derive(Parser, Debug)]
#[command(name = "minivgg-train")]
#[command(about = "MiniVGGNet image classifier training microservice")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "MINIVGG_PORT")]
    port: Option<u16>,

    /// Directory trained models are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen on all interfaces instead of localhost only
    #[arg(long)]
    public: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);
    let toml_config =
        config::load_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting minivgg-train (MiniVGGNet training) microservice");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: compiled defaults"),
    }

    let output_dir = OutputDirResolver::new(args.output_dir).resolve(&toml_config);
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        // Persistence reports the failure per job
        warn!("Cannot create output directory {}: {}", output_dir.display(), e);
    }
    info!("Output directory: {}", output_dir.display());

    let settings = toml_config.training.clone();
    info!(
        image_size = settings.image_size,
        channels = settings.channels,
        epochs = settings.epochs,
        batch_size = settings.batch_size,
        seed = settings.seed,
        random_seed = settings.random_seed,
        "Training settings"
    );

    let pipeline =
        TrainingPipeline::new(output_dir, settings).context("Invalid training settings")?;
    let state = AppState::new(pipeline);
    let app = minivgg_train::build_router(state);

    let port = config::resolve_port(args.port, &toml_config);
    let host = if args.public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
    let addr = SocketAddr::from((host, port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

//! # Webled Server
//!
//! Starts the orchestrator, the media library and the HTTP control surface.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use webled::config::ConfigManager;
use webled::library::{CommandMediaProbe, Librarian};
use webled::logging::init_structured_logging;
use webled::orchestration::{CommandJobAction, CompletionCallback, Overlord};
use webled::web::{create_app, AppState};

#[derive(Parser)]
#[command(name = "webled")]
#[command(about = "Media appliance work orchestrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment overlay to load (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let manager = match cli.environment {
        Some(env) => ConfigManager::load_from_directory_with_env(cli.config_dir, &env),
        None => ConfigManager::load_from_directory(cli.config_dir),
    }
    .context("loading configuration")?;

    let config = manager.config().clone();
    info!(
        environment = manager.environment(),
        workers = config.scheduler.worker_count,
        "Starting webled"
    );

    let action = Arc::new(CommandJobAction::new(config.actions.clone()));
    let overlord = Arc::new(Overlord::start(&config, action).context("starting orchestrator")?);

    let librarian = Arc::new(Librarian::new(
        config.library.clone(),
        overlord.clone(),
        Arc::new(CommandMediaProbe::new(config.actions.downloader.clone())),
    ));
    librarian.start().await.context("preparing library directories")?;

    // Playback is handled by the display service; log availability only
    let on_ready: CompletionCallback = Arc::new(|title, path| {
        info!(title = %title, path = %path.display(), "Media ready for playback");
    });

    let app = create_app(AppState::new(overlord.clone(), librarian, on_ready));
    let listener = tokio::net::TcpListener::bind(&config.web.bind_address)
        .await
        .with_context(|| format!("binding {}", config.web.bind_address))?;
    info!(address = %config.web.bind_address, "Listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Could not listen for shutdown signal");
            }
        })
        .await;

    overlord.shutdown().await;
    served.context("serving HTTP")?;
    Ok(())
}

//! litrev-server - Literature review backend
//!
//! Serves the project, phase, batch, article and note API, runs AI
//! translation and preclassification jobs, and streams change events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use litrev_common::config::{self, RootFolderInitializer, RootFolderResolver};
use litrev_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use litrev_server::services::{job_tracker, LanguageModel, OpenAiClient};
use litrev_server::AppState;

const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

/// Command-line arguments for litrev-server
#[derive(Parser, Debug)]
#[command(name = "litrev-server")]
#[command(about = "Collaborative literature review backend")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "LITREV_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = "LITREV_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(short, long, env = "LITREV_BIND")]
    bind: Option<String>,

    /// Log filter when RUST_LOG is unset (overrides config)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (toml_config, config_source) = config::load_or_default(args.config.as_deref());

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("litrev_server={level},litrev_common={level},tower_http=info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting litrev-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    config_source.log();

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&toml_config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = litrev_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let event_bus = EventBus::new(toml_config.jobs.event_capacity);

    let recovered = job_tracker::recover_interrupted_jobs(&db, &event_bus)
        .await
        .context("Failed to recover interrupted jobs")?;
    if recovered > 0 {
        warn!("Marked {} interrupted job(s) as failed", recovered);
    }

    let ai: Option<Arc<dyn LanguageModel>> = match toml_config.resolve_ai_api_key() {
        Some(key) => {
            let client = OpenAiClient::new(&toml_config.ai, key).context("Failed to build AI client")?;
            info!("AI client ready (model {})", toml_config.ai.model);
            Some(Arc::new(client))
        }
        None => {
            warn!("No AI API key configured; translation and preclassification are disabled");
            None
        }
    };

    let bind = args
        .bind
        .clone()
        .unwrap_or_else(|| toml_config.bind_address().to_string());

    let state = AppState::new(db, event_bus, toml_config, ai);

    let limiter = state.signup_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let app = litrev_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);

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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

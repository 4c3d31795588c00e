//! livescan-agent - local fingerprint capture agent
//!
//! Serves the capture HTTP API and SSE notifications for a four-finger slap
//! scanner on the capture workstation. Templates for 1:N identification are
//! read from the remote template repository.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livescan_agent::capability::Scanner;
use livescan_agent::config::{AgentConfig, ConfigOverrides};
use livescan_agent::flows::FlowContext;
use livescan_agent::services::HttpTemplateRepository;
use livescan_agent::session::Session;
use livescan_agent::AppState;
use livescan_common::events::EventBus;

/// Command-line arguments for livescan-agent
#[derive(Parser, Debug)]
#[command(name = "livescan-agent")]
#[command(about = "Local fingerprint capture agent")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "LIVESCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "LIVESCAN_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LIVESCAN_PORT")]
    port: Option<u16>,

    /// Base URL of the template repository API
    #[arg(long, env = "LIVESCAN_REPOSITORY_URL")]
    repository_url: Option<String>,

    /// Run against the scripted scanner instead of the vendor SDK
    #[arg(long, env = "LIVESCAN_SIMULATE")]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = livescan_common::config::resolve_config_path(args.config.as_deref());
    let toml_config = livescan_common::config::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    let config = AgentConfig::resolve(
        toml_config,
        ConfigOverrides {
            host: args.host,
            port: args.port,
            repository_url: args.repository_url,
        },
    );

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "livescan_agent={level},livescan_common={level},tower_http={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting livescan-agent"
    );
    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => warn!("Config file {} not found, using defaults", path.display()),
        None => warn!("No config file location, using defaults"),
    }

    let scanner = select_scanner(args.simulate);
    let repository = Arc::new(
        HttpTemplateRepository::new(&config.repository_url, config.repository_timeout)
            .context("Failed to create template repository client")?,
    );
    info!("Template repository: {}", repository.endpoint());

    let event_bus = EventBus::new(256);
    let session = Arc::new(Session::new(config.initial_settings));
    let flows = FlowContext::new(session, scanner, repository, event_bus, config.flow);

    let app = livescan_agent::build_router(AppState::new(flows));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Event stream: http://{}/events", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "vendor-sdk")]
fn select_scanner(simulate: bool) -> Arc<dyn Scanner> {
    if simulate {
        info!("Simulated scanner selected");
        Arc::new(livescan_agent::capability::simulated::SimulatedScanner::demo())
    } else {
        info!("Vendor SDK scanner selected");
        Arc::new(livescan_agent::capability::vendor::VendorScanner::new())
    }
}

#[cfg(not(feature = "vendor-sdk"))]
fn select_scanner(simulate: bool) -> Arc<dyn Scanner> {
    if !simulate {
        warn!("Built without the vendor-sdk feature, using the simulated scanner");
    }
    Arc::new(livescan_agent::capability::simulated::SimulatedScanner::demo())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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

//! Gatekeeper Server
//!
//! Serves the gatekeeper dialogue over HTTP so a browser client can play
//! without holding provider credentials:
//! - `POST /api/session` starts a dialogue
//! - `POST /api/session/{id}/message` sends the next user line
//! - `GET /api/session/{id}/events?timeout=5` long-polls for events
//!
//! Usage:
//! ```bash
//! GEMINI_API_KEY=... SECRET_CODE=... gatekeeper-server
//! GEMINI_API_KEY=... SECRET_CODE=... gatekeeper-server --config gatekeeper.yaml
//!
//! # Play in the terminal instead
//! GEMINI_API_KEY=... SECRET_CODE=... gatekeeper-server chat
//!
//! # List models the key can use
//! GEMINI_API_KEY=... gatekeeper-server models
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use gatekeeper_egress::openai::OpenAIConnector;
use gatekeeper_observability::Metrics;
use gatekeeper_server::{
    app::{build_manager, build_model, build_router, connector_config},
    config::{LoggingConfig, ServerConfig},
    console::run_console,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{io::BufReader, net::TcpListener};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Gatekeeper - make the unhelpful assistant say yes
#[derive(Parser)]
#[command(name = "gatekeeper-server")]
#[command(about = "HTTP backend for the gatekeeper dialogue game", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "GATEKEEPER_CONFIG",
        global = true
    )]
    config: Option<String>,

    /// Address to bind
    #[arg(long, value_name = "HOST", global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT", global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default if no command specified)
    Serve,
    /// Play one dialogue in the terminal
    Chat,
    /// List models available to the configured API key
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    // Environment overrides the file, CLI flags override both
    config.merge_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    init_tracing(&config.logging)?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path);
    }

    match cli.command {
        Some(Commands::Models) => list_models(&config).await,
        Some(Commands::Chat) => chat(&config).await,
        Some(Commands::Serve) | None => serve(config).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(logging.level.to_lowercase()),
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let model = build_model(&config)?;
    let manager = build_manager(&config, model, metrics.clone())?;

    let shutdown = CancellationToken::new();
    let reaper = manager.spawn_reaper(shutdown.clone());

    let app = build_router(manager.clone(), metrics, &config.api_prefix);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;

    let api_base = format!("http://{}{}", addr, config.api_prefix.trim_end_matches('/'));
    info!("Gatekeeper listening on http://{}", addr);
    info!("   Model: {} via {}", config.provider.model, config.provider.base_url);
    info!("   Sessions:");
    info!("   - Create:  POST {}/session", api_base);
    info!("   - Message: POST {}/session/{{id}}/message", api_base);
    info!("   - Events:  GET  {}/session/{{id}}/events?timeout=5", api_base);
    info!("   Observability:");
    info!("   - Health check:       http://{}/healthz", addr);
    info!("   - Readiness check:    http://{}/readyz", addr);
    info!("   - Prometheus metrics: http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Some(reaper) = reaper
        && let Err(e) = reaper.await
    {
        warn!("Idle session reaper did not stop cleanly: {}", e);
    }
    manager.dispose_all();
    info!(sessions = manager.count(), "Server stopped");

    Ok(())
}

async fn chat(config: &ServerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
    let manager = build_manager(config, build_model(config)?, metrics)?;
    let session = manager.create_session().await?;

    let mut stdout = tokio::io::stdout();
    let outcome = run_console(session, BufReader::new(tokio::io::stdin()), &mut stdout).await?;

    if !outcome.secret_unlocked {
        println!("\nThe gatekeeper kept its secret.");
    }
    Ok(())
}

async fn list_models(config: &ServerConfig) -> anyhow::Result<()> {
    let connector = OpenAIConnector::new(connector_config(config)?)?;
    let models = connector.list_models().await?;

    for model in models {
        match model.owned_by {
            Some(owner) => println!("{} ({})", model.id, owner),
            None => println!("{}", model.id),
        }
    }
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

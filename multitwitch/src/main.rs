//! multitwitch server

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use multitwitch::{config::AppConfig, observability, state::AppState};

/// Sign in with Twitch and browse the channels you follow
#[derive(Debug, Parser)]
#[command(name = "multitwitch", version, about)]
struct Args {
    /// Configuration file (defaults to ./multitwitch.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding `server.bind_addr`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }

    observability::init(&config.logging)?;

    // Refuse to serve without usable provider credentials
    config.validate()?;

    let bind_addr = config.server.bind_addr.clone();
    let state = AppState::new(config)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, multitwitch::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

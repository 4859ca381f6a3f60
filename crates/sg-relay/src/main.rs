//! shellgate relay daemon
//!
//! Serves browser terminals over WebSocket and relays each one to an SSH
//! shell on the freshly provisioned host named in the request.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sg_core::config::{self, Config, Credential, HostKeyPolicy};
use sg_relay::server::{self, AppState};
use sg_relay::ssh::SshShell;

#[derive(Parser)]
#[command(name = "shellgate")]
#[command(about = "shellgate - browser terminal relay for provisioned hosts")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("shellgate starting...");

    let config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                Config::default()
            })
        } else {
            tracing::info!("Using default configuration");
            Config::default()
        }
    };
    config.validate().context("Invalid configuration")?;

    // Fail at startup rather than on the first session
    let mut shell = SshShell::new(&config.ssh);
    if let Credential::PrivateKey { .. } = &config.ssh.credential {
        shell
            .preload_key(&config.ssh.credential)
            .context("Failed to load the service account key")?;
    }

    if config.ssh.host_key_policy == HostKeyPolicy::TrustAlways {
        tracing::warn!(
            "Host key policy is trust-always: target host keys are accepted without verification"
        );
    }

    let bind_addr = args.bind.unwrap_or_else(|| config.bind_address.clone());
    let state = AppState::new(&config, Arc::new(shell));

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!(
        "Relaying shells as '{}' with a {}x{} {} terminal, listening on {}",
        config.ssh.username,
        config.terminal.columns,
        config.terminal.rows,
        config.terminal.term_type,
        bind_addr
    );

    server::serve(listener, state, cancel)
        .await
        .context("HTTP server failed")?;

    tracing::info!("shellgate shutdown complete");
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
async fn shutdown_on_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cancel.cancel();
}

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use certreg_server::AppState;
use certreg_shared::config::load_config;

#[derive(Parser)]
#[command(name = "certreg-server")]
#[command(version)]
#[command(about = "Auth and account API for the certificate registration system", long_about = None)]
struct Args {
    /// The config file
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;
    let addr = config.server.addr();
    let max_connections = config.server.max_connections;

    let state = AppState::initialize(config).await?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    #[cfg(unix)]
    tokio::spawn(reload_on_sighup(args.config.clone(), state.config.clone()));

    tokio::select! {
        result = certreg_server::serve(listener, state, max_connections) => {
            result.context("Server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server closed");
    Ok(())
}

/// Re-read the config file on SIGHUP. Token expiry and CORS origins take
/// effect immediately; the bind address, database and signing secret need
/// a restart.
#[cfg(unix)]
async fn reload_on_sighup(path: String, live: certreg_shared::config::LiveConfig) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to register SIGHUP handler: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("SIGHUP received, reloading {}", path);
        match load_config(&path) {
            Ok(new) => {
                let secret_changed =
                    new.auth.resolved_jwt_secret() != live.read().await.auth.resolved_jwt_secret();
                if secret_changed {
                    warn!("jwt_secret changed on disk; restart to apply it");
                }
                live.reload(new).await;
                info!("Configuration reloaded");
            }
            Err(e) => error!("Reload failed, keeping current config: {}", e),
        }
    }
}

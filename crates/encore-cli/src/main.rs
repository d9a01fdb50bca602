// SPDX-License-Identifier: GPL-3.0-or-later
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::serve;
use encore_api::router;
use encore_application::AppState;
use encore_config::{load as load_config, HttpConfig, TelemetryConfig};
use encore_infrastructure::open_library_store;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_ENV: &str = "ENCORE_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = load_config(config_path.as_deref())?;
    init_tracing(&config.telemetry);
    if let Some(path) = &config_path {
        info!(target: "cli", path = %path.display(), "using configuration file");
    }

    let store = open_library_store(&config).await?;
    let addr = bind_addr(&config.http)?;
    let state = AppState::from_config(config, store)?;
    state.on_start();

    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    info!(target: "cli", "listening on {}", addr);

    serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// The command line argument wins over the environment.
fn config_path(arg: Option<String>, env: Option<String>) -> Option<PathBuf> {
    arg.or(env)
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

fn env_filter(telemetry: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let registry = tracing_subscriber::registry().with(env_filter(telemetry));
    if telemetry.json {
        registry
            .with(fmt::layer().json().with_target(true).with_level(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_names(true).with_level(true))
            .init();
    }
}

fn bind_addr(http: &HttpConfig) -> Result<SocketAddr> {
    let addr = format!("{}:{}", http.host, http.port);
    addr.parse::<SocketAddr>()
        .with_context(|| format!("invalid listen address {addr}"))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => {},
                    _ = terminate.recv() => {},
                }
            }
            _ => {
                warn!(target: "cli", "unix signal handlers unavailable, falling back to ctrl-c");
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(target: "cli", error = %err, "ctrl-c handler failed");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target: "cli", error = %err, "ctrl-c handler failed");
        }
    }

    info!(target: "cli", "shutdown signal received");
}

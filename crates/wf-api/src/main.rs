//! # wf-api: Binary Entry Point
//!
//! Loads and validates settings, registers services, assembles the request
//! pipeline and serves it until Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use wf_api::state::AppState;
use wf_core::{HostEnvironment, Settings};

/// Weather Forecast API host.
#[derive(Parser, Debug)]
#[command(name = "wf-api", version, about, long_about = None)]
struct Cli {
    /// Hosting environment; selects `appsettings.{Environment}.json`.
    #[arg(long, env = "APP_ENVIRONMENT", default_value = "Production")]
    environment: String,

    /// Directory holding `appsettings*.json`.
    #[arg(long, env = "APP_CONTENT_ROOT", default_value = ".")]
    content_root: PathBuf,

    /// Listen port; overrides `Server:Port`.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log filter directives, e.g. `info,wf_auth=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat, directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format, &cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    wf_auth::metrics::describe_auth_metrics();

    let environment = HostEnvironment::from_name(&cli.environment);
    tracing::info!(
        environment = %environment,
        content_root = %cli.content_root.display(),
        "loading settings"
    );
    let mut settings = Settings::load(&cli.content_root, &environment)
        .context("invalid configuration")?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    let port = settings.server.port;

    let state = AppState::bootstrap(settings, environment).context("service registration failed")?;
    let app = wf_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    tracing::info!(%addr, "Weather Forecast API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
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
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}

//! Signbridge Daemon
//!
//! Receives alert webhooks and drives LED signs over the vendor control
//! protocol: switch to an emergency program, hold for the requested
//! duration, restore the original program.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use signbridge_daemon::overrides::{Orchestrator, OverrideRegistry};
use signbridge_daemon::server::{AppState, Dispatcher, build_router};

#[derive(Parser, Debug)]
#[command(name = "signbridge-daemon")]
#[command(version, about = "Signbridge daemon - LED sign override gateway")]
struct Args {
    /// HTTP listen address for the webhook gateway
    #[arg(long, default_value = "127.0.0.1:8090", env = "SIGNBRIDGE_ADDR")]
    addr: SocketAddr,

    /// Configuration file path (defaults to the per-user config dir)
    #[arg(long, env = "SIGNBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter for the daemon (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "SIGNBRIDGE_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "SIGNBRIDGE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = format!("signbridge_daemon={}", args.log_level);
    signbridge_core::tracing_init::init_tracing(&log_filter, args.log_json);

    let config = Arc::new(signbridge_core::config::load_config(args.config.as_deref())?);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        signs = config.signs.len(),
        message_types = config.message_types.len(),
        "Starting signbridge-daemon"
    );
    if config.signs.is_empty() {
        warn!("No signs configured; all override requests will be rejected");
    }

    let registry = Arc::new(OverrideRegistry::new());
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&config), Arc::clone(&registry)));
    let dispatcher = Arc::new(Dispatcher::new(orchestrator, config.gateway.queue_depth));

    let app = build_router(AppState {
        config,
        dispatcher,
        registry,
    });
    let listener = tokio::net::TcpListener::bind(args.addr).await?;

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    // Notify systemd that the daemon is ready to serve (unix only).
    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    info!(addr = %args.addr, "Webhook gateway ready");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    info!("Daemon stopped");
    Ok(())
}

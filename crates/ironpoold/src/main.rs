//! ironpoold — the Ironpool daemon.
//!
//! Single binary that assembles the bare-metal control loop:
//! - State store (redb)
//! - Power controller (Wake-on-LAN boot, SSH shutdown)
//! - Node lifecycle service
//! - Cluster watcher (orchestrator readiness stream)
//! - Pool autoscaler
//! - REST API
//!
//! # Usage
//!
//! ```text
//! ironpoold run --port 8440 --data-dir /var/lib/ironpool --watch-addr 10.0.0.1:6440
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use ironpool_autoscale::PoolScaler;
use ironpool_lifecycle::NodeLifecycle;
use ironpool_power::{PowerConfig, PowerController, SshConfig};
use ironpool_watch::{HttpNodeSource, NodeWatcher, WatcherConfig};

use ironpoold::{api, reconcile};

#[derive(Parser)]
#[command(name = "ironpoold", about = "Ironpool daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop and API server.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Port the REST API listens on.
    #[arg(long, default_value = "8440")]
    port: u16,

    /// Data directory for persistent state.
    #[arg(long, default_value = "/var/lib/ironpool")]
    data_dir: PathBuf,

    /// Orchestrator watch endpoint (host:port).
    #[arg(long)]
    watch_addr: String,

    /// Path of the orchestrator's node watch stream.
    #[arg(long, default_value = "/v1/nodes/watch")]
    watch_path: String,

    /// Seconds between watch reconnect attempts.
    #[arg(long, default_value = "3")]
    reconnect_backoff: u64,

    /// Destination for Wake-on-LAN magic packets.
    #[arg(long, default_value = "255.255.255.255:9")]
    wol_target: SocketAddr,

    /// User for remote shutdown sessions.
    #[arg(long, default_value = "ironpool")]
    ssh_user: String,

    /// Private key for remote shutdown sessions.
    #[arg(long)]
    ssh_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ironpoold=debug,ironpool=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    info!("Ironpool daemon starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&args.data_dir)?;
    let db_path = args.data_dir.join("ironpool.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let state = ironpool_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let power = Arc::new(PowerController::new(PowerConfig {
        wol_target: args.wol_target,
        ssh: SshConfig {
            username: args.ssh_user,
            key_path: args.ssh_key,
            ..SshConfig::default()
        },
        ..PowerConfig::default()
    }));
    info!(wol_target = %args.wol_target, "power controller initialized");

    let lifecycle = NodeLifecycle::new(state.clone());
    info!("lifecycle service initialized");

    let scaler = PoolScaler::new(state.clone(), lifecycle.clone(), power);
    info!("pool autoscaler initialized");

    let watcher = NodeWatcher::new(
        Arc::new(HttpNodeSource::new(
            args.watch_addr.clone(),
            args.watch_path.clone(),
        )),
        WatcherConfig {
            reconnect_backoff: Duration::from_secs(args.reconnect_backoff),
            ..WatcherConfig::default()
        },
    );
    info!(addr = %args.watch_addr, path = %args.watch_path, "cluster watcher initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let (events, watcher_handle) = watcher.start(shutdown_rx.clone());
    let reconcile_handle = reconcile::spawn(lifecycle.clone(), events, shutdown_rx);

    // ── Start API server ───────────────────────────────────────

    let router = api::build_router(state, lifecycle, scaler);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = watcher_handle.await;
    let _ = reconcile_handle.await;

    info!("Ironpool daemon stopped");
    Ok(())
}

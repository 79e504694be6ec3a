use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use harness_common::{SupervisorConfig, SystemEnvironment, DEFAULT_MAX_ATTEMPTS};
use harness_control::ControlPlaneProxy;
use harness_supervisor::ServerSupervisor;

/// Control-plane proxy: drives a managed test server's lifecycle over HTTP
/// for clients that cannot spawn processes themselves.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the managed server's own HTTP API
    #[arg(long, default_value = "http://127.0.0.1:8888/v1")]
    server_url: String,

    /// Executable to spawn (bare name resolved through PATH); defaults to
    /// the TEST_SERVER_EXECUTABLE environment variable, then "serve"
    #[arg(long)]
    executable: Option<String>,

    /// Configuration file handed to the executable
    #[arg(long)]
    config: String,

    /// Readiness polling attempt ceiling
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Port the control plane listens on
    #[arg(short, long, default_value_t = 8899)]
    port: u16,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug);

    let executable = args
        .executable
        .unwrap_or_else(|| SupervisorConfig::executable_from_env(&SystemEnvironment));
    let config = SupervisorConfig::new(&args.server_url, &executable, &args.config)
        .with_max_attempts(args.max_attempts);
    let supervisor = ServerSupervisor::new(config);

    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let proxy = ControlPlaneProxy::bind(supervisor, addr).await?;
    info!(addr = %proxy.local_addr(), server_url = %args.server_url, "control plane ready");

    shutdown_signal().await;

    info!("shutting down, sweeping managed processes");
    proxy.shutdown().await?;
    Ok(())
}

fn initialize_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }
}

//! Gateway bootstrap: observability, configuration, listener, shutdown.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use hrdss_gateway::config::GatewayConfig;
use hrdss_gateway::rate_limit::{PerKeyRateLimiter, RateLimit, RateLimiterConfig};
use hrdss_gateway::server;
use hrdss_gateway::service::Gateway;

/// Listener configuration for the gateway binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0", env = "GATEWAY_BIND")]
    bind: String,

    /// Listen port
    #[arg(short, long, default_value_t = 8787, env = "GATEWAY_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Non-blocking writer so logging never stalls the runtime. The guard
    // must be held for the lifetime of the program to ensure logs are
    // flushed.
    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .json()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = GatewayConfig::from_env().unwrap_or_else(|e| {
        error!(reason = %e, "Invalid configuration, refusing to start");
        std::process::exit(1);
    });

    let shutdown = CancellationToken::new();

    let limiter: Option<Arc<dyn RateLimit>> = match RateLimiterConfig::from_env() {
        Some(limiter_config) => {
            let limiter = Arc::new(PerKeyRateLimiter::new(limiter_config));
            limiter.spawn_cleanup_task(shutdown.clone());
            Some(limiter)
        }
        None => {
            info!("No rate limiter configured, gate is open");
            None
        }
    };
    let rate_limited = limiter.is_some();

    let gateway = Gateway::new(Arc::new(config.clone()), limiter)?;
    let log_tasks = gateway.log_tasks().clone();

    setup_signal_handlers(shutdown.clone());

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        backend_url = %config.backend_url,
        environment = %config.environment,
        allowed_origins = %config.allowed_origins,
        rate_limited,
        backend_timeout_secs = config.backend_timeout.map(|t| t.as_secs()),
        "HR-DSS gateway starting"
    );

    server::serve(listener, gateway, shutdown).await?;

    // Let pending access log entries reach the sink before exit.
    log_tasks.close();
    log_tasks.wait().await;

    info!("Shutdown complete");
    Ok(())
}

/// Setup signal handlers for graceful shutdown.
///
/// - SIGINT (Ctrl+C): begin graceful shutdown
/// - SIGTERM: begin graceful shutdown
fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_sigint = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                shutdown_sigint.cancel();
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGINT");
            }
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, initiating graceful shutdown");
                    shutdown.cancel();
                }
                Err(e) => {
                    error!(error = %e, "Failed to listen for SIGTERM");
                }
            }
        });
    }

    // Prevent unused variable warning on non-Unix
    #[cfg(not(unix))]
    let _ = shutdown;
}

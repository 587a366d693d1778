use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use trust_oracle::{
    api::{AnalysisApiState, SecurityMiddlewareConfig, SecurityState, build_app},
    build_services,
    config::{OracleConfig, mask_secret},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates all security requirements
    let config = OracleConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check TRUST_ORACLE_* environment variables.");
        e
    })?;

    init_secure_logging(&config)?;

    info!("Starting trust oracle");
    info!(
        require_https = config.security.require_https,
        auth = config.security.enable_auth,
        api_keys = ?config.security.api_keys.iter().map(|k| mask_secret(k)).collect::<Vec<_>>(),
        "Security settings"
    );

    let services = build_services(&config).context("Failed to build pipeline")?;

    let shutdown = CancellationToken::new();
    let state = AnalysisApiState::new(services, shutdown.clone());
    let security_state = SecurityState::new(SecurityMiddlewareConfig::from_oracle_config(&config));

    // Expired rate-limit windows and old submission records
    let limiter = security_state.rate_limiter.clone();
    let pipeline = state.pipeline.clone();
    let retention = config.record_retention();
    let sweeper_stop = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = sweeper_stop.cancelled() => break,
                _ = ticker.tick() => {
                    limiter.cleanup();
                    let pruned = pipeline.coordinator().prune_settled(retention).await;
                    if pruned > 0 {
                        info!(pruned, "Pruned settled submission records");
                    }
                }
            }
        }
    });

    let app = build_app(state, security_state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Trust oracle listening on {}", bind_addr);
    info!(
        "Security middleware: Auth={}, Rate limit={}/min, Max body={}KB",
        config.security.enable_auth,
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    info!("Trust oracle stopped");
    Ok(())
}

/// Resolves on Ctrl-C. Cancels analyses that have not reached submission;
/// submissions already sent are left to settle.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return std::future::pending().await;
    }
    info!("Shutdown requested");
    shutdown.cancel();
}

/// Initialize logging at the configured level
fn init_secure_logging(config: &OracleConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Logging initialized with secret masking enabled");
    }

    Ok(())
}

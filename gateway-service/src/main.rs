use gateway_service::{
    build_router,
    config::GatewayConfig,
    policy::PolicyGate,
    services::{DeviceRegistry, FixedWindowLimiter, JwksIdentityProvider, LoggingContactSink},
    AppState,
};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

/// How often elapsed rate-limit buckets are swept out of memory.
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = GatewayConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    // Initialize metrics
    gateway_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting session and device access gateway"
    );

    let policy = PolicyGate::new(&config.policy);
    tracing::info!(
        domain_suffix = %config.policy.domain_suffix,
        allowed_accounts = config.policy.allowed_accounts.len(),
        "Organizational policy loaded"
    );

    let identity = Arc::new(JwksIdentityProvider::new(&config.identity)?);

    let limiter = Arc::new(FixedWindowLimiter::new(&config.rate_limit));
    tracing::info!("Rate limiters initialized: General, Auth, Contact, and Upload tiers");

    // Device-session and limiter state are process-local and in-memory:
    // a restart logs every device out and resets all throttling windows.
    let devices = Arc::new(DeviceRegistry::new());

    let state = AppState {
        config: config.clone(),
        policy,
        identity,
        limiter: limiter.clone(),
        devices,
        contact: Arc::new(LoggingContactSink),
    };

    // Periodic sweep so abandoned composite keys do not accumulate.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            limiter.evict_expired();
        }
    });

    // Build application router
    let app = build_router(state).await?;

    // Start server
    let addr = config.common.listen_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

//! TaskChat - Conversational todo-list backend
//!
//! Standalone task server with a REST API and a natural language chat
//! interface for managing todos.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::info;

use taskchat::auth;
use taskchat::config::ServerConfig;
use taskchat::handlers::{build_protected_routes, build_public_routes, AppServices};
use taskchat::metrics;
#[cfg(feature = "telemetry")]
use taskchat::tracing_setup;

// Shutdown budgets
const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30; // drain window before forced exit
const DATABASE_FLUSH_TIMEOUT_SECS: u64 = 10; // RocksDB flush inside that window

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().any(|a| a == "--help" || a == "-h") {
        taskchat::config::print_env_help();
        return Ok(());
    }

    // Initialize distributed tracing with OpenTelemetry (optional)
    #[cfg(feature = "telemetry")]
    {
        tracing_setup::init_tracing().expect("Failed to initialize tracing");
    }
    #[cfg(not(feature = "telemetry"))]
    {
        // Use simple console logging
        tracing_subscriber::fmt::init();
        info!("📝 Console logging initialized (telemetry disabled)");
    }

    // Register Prometheus metrics
    metrics::register_metrics().expect("Failed to register metrics");
    info!("📊 Metrics registered at /metrics");

    info!("✅ Starting TaskChat server...");

    // Load configuration from environment
    let server_config = ServerConfig::from_env();
    server_config.log();

    // Create application services with config
    info!("📁 Storage path: {:?}", server_config.storage_path);
    let services = Arc::new(AppServices::new(
        server_config.storage_path.clone(),
        server_config.clone(),
    )?);

    // Keep a reference for shutdown cleanup (clone BEFORE moving into router)
    let services_for_shutdown = Arc::clone(&services);

    // Configure rate limiting from config
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(server_config.rate_limit_per_second)
        .burst_size(server_config.rate_limit_burst)
        .finish()
        .expect("Failed to build governor rate limiter configuration");

    let governor_layer = GovernorLayer::new(governor_conf);

    info!(
        "⚡ Rate limit: {}/s with burst {}",
        server_config.rate_limit_per_second, server_config.rate_limit_burst
    );

    // Build CORS layer from configuration
    let cors = server_config.cors.to_layer();

    // Protected API routes - require authentication, rate limited.
    // Public routes (health, metrics) are NOT rate limited so monitoring
    // and Kubernetes probes always get through.
    let protected_routes = build_protected_routes(services.clone())
        .layer(axum::middleware::from_fn(auth::auth_middleware))
        .layer(governor_layer);

    let public_routes = build_public_routes(services.clone());

    let app = axum::Router::new()
        .merge(public_routes)
        .merge(protected_routes);

    // Conditionally add trace propagation middleware only when telemetry is enabled
    #[cfg(feature = "telemetry")]
    let app = app.layer(axum::middleware::from_fn(
        taskchat::tracing_setup::trace_propagation::propagate_trace_context,
    ));

    let max_concurrent = server_config.max_concurrent_requests;
    info!("🔄 Concurrency cap: {} in-flight requests", max_concurrent);

    // Global layers; rate limiting already sits on the protected group
    let app = app
        .layer(axum::middleware::from_fn(
            taskchat::middleware::track_metrics,
        ))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(cors);

    // Start server using host/port from config
    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port).parse()?;
    info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve until a shutdown signal arrives
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("🔒 Shutdown signal received, flushing databases...");

    // Cleanup runs under its own deadline
    let cleanup_future = async {
        let flush_future = async { services_for_shutdown.flush_all_databases() };

        match tokio::time::timeout(
            std::time::Duration::from_secs(DATABASE_FLUSH_TIMEOUT_SECS),
            flush_future,
        )
        .await
        {
            Ok(Ok(())) => info!("✅ Databases flushed successfully"),
            Ok(Err(e)) => tracing::error!("❌ Failed to flush databases: {}", e),
            Err(_) => tracing::error!(
                "⏱️  Database flush timed out after {}s",
                DATABASE_FLUSH_TIMEOUT_SECS
            ),
        }

        // Shutdown tracing and flush remaining spans (only with telemetry feature)
        #[cfg(feature = "telemetry")]
        tracing_setup::shutdown_tracing();
    };

    // A hung cleanup exits with an error instead of blocking forever
    match tokio::time::timeout(
        std::time::Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS),
        cleanup_future,
    )
    .await
    {
        Ok(()) => {
            info!("👋 Server shutdown complete");
        }
        Err(_) => {
            tracing::error!(
                "⏱️  Graceful shutdown timed out after {}s, forcing exit",
                GRACEFUL_SHUTDOWN_TIMEOUT_SECS
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Handle graceful shutdown
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received, starting graceful shutdown");
}

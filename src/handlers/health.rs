//! Health and Infrastructure Handlers
//!
//! Service banner, Kubernetes probes, and the Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::Json};

use crate::metrics;

use super::router::AppState;
use super::types::HealthResponse;

/// Service banner at the root path
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "taskchat",
        "message": "Todo API - Conversational Todo Management Backend",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    }))
}

/// Main health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tasks_count: state.task_store.count_tasks(),
        conversations_count: state.conversation_store.count_conversations(),
        llm_available: state.llm.available(),
    })
}

/// Liveness probe. Answers 200 whenever the process can still serve a
/// request at all.
pub async fn health_live() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Readiness probe. 503 until storage proves reachable, 200 after.
pub async fn health_ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    // A cheap point read proves the storage handles are alive.
    let storage_ok = state.audit_db.get(b"__readyz").is_ok();

    let status = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if storage_ok { "ready" } else { "not_ready" },
            "version": env!("CARGO_PKG_VERSION"),
            "llm_available": state.llm.available(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Text-format dump of the metrics registry for Prometheus scrapes.
pub async fn metrics_endpoint() -> Result<String, StatusCode> {
    use prometheus::Encoder;

    let mut buffer = Vec::new();
    prometheus::TextEncoder::new()
        .encode(&metrics::METRICS_REGISTRY.gather(), &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

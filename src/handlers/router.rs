//! Router Configuration - Centralized route definitions
//!
//! Builds the Axum router from the handler submodules. Routes are split into
//! public (no auth) and protected (auth required) groups.

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use super::state::AppServices;
use super::{chat, conversations, health, tasks};

/// Application state type alias
pub type AppState = Arc<AppServices>;

/// Routes that stay reachable without an API key: probes and scrapers
/// must never be locked out, and the banner is harmless.
pub fn build_public_routes(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // SERVICE BANNER
        // =================================================================
        .route("/", get(health::root))
        // =================================================================
        // HEALTH & KUBERNETES PROBES
        // =================================================================
        .route("/health", get(health::health))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        // =================================================================
        // METRICS (PROMETHEUS)
        // =================================================================
        .route("/metrics", get(health::metrics_endpoint))
        // =================================================================
        // STATE
        // =================================================================
        .with_state(state)
}

/// The API surface proper. Auth and rate limiting are layered on by the
/// caller, so this group stays testable without either.
pub fn build_protected_routes(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // TASKS
        // =================================================================
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/{task_id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/{task_id}/complete", patch(tasks::complete_task))
        // =================================================================
        // CHAT
        // =================================================================
        .route("/api/chat", post(chat::chat))
        // =================================================================
        // CONVERSATIONS
        // =================================================================
        .route("/api/conversations", get(conversations::list_conversations))
        .route(
            "/api/conversations/{conversation_id}/messages",
            get(conversations::list_messages),
        )
        // =================================================================
        // STATE
        // =================================================================
        .with_state(state)
}

/// Both route groups merged, with no middleware attached.
pub fn build_router(state: AppState) -> Router {
    let public = build_public_routes(state.clone());
    let protected = build_protected_routes(state);

    Router::new().merge(public).merge(protected)
}

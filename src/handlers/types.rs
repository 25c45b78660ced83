//! API Request/Response Types
//!
//! All HTTP request and response structures for the taskchat server. Task,
//! conversation, and message payloads serialize the storage models directly;
//! the structs here cover everything else.

use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH & INFRASTRUCTURE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub tasks_count: usize,
    pub conversations_count: usize,
    pub llm_available: bool,
}

// =============================================================================
// AUDIT & EVENTS
// =============================================================================

/// Audit event for history tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: String,
    pub task_id: String,
    pub details: String,
}

// =============================================================================
// TASKS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub user_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub user_id: String,
    pub completed: bool,
}

/// Query parameters for endpoints scoped to a single caller
/// (single-task reads/deletes, conversation listings).
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub user_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteTaskResponse {
    pub message: String,
    pub task_id: i64,
}

// =============================================================================
// CHAT
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub response: String,
    pub tool_calls: Vec<String>,
}

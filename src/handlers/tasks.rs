//! Task CRUD Handlers
//!
//! REST endpoints for task management. Every operation is scoped by the
//! caller's `user_id`; a task owned by someone else behaves as not-found.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use std::time::Instant;

use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::metrics;
use crate::storage::{Task, TaskPatch};
use crate::validation;

use super::router::AppState;
use super::types::{
    CompleteTaskRequest, CreateTaskRequest, DeleteTaskResponse, ListTasksQuery, UpdateTaskRequest,
    UserQuery,
};

/// GET /api/tasks - List the caller's tasks, optionally filtered by status
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>> {
    let op_start = Instant::now();
    validation::validate_user_id(&query.user_id).map_validation_err("user_id")?;

    let completed = match query.status.as_deref() {
        Some(raw) => validation::parse_status_filter(raw).map_validation_err("status")?,
        None => None,
    };

    let tasks = state
        .task_store
        .list_tasks(&query.user_id, completed)
        .map_err(AppError::Internal)?;

    metrics::TASK_OPS_DURATION
        .with_label_values(&["list"])
        .observe(op_start.elapsed().as_secs_f64());
    metrics::TASK_OPS_TOTAL
        .with_label_values(&["list", "success"])
        .inc();

    Ok(Json(tasks))
}

/// POST /api/tasks - Create a task
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<Task>> {
    let op_start = Instant::now();
    validation::validate_user_id(&req.user_id).map_validation_err("user_id")?;
    validation::validate_title(&req.title).map_validation_err("title")?;
    if let Some(ref description) = req.description {
        validation::validate_description(description).map_validation_err("description")?;
    }

    let task = state
        .task_store
        .create_task(&req.user_id, &req.title, req.description.clone())
        .map_err(AppError::Internal)?;

    tracing::info!(
        user_id = %req.user_id,
        task_id = task.id,
        title = %task.title,
        "Created task"
    );

    state.log_event(
        &req.user_id,
        "TASK_CREATE",
        &task.id.to_string(),
        &format!(
            "Created task '{}'",
            task.title.chars().take(50).collect::<String>()
        ),
    );

    metrics::TASK_OPS_DURATION
        .with_label_values(&["create"])
        .observe(op_start.elapsed().as_secs_f64());
    metrics::TASK_OPS_TOTAL
        .with_label_values(&["create", "success"])
        .inc();

    Ok(Json(task))
}

/// GET /api/tasks/{task_id} - Fetch a single task
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Task>> {
    let op_start = Instant::now();
    validation::validate_user_id(&query.user_id).map_validation_err("user_id")?;

    let task = state
        .task_store
        .get_task(&query.user_id, task_id)
        .map_err(AppError::Internal)?
        .ok_or_else(|| {
            metrics::TASK_OPS_TOTAL
                .with_label_values(&["get", "not_found"])
                .inc();
            AppError::TaskNotFound(task_id)
        })?;

    metrics::TASK_OPS_DURATION
        .with_label_values(&["get"])
        .observe(op_start.elapsed().as_secs_f64());
    metrics::TASK_OPS_TOTAL
        .with_label_values(&["get", "success"])
        .inc();

    Ok(Json(task))
}

/// PUT /api/tasks/{task_id} - Update task fields; absent fields stay unchanged
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    let op_start = Instant::now();
    validation::validate_user_id(&req.user_id).map_validation_err("user_id")?;
    if let Some(ref title) = req.title {
        validation::validate_title(title).map_validation_err("title")?;
    }
    if let Some(ref description) = req.description {
        validation::validate_description(description).map_validation_err("description")?;
    }

    let patch = TaskPatch {
        title: req.title.clone(),
        description: req.description.clone(),
        completed: req.completed,
    };

    let task = state
        .task_store
        .update_task(&req.user_id, task_id, patch)
        .map_err(AppError::Internal)?
        .ok_or_else(|| {
            metrics::TASK_OPS_TOTAL
                .with_label_values(&["update", "not_found"])
                .inc();
            AppError::TaskNotFound(task_id)
        })?;

    tracing::info!(
        user_id = %req.user_id,
        task_id = task.id,
        "Updated task"
    );

    state.log_event(
        &req.user_id,
        "TASK_UPDATE",
        &task.id.to_string(),
        &format!(
            "Updated task '{}'",
            task.title.chars().take(50).collect::<String>()
        ),
    );

    metrics::TASK_OPS_DURATION
        .with_label_values(&["update"])
        .observe(op_start.elapsed().as_secs_f64());
    metrics::TASK_OPS_TOTAL
        .with_label_values(&["update", "success"])
        .inc();

    Ok(Json(task))
}

/// PATCH /api/tasks/{task_id}/complete - Set the completion flag
pub async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(req): Json<CompleteTaskRequest>,
) -> Result<Json<Task>> {
    let op_start = Instant::now();
    validation::validate_user_id(&req.user_id).map_validation_err("user_id")?;

    let task = state
        .task_store
        .set_completed(&req.user_id, task_id, req.completed)
        .map_err(AppError::Internal)?
        .ok_or_else(|| {
            metrics::TASK_OPS_TOTAL
                .with_label_values(&["complete", "not_found"])
                .inc();
            AppError::TaskNotFound(task_id)
        })?;

    tracing::info!(
        user_id = %req.user_id,
        task_id = task.id,
        completed = task.completed,
        "Set task completion"
    );

    state.log_event(
        &req.user_id,
        "TASK_COMPLETE",
        &task.id.to_string(),
        &format!(
            "Marked task '{}' as {}",
            task.title.chars().take(50).collect::<String>(),
            if task.completed { "completed" } else { "pending" }
        ),
    );

    metrics::TASK_OPS_DURATION
        .with_label_values(&["complete"])
        .observe(op_start.elapsed().as_secs_f64());
    metrics::TASK_OPS_TOTAL
        .with_label_values(&["complete", "success"])
        .inc();

    Ok(Json(task))
}

/// DELETE /api/tasks/{task_id} - Delete a task
///
/// The REST surface deletes unconditionally; the two-step confirmation flow
/// belongs to the chat interface only.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DeleteTaskResponse>> {
    let op_start = Instant::now();
    validation::validate_user_id(&query.user_id).map_validation_err("user_id")?;

    let deleted = state
        .task_store
        .delete_task(&query.user_id, task_id)
        .map_err(AppError::Internal)?;

    if !deleted {
        metrics::TASK_OPS_TOTAL
            .with_label_values(&["delete", "not_found"])
            .inc();
        return Err(AppError::TaskNotFound(task_id));
    }

    tracing::info!(
        user_id = %query.user_id,
        task_id = task_id,
        "Deleted task"
    );

    state.log_event(
        &query.user_id,
        "TASK_DELETE",
        &task_id.to_string(),
        &format!("Deleted task {task_id}"),
    );

    metrics::TASK_OPS_DURATION
        .with_label_values(&["delete"])
        .observe(op_start.elapsed().as_secs_f64());
    metrics::TASK_OPS_TOTAL
        .with_label_values(&["delete", "success"])
        .inc();

    Ok(Json(DeleteTaskResponse {
        message: "Task deleted successfully".to_string(),
        task_id,
    }))
}

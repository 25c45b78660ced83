//! Conversation Handlers
//!
//! Read-only access to chat transcripts. A conversation that is absent or
//! owned by someone else is reported as not found.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::storage::{Conversation, StoredMessage};
use crate::validation;

use super::router::AppState;
use super::types::UserQuery;

/// GET /api/conversations - List the caller's conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Conversation>>> {
    validation::validate_user_id(&query.user_id).map_validation_err("user_id")?;

    let conversations = state
        .conversation_store
        .list_conversations(&query.user_id)
        .map_err(AppError::Internal)?;

    Ok(Json(conversations))
}

/// GET /api/conversations/{conversation_id}/messages - Transcript in
/// creation order
pub async fn list_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<StoredMessage>>> {
    validation::validate_user_id(&query.user_id).map_validation_err("user_id")?;
    let id = validation::validate_conversation_id(&conversation_id)
        .map_err(|_| AppError::InvalidConversationId(conversation_id.clone()))?;

    state
        .conversation_store
        .get_conversation(&query.user_id, id)
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::ConversationNotFound(conversation_id.clone()))?;

    let messages = state
        .conversation_store
        .list_messages(id, &query.user_id)
        .map_err(AppError::Internal)?;

    Ok(Json(messages))
}

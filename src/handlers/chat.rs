//! Chat Handler
//!
//! The natural-language entry point. Resolves a conversation, records the
//! user's message, runs the agent, records the reply. The agent itself never
//! fails, so the only 5xx paths here are storage errors.

use axum::extract::State;
use axum::response::Json;
use std::time::Instant;

use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::storage::MessageRole;
use crate::validation;

use super::router::AppState;
use super::types::{ChatRequest, ChatResponse};

/// POST /api/chat - Send a message to the task assistant
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let op_start = Instant::now();
    validation::validate_user_id(&req.user_id).map_validation_err("user_id")?;
    validation::validate_chat_message(&req.message).map_validation_err("message")?;
    let message = req.message.trim();

    // Reuse the caller's conversation when it exists and is theirs; an
    // unknown or foreign ID silently starts a fresh one.
    let existing = match req.conversation_id.as_deref() {
        Some(raw) => {
            let id = validation::validate_conversation_id(raw)
                .map_err(|_| AppError::InvalidConversationId(raw.to_string()))?;
            state
                .conversation_store
                .get_conversation(&req.user_id, id)
                .map_err(AppError::Internal)?
        }
        None => None,
    };

    let conversation = match existing {
        Some(conversation) => conversation,
        None => {
            let conversation = state
                .conversation_store
                .create_conversation(&req.user_id)
                .map_err(AppError::Internal)?;
            state.log_event(
                &req.user_id,
                "CONVERSATION_CREATE",
                &conversation.id.to_string(),
                "Started conversation",
            );
            conversation
        }
    };

    state
        .conversation_store
        .append_message(conversation.id, &req.user_id, MessageRole::User, message)
        .map_err(AppError::Internal)?;

    let reply = state
        .agent
        .handle_message(&req.user_id, Some(conversation.id), message)
        .await;

    state
        .conversation_store
        .append_message(
            conversation.id,
            &req.user_id,
            MessageRole::Assistant,
            &reply.response,
        )
        .map_err(AppError::Internal)?;

    tracing::info!(
        user_id = %req.user_id,
        conversation_id = %conversation.id,
        elapsed_ms = op_start.elapsed().as_millis() as u64,
        "Handled chat message"
    );

    state.log_event(
        &req.user_id,
        "CHAT_MESSAGE",
        &conversation.id.to_string(),
        &format!("'{}'", message.chars().take(50).collect::<String>()),
    );

    Ok(Json(ChatResponse {
        conversation_id: conversation.id.to_string(),
        response: reply.response,
        tool_calls: reply.tool_calls,
    }))
}

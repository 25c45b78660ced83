//! Conversational agent orchestration
//!
//! Order matters here: a pending confirmation is checked before intent
//! detection so a bare "yes" executes the parked operation, then detected
//! intents go to the dispatcher, and unknown text goes to the LLM when one
//! is configured, or to a canned reply when not. Every path ends in a
//! response string; failures are logged and answered with the canned
//! fallback rather than surfaced to the caller.

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::llm::LlmClient;
use crate::metrics;
use crate::storage::{ConversationStore, TaskStore};

use super::confirmation::{ConfirmationTracker, PendingOperation};
use super::dispatcher::{Dispatcher, OperationResult};
use super::intent::{ContextMessage, Intent, IntentDetector};

/// Words accepted as confirmation of a pending destructive operation.
const CONFIRMATION_KEYWORDS: [&str; 8] = [
    "yes", "confirm", "ok", "okay", "sure", "delete", "go ahead", "proceed",
];

const GREETING_WORDS: [&str; 4] = ["hello", "hi", "hey", "greetings"];
const HELP_QUERIES: [&str; 3] = ["help", "what can you do", "how do i"];

const GREETING_REPLY: &str = "Hello! I'm your AI Todo Assistant. I can help you manage your \
     tasks. You can ask me to add, list, complete, or delete tasks. How can I assist you today?";

const HELP_REPLY: &str = "I can help you manage your tasks! You can ask me to add, list, \
     complete, update, or delete tasks. For example: 'Add a task to buy groceries' or 'Show my \
     tasks'.";

const TECHNICAL_DIFFICULTIES_REPLY: &str = "I'm currently experiencing technical difficulties \
     with my AI services, but I'm still here to help. You can ask me to add, list, complete, \
     update, or delete tasks when I'm back online.";

/// What the agent hands back to the chat endpoint.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub response: String,
    pub tool_calls: Vec<String>,
}

pub struct ChatAgent {
    dispatcher: Dispatcher,
    conversations: Arc<ConversationStore>,
    llm: Arc<LlmClient>,
    detector: IntentDetector,
    confirmations: ConfirmationTracker,
}

impl ChatAgent {
    pub fn new(
        tasks: Arc<TaskStore>,
        conversations: Arc<ConversationStore>,
        llm: Arc<LlmClient>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(tasks),
            conversations,
            llm,
            detector: IntentDetector::new(),
            confirmations: ConfirmationTracker::new(),
        }
    }

    /// Process one user message and produce a reply. Never fails: anything
    /// unexpected is logged and answered with a canned fallback.
    pub async fn handle_message(
        &self,
        user_id: &str,
        conversation_id: Option<Uuid>,
        message: &str,
    ) -> AgentReply {
        let started = Instant::now();
        let response = self.process_message(user_id, conversation_id, message).await;
        metrics::CHAT_DURATION.observe(started.elapsed().as_secs_f64());

        AgentReply {
            response,
            tool_calls: Vec::new(),
        }
    }

    async fn process_message(
        &self,
        user_id: &str,
        conversation_id: Option<Uuid>,
        message: &str,
    ) -> String {
        let context = match conversation_id {
            Some(conversation_id) => self.conversation_context(conversation_id, user_id),
            None => Vec::new(),
        };

        let lowered_owned = message.to_lowercase();
        let lowered = lowered_owned.trim();

        // A confirming word while an operation is parked executes it before
        // any intent detection runs.
        if CONFIRMATION_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            if let Some(pending) = self.confirmations.take(user_id, conversation_id) {
                metrics::CHAT_MESSAGES_TOTAL
                    .with_label_values(&["confirmation_resolved"])
                    .inc();
                return self.run_confirmed(user_id, &pending, lowered);
            }
        }

        let intent = self.detector.detect(message, &context);
        metrics::INTENT_DETECTIONS_TOTAL
            .with_label_values(&[intent.operation()])
            .inc();

        if intent == Intent::ConfirmDestructiveAction {
            if let Some(pending) = self.confirmations.take(user_id, conversation_id) {
                metrics::CHAT_MESSAGES_TOTAL
                    .with_label_values(&["confirmation_resolved"])
                    .inc();
                return self.run_confirmed(user_id, &pending, lowered);
            }
            // Nothing pending: fall through to the dispatcher, which answers
            // with its catch-all reply.
        }

        if intent == Intent::Unknown {
            return self.llm_or_canned(message, lowered, &context).await;
        }

        let result = match self.dispatcher.execute_intent(user_id, &intent) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    operation = intent.operation(),
                    "Task operation failed"
                );
                metrics::CHAT_MESSAGES_TOTAL
                    .with_label_values(&["canned_reply"])
                    .inc();
                return canned_fallback(lowered);
            }
        };

        if let OperationResult::NeedsConfirmation {
            task_id,
            message: prompt,
            ..
        } = &result
        {
            self.confirmations.store(
                user_id,
                conversation_id,
                PendingOperation {
                    operation: intent.operation().to_string(),
                    task_id: *task_id,
                    original_message: message.to_string(),
                },
            );
            metrics::CHAT_MESSAGES_TOTAL
                .with_label_values(&["confirmation_pending"])
                .inc();
            return prompt.clone();
        }

        metrics::CHAT_MESSAGES_TOTAL
            .with_label_values(&["operation"])
            .inc();
        format_result(&result)
    }

    fn run_confirmed(&self, user_id: &str, pending: &PendingOperation, lowered: &str) -> String {
        match self.dispatcher.execute_confirmed(user_id, pending) {
            Ok(result) => format_result(&result),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    operation = %pending.operation,
                    "Confirmed operation failed"
                );
                canned_fallback(lowered)
            }
        }
    }

    async fn llm_or_canned(
        &self,
        message: &str,
        lowered: &str,
        context: &[ContextMessage],
    ) -> String {
        if !self.llm.available() {
            metrics::CHAT_MESSAGES_TOTAL
                .with_label_values(&["canned_reply"])
                .inc();
            return canned_fallback(lowered);
        }

        metrics::CHAT_MESSAGES_TOTAL
            .with_label_values(&["llm_reply"])
            .inc();
        let prompt = if context.is_empty() {
            message.to_string()
        } else {
            let tail = &context[context.len().saturating_sub(5)..];
            let history: Vec<String> = tail
                .iter()
                .map(|m| format!("{}: {}", m.role.as_str(), m.content))
                .collect();
            format!(
                "Conversation context:\n{}\n\nCurrent user message: {}",
                history.join("\n"),
                message
            )
        };
        self.llm.chat(&prompt).await.text
    }

    /// Prior messages for this conversation, or an empty list when the
    /// conversation is missing, foreign, or unreadable.
    fn conversation_context(&self, conversation_id: Uuid, user_id: &str) -> Vec<ContextMessage> {
        let conversation = match self.conversations.get_conversation(user_id, conversation_id) {
            Ok(Some(conversation)) => conversation,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load conversation for context");
                return Vec::new();
            }
        };

        match self.conversations.list_messages(conversation.id, user_id) {
            Ok(messages) => messages
                .into_iter()
                .map(|m| ContextMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load messages for context");
                Vec::new()
            }
        }
    }
}

/// Keyword-matched reply used when the LLM is unavailable or a step fails.
fn canned_fallback(lowered_message: &str) -> String {
    if GREETING_WORDS.iter().any(|w| lowered_message.contains(w)) {
        GREETING_REPLY.to_string()
    } else if HELP_QUERIES.iter().any(|q| lowered_message.contains(q)) {
        HELP_REPLY.to_string()
    } else {
        TECHNICAL_DIFFICULTIES_REPLY.to_string()
    }
}

fn format_result(result: &OperationResult) -> String {
    match result {
        OperationResult::Completed {
            message: Some(message),
            ..
        } => message.clone(),
        OperationResult::Completed {
            tasks: Some(tasks), ..
        } => {
            if tasks.is_empty() {
                "You don't have any tasks matching that criteria.".to_string()
            } else {
                let lines: Vec<String> = tasks
                    .iter()
                    .map(|task| {
                        let marker = if task.completed { "✓" } else { "○" };
                        format!("{} {}. {}", marker, task.id, task.title)
                    })
                    .collect();
                format!("Here are your tasks:\n{}", lines.join("\n"))
            }
        }
        OperationResult::Completed { .. } => "Operation completed successfully.".to_string(),
        OperationResult::NeedsConfirmation { message, .. } => message.clone(),
        OperationResult::Failed { message } => {
            if message.is_empty() {
                "Error: Unknown error occurred".to_string()
            } else {
                format!("Error: {}", message)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MessageRole;
    use tempfile::TempDir;

    fn setup_agent() -> (ChatAgent, Arc<ConversationStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let tasks = Arc::new(TaskStore::new(temp_dir.path()).unwrap());
        let conversations = Arc::new(ConversationStore::new(temp_dir.path()).unwrap());
        let agent = ChatAgent::new(tasks, conversations.clone(), Arc::new(LlmClient::disabled()));
        (agent, conversations, temp_dir)
    }

    async fn say(agent: &ChatAgent, conversation_id: Option<Uuid>, message: &str) -> String {
        agent.handle_message("alice", conversation_id, message).await.response
    }

    #[tokio::test]
    async fn test_add_then_list() {
        let (agent, _convs, _dir) = setup_agent();

        let reply = say(&agent, None, "add a task to buy groceries").await;
        assert_eq!(reply, "Task 'buy groceries' has been added successfully");

        let reply = say(&agent, None, "show my tasks").await;
        assert_eq!(reply, "You have 1 task");
    }

    #[tokio::test]
    async fn test_complete_and_update() {
        let (agent, _convs, _dir) = setup_agent();

        say(&agent, None, "add a task to water the plants").await;

        let reply = say(&agent, None, "complete task 1").await;
        assert_eq!(reply, "Task 'water the plants' has been completed successfully");

        let reply = say(&agent, None, "update task 1 to water the garden").await;
        assert_eq!(reply, "Task 'water the garden' has been updated successfully");
    }

    #[tokio::test]
    async fn test_not_found_is_error_prefixed() {
        let (agent, _convs, _dir) = setup_agent();

        let reply = say(&agent, None, "complete task 99").await;
        assert_eq!(
            reply,
            "Error: Task with ID 99 not found or does not belong to you"
        );
    }

    #[tokio::test]
    async fn test_delete_confirmation_round_trip() {
        let (agent, _convs, _dir) = setup_agent();

        say(&agent, None, "add a task to pay rent").await;

        let prompt = say(&agent, None, "delete task 1").await;
        assert_eq!(
            prompt,
            "Are you sure you want to delete task 'pay rent'? This action cannot be undone. \
             Please confirm the deletion."
        );

        // Still there until confirmed.
        assert_eq!(say(&agent, None, "show my tasks").await, "You have 1 task");

        let reply = say(&agent, None, "yes").await;
        assert_eq!(reply, "Task 'pay rent' has been deleted successfully");

        assert_eq!(say(&agent, None, "show my tasks").await, "You have 0 tasks");

        // The confirmation was consumed; another "yes" has nothing to act on.
        let reply = say(&agent, None, "yes").await;
        assert_eq!(reply, TECHNICAL_DIFFICULTIES_REPLY);
    }

    #[tokio::test]
    async fn test_confirmation_via_detected_intent() {
        let (agent, conversations, _dir) = setup_agent();

        let conversation = conversations.create_conversation("alice").unwrap();
        say(&agent, Some(conversation.id), "add a task to pay rent").await;

        let prompt = say(&agent, Some(conversation.id), "delete task 1").await;
        conversations
            .append_message(conversation.id, "alice", MessageRole::User, "delete task 1")
            .unwrap();
        conversations
            .append_message(conversation.id, "alice", MessageRole::Assistant, &prompt)
            .unwrap();

        // "affirmative" is not a plain confirmation keyword; it only works
        // through intent detection against the conversation context.
        let reply = say(&agent, Some(conversation.id), "affirmative").await;
        assert_eq!(reply, "Task 'pay rent' has been deleted successfully");
    }

    #[tokio::test]
    async fn test_confirmation_is_scoped_to_conversation() {
        let (agent, conversations, _dir) = setup_agent();

        let conv_a = conversations.create_conversation("alice").unwrap();
        let conv_b = conversations.create_conversation("alice").unwrap();

        say(&agent, Some(conv_a.id), "add a task to pay rent").await;
        say(&agent, Some(conv_a.id), "delete task 1").await;

        // Confirming from another conversation does not fire the delete.
        let reply = say(&agent, Some(conv_b.id), "yes").await;
        assert_eq!(reply, TECHNICAL_DIFFICULTIES_REPLY);
        assert_eq!(say(&agent, Some(conv_a.id), "show my tasks").await, "You have 1 task");

        // The right conversation still can.
        let reply = say(&agent, Some(conv_a.id), "yes").await;
        assert_eq!(reply, "Task 'pay rent' has been deleted successfully");
    }

    #[tokio::test]
    async fn test_confirmation_intent_without_pending_gets_catch_all() {
        let (agent, conversations, _dir) = setup_agent();

        let conversation = conversations.create_conversation("alice").unwrap();
        conversations
            .append_message(
                conversation.id,
                "alice",
                MessageRole::Assistant,
                "Please confirm the deletion.",
            )
            .unwrap();

        // Detected as a confirmation, but nothing is parked, so the
        // dispatcher answers with its catch-all reply.
        let reply = say(&agent, Some(conversation.id), "affirmative").await;
        assert!(reply.starts_with("I'm not sure how to handle that request."));
    }

    #[tokio::test]
    async fn test_canned_fallbacks_without_llm() {
        let (agent, _convs, _dir) = setup_agent();

        let reply = say(&agent, None, "hello there").await;
        assert_eq!(reply, GREETING_REPLY);

        let reply = say(&agent, None, "what can you do").await;
        assert_eq!(reply, HELP_REPLY);

        let reply = say(&agent, None, "tell me about the weather").await;
        assert_eq!(reply, TECHNICAL_DIFFICULTIES_REPLY);
    }

    #[test]
    fn test_format_result_prefers_message_over_tasks() {
        let task = crate::storage::Task {
            id: 1,
            user_id: "alice".to_string(),
            title: "one".to_string(),
            description: None,
            completed: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let both = OperationResult::Completed {
            message: Some("You have 1 task".to_string()),
            task: None,
            tasks: Some(vec![task.clone()]),
        };
        assert_eq!(format_result(&both), "You have 1 task");

        let mut done = task.clone();
        done.id = 2;
        done.title = "two".to_string();
        done.completed = true;
        let tasks_only = OperationResult::Completed {
            message: None,
            task: None,
            tasks: Some(vec![task, done]),
        };
        assert_eq!(
            format_result(&tasks_only),
            "Here are your tasks:\n○ 1. one\n✓ 2. two"
        );

        let empty = OperationResult::Completed {
            message: None,
            task: None,
            tasks: Some(Vec::new()),
        };
        assert_eq!(
            format_result(&empty),
            "You don't have any tasks matching that criteria."
        );

        let bare = OperationResult::Completed {
            message: None,
            task: None,
            tasks: None,
        };
        assert_eq!(format_result(&bare), "Operation completed successfully.");

        let failed = OperationResult::Failed {
            message: "Task with ID 9 not found or does not belong to you".to_string(),
        };
        assert_eq!(
            format_result(&failed),
            "Error: Task with ID 9 not found or does not belong to you"
        );
    }
}

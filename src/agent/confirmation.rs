//! Pending-confirmation tracking for destructive operations
//!
//! Keyed by user and conversation so a deletion requested in one chat
//! cannot be confirmed from another. State lives in process memory with no
//! expiry; a new destructive request overwrites any pending one under the
//! same key.

use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics;

/// A destructive operation parked until the user confirms it.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub operation: String,
    pub task_id: i64,
    pub original_message: String,
}

#[derive(Default)]
pub struct ConfirmationTracker {
    pending: DashMap<String, PendingOperation>,
}

impl ConfirmationTracker {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    fn key(user_id: &str, conversation_id: Option<Uuid>) -> String {
        match conversation_id {
            Some(conversation_id) => format!("{}:{}", user_id, conversation_id),
            None => user_id.to_string(),
        }
    }

    /// Park an operation, replacing any pending one under the same key.
    pub fn store(&self, user_id: &str, conversation_id: Option<Uuid>, operation: PendingOperation) {
        tracing::debug!(
            user_id = %user_id,
            operation = %operation.operation,
            task_id = operation.task_id,
            "Stored pending confirmation"
        );
        let previous = self
            .pending
            .insert(Self::key(user_id, conversation_id), operation);
        if previous.is_none() {
            metrics::PENDING_CONFIRMATIONS.inc();
        }
    }

    /// Remove and return the pending operation for this key, if any.
    pub fn take(&self, user_id: &str, conversation_id: Option<Uuid>) -> Option<PendingOperation> {
        let taken = self.pending.remove(&Self::key(user_id, conversation_id));
        if taken.is_some() {
            metrics::PENDING_CONFIRMATIONS.dec();
        }
        taken.map(|(_, operation)| operation)
    }

    pub fn is_pending(&self, user_id: &str, conversation_id: Option<Uuid>) -> bool {
        self.pending
            .contains_key(&Self::key(user_id, conversation_id))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn delete_op(task_id: i64) -> PendingOperation {
        PendingOperation {
            operation: "delete_task".to_string(),
            task_id,
            original_message: format!("delete task {}", task_id),
        }
    }

    #[test]
    fn test_store_and_take() {
        let tracker = ConfirmationTracker::new();
        let conv = Uuid::new_v4();

        assert!(!tracker.is_pending("alice", Some(conv)));
        tracker.store("alice", Some(conv), delete_op(1));
        assert!(tracker.is_pending("alice", Some(conv)));

        let taken = tracker.take("alice", Some(conv)).unwrap();
        assert_eq!(taken.operation, "delete_task");
        assert_eq!(taken.task_id, 1);

        // Consumed on take.
        assert!(tracker.take("alice", Some(conv)).is_none());
    }

    #[test]
    fn test_keys_isolate_users_and_conversations() {
        let tracker = ConfirmationTracker::new();
        let conv_a = Uuid::new_v4();
        let conv_b = Uuid::new_v4();

        tracker.store("alice", Some(conv_a), delete_op(1));

        assert!(tracker.take("bob", Some(conv_a)).is_none());
        assert!(tracker.take("alice", Some(conv_b)).is_none());
        assert!(tracker.take("alice", None).is_none());
        assert!(tracker.take("alice", Some(conv_a)).is_some());
    }

    #[test]
    fn test_new_request_overwrites_pending() {
        let tracker = ConfirmationTracker::new();

        tracker.store("alice", None, delete_op(1));
        tracker.store("alice", None, delete_op(2));

        let taken = tracker.take("alice", None).unwrap();
        assert_eq!(taken.task_id, 2);
        assert!(tracker.take("alice", None).is_none());
    }
}

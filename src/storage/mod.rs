//! RocksDB-backed persistence for tasks and conversations

pub mod conversations;
pub mod tasks;

pub use conversations::{Conversation, ConversationStore, MessageRole, StoredMessage};
pub use tasks::{Task, TaskPatch, TaskStore};

use std::time::Instant;

/// Record a RocksDB operation in the metrics registry.
pub(crate) fn record_db_op(op: &str, started: Instant, ok: bool) {
    let result = if ok { "success" } else { "error" };
    crate::metrics::ROCKSDB_OPS_TOTAL
        .with_label_values(&[op, result])
        .inc();
    crate::metrics::ROCKSDB_OPS_DURATION
        .with_label_values(&[op])
        .observe(started.elapsed().as_secs_f64());
}

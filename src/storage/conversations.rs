//! Conversation and message storage backed by RocksDB
//!
//! Conversations are keyed `{user_id}:{conversation_id}` so ownership checks
//! and per-user listings are a point lookup and a prefix scan. Messages live
//! in a separate DB keyed `{conversation_id}:{seq}` with a zero-padded
//! per-conversation sequence number, so a prefix scan replays a conversation
//! in insertion order.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::record_db_op;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// CONVERSATION STORE
// ============================================================================

pub struct ConversationStore {
    conversation_db: Arc<DB>,
    message_db: Arc<DB>,
    append_lock: Mutex<()>,
}

impl ConversationStore {
    pub fn new(storage_path: &Path) -> Result<Self> {
        let conv_path = storage_path.join("conversations");
        let msg_path = storage_path.join("messages");
        std::fs::create_dir_all(&conv_path)?;
        std::fs::create_dir_all(&msg_path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_max_write_buffer_number(2);
        opts.set_write_buffer_size(32 * 1024 * 1024); // 32MB

        let conversation_db =
            Arc::new(DB::open(&opts, &conv_path).context("Failed to open conversations DB")?);
        let message_db =
            Arc::new(DB::open(&opts, &msg_path).context("Failed to open messages DB")?);

        tracing::info!("Conversation store initialized");

        Ok(Self {
            conversation_db,
            message_db,
            append_lock: Mutex::new(()),
        })
    }

    fn conversation_key(user_id: &str, conversation_id: Uuid) -> String {
        format!("{}:{}", user_id, conversation_id)
    }

    fn message_key(conversation_id: Uuid, seq: u64) -> String {
        format!("{}:{:010}", conversation_id, seq)
    }

    fn seq_key(conversation_id: Uuid) -> String {
        format!("__seq:{}", conversation_id)
    }

    pub fn create_conversation(&self, user_id: &str) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let key = Self::conversation_key(user_id, conversation.id);
        let value =
            serde_json::to_vec(&conversation).context("Failed to serialize conversation")?;
        let start = Instant::now();
        let res = self.conversation_db.put(key.as_bytes(), &value);
        record_db_op("put", start, res.is_ok());
        res.context("Failed to store conversation")?;

        tracing::debug!(conversation_id = %conversation.id, user_id = %user_id, "Created conversation");
        Ok(conversation)
    }

    /// Look up a conversation by ID, scoped to its owner. Returns `None` both
    /// for unknown IDs and for conversations owned by someone else.
    pub fn get_conversation(&self, user_id: &str, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let key = Self::conversation_key(user_id, conversation_id);
        let start = Instant::now();
        let res = self.conversation_db.get(key.as_bytes());
        record_db_op("get", start, res.is_ok());

        match res? {
            Some(value) => {
                let conversation =
                    serde_json::from_slice(&value).context("Failed to deserialize conversation")?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    /// List a user's conversations, oldest first.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let prefix = format!("{}:", user_id);
        let mut conversations: Vec<Conversation> = Vec::new();

        let start = Instant::now();
        let iter = self.conversation_db.prefix_iterator(prefix.as_bytes());
        for item in iter {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);
            if !key_str.starts_with(&prefix) {
                break;
            }
            let conversation: Conversation =
                serde_json::from_slice(&value).context("Failed to deserialize conversation")?;
            conversations.push(conversation);
        }
        record_db_op("scan", start, true);

        conversations.sort_by_key(|c| c.created_at);

        tracing::debug!(user_id = %user_id, count = conversations.len(), "Listed conversations");
        Ok(conversations)
    }

    /// Append a message to a conversation. The caller is responsible for
    /// checking that the conversation exists and belongs to the user.
    pub fn append_message(
        &self,
        conversation_id: Uuid,
        user_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<StoredMessage> {
        let _guard = self.append_lock.lock();

        let seq_key = Self::seq_key(conversation_id);
        let seq: u64 = match self.message_db.get(seq_key.as_bytes())? {
            Some(raw) => String::from_utf8_lossy(&raw).parse().unwrap_or(0),
            None => 0,
        };

        let message = StoredMessage {
            id: Uuid::new_v4(),
            conversation_id,
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let key = Self::message_key(conversation_id, seq);
        let value = serde_json::to_vec(&message).context("Failed to serialize message")?;
        let start = Instant::now();
        let res = self.message_db.put(key.as_bytes(), &value);
        record_db_op("put", start, res.is_ok());
        res.context("Failed to store message")?;

        self.message_db
            .put(seq_key.as_bytes(), (seq + 1).to_string().as_bytes())
            .context("Failed to persist message sequence")?;

        tracing::debug!(
            conversation_id = %conversation_id,
            role = role.as_str(),
            seq = seq,
            "Appended message"
        );
        Ok(message)
    }

    /// List a conversation's messages in insertion order, keeping only those
    /// recorded for the given user.
    pub fn list_messages(&self, conversation_id: Uuid, user_id: &str) -> Result<Vec<StoredMessage>> {
        let prefix = format!("{}:", conversation_id);
        let mut messages = Vec::new();

        let start = Instant::now();
        let iter = self.message_db.prefix_iterator(prefix.as_bytes());
        for item in iter {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);
            if !key_str.starts_with(&prefix) {
                break;
            }
            let message: StoredMessage =
                serde_json::from_slice(&value).context("Failed to deserialize message")?;
            if message.user_id != user_id {
                continue;
            }
            messages.push(message);
        }
        record_db_op("scan", start, true);

        Ok(messages)
    }

    /// Total number of conversations across all users. Full scan; used by
    /// the health endpoint only.
    pub fn count_conversations(&self) -> usize {
        self.conversation_db
            .iterator(rocksdb::IteratorMode::Start)
            .flatten()
            .count()
    }

    /// Flush memtables to disk. Called on graceful shutdown.
    pub fn flush(&self) -> Result<()> {
        self.conversation_db
            .flush()
            .context("Failed to flush conversations DB")?;
        self.message_db
            .flush()
            .context("Failed to flush messages DB")?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

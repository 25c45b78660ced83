//! Application State Management
//!
//! Central state shared by every handler: the task and conversation stores,
//! the chat agent, and the persistent audit trail.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::agent::ChatAgent;
use crate::config::ServerConfig;
use crate::llm::LlmClient;
use crate::storage::{ConversationStore, TaskStore};

use super::types::AuditEvent;

/// Central state for the server: stores, chat agent, and audit trail
pub struct AppServices {
    /// Task storage (RocksDB-backed)
    pub task_store: Arc<TaskStore>,

    /// Conversation and message storage
    pub conversation_store: Arc<ConversationStore>,

    /// Chat agent: intent detection, confirmation tracking, LLM fallback
    pub agent: ChatAgent,

    /// LLM client handle (shared with the agent, reported by readiness probe)
    pub llm: Arc<LlmClient>,

    /// Persistent audit trail, keyed `{user_id}:{nanos:019}`
    pub audit_db: Arc<rocksdb::DB>,

    /// Base storage path
    pub base_path: std::path::PathBuf,

    /// Server configuration
    pub server_config: ServerConfig,

    /// Process start, for uptime reporting
    pub start_time: std::time::Instant,
}

impl AppServices {
    pub fn new(base_path: std::path::PathBuf, server_config: ServerConfig) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;

        let audit_path = base_path.join("audit_logs");
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let audit_db = Arc::new(rocksdb::DB::open(&opts, audit_path)?);

        let task_store = Arc::new(TaskStore::new(&base_path)?);
        info!("Task store initialized");

        let conversation_store = Arc::new(ConversationStore::new(&base_path)?);
        info!("Conversation store initialized");

        let llm = Arc::new(LlmClient::from_env());
        if llm.available() {
            info!("LLM client initialized");
        } else {
            info!("LLM client not configured, chat falls back to canned replies");
        }

        let agent = ChatAgent::new(task_store.clone(), conversation_store.clone(), llm.clone());

        let services = Self {
            task_store,
            conversation_store,
            agent,
            llm,
            audit_db,
            base_path,
            server_config,
            start_time: std::time::Instant::now(),
        };

        info!("Pruning expired audit entries...");
        match services.prune_audit_logs() {
            Ok(removed) if removed > 0 => {
                info!("Audit prune removed {} stale entries", removed);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Audit prune failed on startup: {}", e),
        }

        Ok(services)
    }

    /// Appends one audit entry; the RocksDB write happens off the async
    /// runtime.
    pub fn log_event(&self, user_id: &str, event_type: &str, task_id: &str, details: &str) {
        let event = AuditEvent {
            timestamp: chrono::Utc::now(),
            event_type: event_type.to_string(),
            task_id: task_id.to_string(),
            details: details.to_string(),
        };

        let encoded = match bincode::serde::encode_to_vec(&event, bincode::config::standard()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to encode audit event: {}", e);
                return;
            }
        };

        // Zero-padded nanos keep keys in chronological byte order.
        let nanos = event.timestamp.timestamp_nanos_opt().unwrap_or(0);
        let key = format!("{user_id}:{nanos:019}").into_bytes();

        let db = self.audit_db.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = db.put(&key, &encoded) {
                tracing::error!("Failed to persist audit log: {}", e);
            }
        });
    }

    /// Audit trail for one user, newest first.
    pub fn get_audit_logs(&self, user_id: &str, limit: usize) -> Vec<AuditEvent> {
        let prefix = format!("{user_id}:");
        let mut events = Vec::new();

        for (key, value) in self.audit_db.prefix_iterator(prefix.as_bytes()).flatten() {
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            if let Ok((event, _)) = bincode::serde::decode_from_slice::<AuditEvent, _>(
                &value,
                bincode::config::standard(),
            ) {
                events.push(event);
            }
        }

        // Keys iterate oldest-to-newest
        events.reverse();
        events.truncate(limit);
        events
    }

    /// Flush every RocksDB handle so a shutdown loses nothing.
    pub fn flush_all_databases(&self) -> Result<()> {
        info!("Flushing databases before shutdown...");

        self.audit_db
            .flush()
            .map_err(|e| anyhow::anyhow!("Audit database flush failed: {e}"))?;
        info!("  Audit database flushed");

        if let Err(e) = self.task_store.flush() {
            tracing::warn!("  Failed to flush task store: {}", e);
        } else {
            info!("  Task store flushed");
        }

        if let Err(e) = self.conversation_store.flush() {
            tracing::warn!("  Failed to flush conversation store: {}", e);
        } else {
            info!("  Conversation store flushed");
        }

        info!("All databases flushed: audit, tasks, conversations");

        Ok(())
    }

    /// Drops audit entries past the retention window and trims each user to
    /// the configured cap. One full scan, one batched delete.
    fn prune_audit_logs(&self) -> Result<usize> {
        let retention = chrono::Duration::days(self.server_config.audit_retention_days as i64);
        let cutoff = (chrono::Utc::now() - retention)
            .timestamp_nanos_opt()
            .unwrap_or(0);
        let cap = self.server_config.audit_max_entries_per_user;

        // User IDs never contain ':', so the last separator splits cleanly.
        let mut per_user: HashMap<String, Vec<(Box<[u8]>, i64)>> = HashMap::new();
        for (key, _) in self
            .audit_db
            .iterator(rocksdb::IteratorMode::Start)
            .flatten()
        {
            let (user, stamp) = {
                let Ok(text) = std::str::from_utf8(&key) else {
                    continue;
                };
                let Some((user, nanos)) = text.rsplit_once(':') else {
                    continue;
                };
                (user.to_string(), nanos.parse::<i64>().unwrap_or(0))
            };
            per_user.entry(user).or_default().push((key, stamp));
        }

        let mut batch = rocksdb::WriteBatch::default();
        let mut removed = 0usize;
        for entries in per_user.values() {
            // Entries are chronological; everything before this index is
            // over the per-user cap.
            let cap_start = entries.len().saturating_sub(cap);
            for (idx, (key, stamp)) in entries.iter().enumerate() {
                if *stamp < cutoff || idx < cap_start {
                    batch.delete(key);
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            self.audit_db
                .write(batch)
                .map_err(|e| anyhow::anyhow!("Audit prune batch failed: {e}"))?;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn services_in(dir: &TempDir) -> AppServices {
        AppServices::new(dir.path().to_path_buf(), ServerConfig::default())
            .unwrap_or_else(|e| panic!("failed to build services: {e}"))
    }

    /// The persistent write runs on a blocking task; give it a moment.
    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn log_event_is_readable_back() {
        let dir = TempDir::new().unwrap();
        let services = services_in(&dir);

        services.log_event("alice", "TASK_CREATE", "1", "Created task 'buy milk'");
        services.log_event("alice", "TASK_DELETE", "1", "Deleted task 1");

        settle().await;
        let events = services.get_audit_logs("alice", 10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "TASK_DELETE");
        assert_eq!(events[1].event_type, "TASK_CREATE");
    }

    #[tokio::test]
    async fn audit_logs_are_per_user() {
        let dir = TempDir::new().unwrap();
        let services = services_in(&dir);

        services.log_event("alice", "TASK_CREATE", "1", "Created");
        services.log_event("bob", "TASK_CREATE", "2", "Created");

        settle().await;
        let alice = services.get_audit_logs("alice", 10);
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].task_id, "1");
    }

    #[tokio::test]
    async fn prune_enforces_per_user_cap() {
        let dir = TempDir::new().unwrap();
        let mut config = ServerConfig::default();
        config.audit_max_entries_per_user = 3;
        let services = AppServices::new(dir.path().to_path_buf(), config).unwrap();

        for i in 0..5 {
            services.log_event("alice", "TASK_CREATE", &i.to_string(), "Created");
        }

        settle().await;
        assert_eq!(services.prune_audit_logs().unwrap(), 2);

        let events = services.get_audit_logs("alice", 10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].task_id, "4");
        assert_eq!(events[2].task_id, "2");
    }

    #[tokio::test]
    async fn prune_drops_expired_entries() {
        let dir = TempDir::new().unwrap();
        let services = services_in(&dir);

        let old_time = chrono::Utc::now() - chrono::Duration::days(90);
        let stale = AuditEvent {
            timestamp: old_time,
            event_type: "TASK_CREATE".to_string(),
            task_id: "1".to_string(),
            details: "Created long ago".to_string(),
        };
        let key = format!(
            "alice:{:019}",
            old_time.timestamp_nanos_opt().unwrap_or(0)
        );
        let encoded =
            bincode::serde::encode_to_vec(&stale, bincode::config::standard()).unwrap();
        services.audit_db.put(key.as_bytes(), &encoded).unwrap();

        services.log_event("alice", "TASK_CREATE", "2", "Created just now");
        settle().await;

        assert_eq!(services.prune_audit_logs().unwrap(), 1);
        let events = services.get_audit_logs("alice", 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].task_id, "2");
    }
}

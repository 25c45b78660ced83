//! Task storage backed by RocksDB
//!
//! Keys are `{user_id}:{task_id}` with the numeric part zero-padded to ten
//! digits, so a prefix scan over `{user_id}:` yields a user's tasks in
//! ascending ID order. IDs come from a single monotonic counter persisted
//! under a meta key, which keeps them unique across all users the way an
//! autoincrement primary key would.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::record_db_op;

/// A single todo item owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a task that can change after creation. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

const NEXT_ID_KEY: &[u8] = b"__meta:next_task_id";

// ============================================================================
// TASK STORE
// ============================================================================

pub struct TaskStore {
    db: Arc<DB>,
    next_id: Mutex<i64>,
}

impl TaskStore {
    pub fn new(storage_path: &Path) -> Result<Self> {
        let tasks_path = storage_path.join("tasks");
        std::fs::create_dir_all(&tasks_path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_max_write_buffer_number(2);
        opts.set_write_buffer_size(32 * 1024 * 1024); // 32MB

        let db = Arc::new(DB::open(&opts, &tasks_path).context("Failed to open tasks DB")?);

        let next_id = match db.get(NEXT_ID_KEY)? {
            Some(raw) => String::from_utf8_lossy(&raw)
                .parse::<i64>()
                .map_err(|_| anyhow!("Corrupt task ID counter"))?,
            None => 1,
        };

        tracing::info!(next_task_id = next_id, "Task store initialized");

        Ok(Self {
            db,
            next_id: Mutex::new(next_id),
        })
    }

    fn task_key(user_id: &str, task_id: i64) -> String {
        format!("{}:{:010}", user_id, task_id)
    }

    /// Allocate the next task ID. The counter is persisted before the in-memory
    /// value advances, so a failed write never burns an ID.
    fn allocate_id(&self) -> Result<i64> {
        let mut guard = self.next_id.lock();
        let id = *guard;
        self.db
            .put(NEXT_ID_KEY, (id + 1).to_string().as_bytes())
            .context("Failed to persist task ID counter")?;
        *guard = id + 1;
        Ok(id)
    }

    fn put_task(&self, task: &Task) -> Result<()> {
        let key = Self::task_key(&task.user_id, task.id);
        let value = serde_json::to_vec(task).context("Failed to serialize task")?;
        let start = Instant::now();
        let res = self.db.put(key.as_bytes(), &value);
        record_db_op("put", start, res.is_ok());
        res.context("Failed to store task")?;
        Ok(())
    }

    pub fn create_task(&self, user_id: &str, title: &str, description: Option<String>) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: self.allocate_id()?,
            user_id: user_id.to_string(),
            title: title.to_string(),
            description,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.put_task(&task)?;

        tracing::debug!(task_id = task.id, user_id = %task.user_id, "Created task");
        Ok(task)
    }

    pub fn get_task(&self, user_id: &str, task_id: i64) -> Result<Option<Task>> {
        let key = Self::task_key(user_id, task_id);
        let start = Instant::now();
        let res = self.db.get(key.as_bytes());
        record_db_op("get", start, res.is_ok());

        match res? {
            Some(value) => {
                let task = serde_json::from_slice(&value).context("Failed to deserialize task")?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// List a user's tasks in ascending ID order, optionally filtered by
    /// completion state.
    pub fn list_tasks(&self, user_id: &str, completed: Option<bool>) -> Result<Vec<Task>> {
        let prefix = format!("{}:", user_id);
        let mut tasks = Vec::new();

        let start = Instant::now();
        let iter = self.db.prefix_iterator(prefix.as_bytes());
        for item in iter {
            let (key, value) = item?;
            let key_str = String::from_utf8_lossy(&key);
            if !key_str.starts_with(&prefix) {
                break;
            }
            // Skip anything whose suffix is not a numeric task ID, such as
            // the counter key when a user is literally named "__meta".
            let id_part = &key_str[prefix.len()..];
            if id_part.is_empty() || !id_part.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }

            let task: Task = serde_json::from_slice(&value).context("Failed to deserialize task")?;
            if let Some(want) = completed {
                if task.completed != want {
                    continue;
                }
            }
            tasks.push(task);
        }
        record_db_op("scan", start, true);

        tracing::debug!(user_id = %user_id, count = tasks.len(), "Listed tasks");
        Ok(tasks)
    }

    /// Apply a patch to a task. Returns the updated task, or `None` when the
    /// user has no task with that ID. Any change touches `updated_at`.
    pub fn update_task(&self, user_id: &str, task_id: i64, patch: TaskPatch) -> Result<Option<Task>> {
        let Some(mut task) = self.get_task(user_id, task_id)? else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        task.updated_at = Utc::now();
        self.put_task(&task)?;

        tracing::debug!(task_id = task.id, user_id = %task.user_id, "Updated task");
        Ok(Some(task))
    }

    /// Set the completion flag to an explicit value. This is not a toggle:
    /// completing an already-completed task is a no-op that still refreshes
    /// `updated_at`.
    pub fn set_completed(&self, user_id: &str, task_id: i64, completed: bool) -> Result<Option<Task>> {
        self.update_task(
            user_id,
            task_id,
            TaskPatch {
                completed: Some(completed),
                ..Default::default()
            },
        )
    }

    /// Delete a task. Returns `false` when the user has no task with that ID.
    pub fn delete_task(&self, user_id: &str, task_id: i64) -> Result<bool> {
        if self.get_task(user_id, task_id)?.is_none() {
            return Ok(false);
        }

        let key = Self::task_key(user_id, task_id);
        let start = Instant::now();
        let res = self.db.delete(key.as_bytes());
        record_db_op("delete", start, res.is_ok());
        res.context("Failed to delete task")?;

        tracing::debug!(task_id = task_id, user_id = %user_id, "Deleted task");
        Ok(true)
    }

    /// Total number of stored tasks across all users. Full scan; used by the
    /// health endpoint only.
    pub fn count_tasks(&self) -> usize {
        self.db
            .iterator(rocksdb::IteratorMode::Start)
            .flatten()
            .filter(|(key, _)| !key.starts_with(b"__meta"))
            .count()
    }

    /// Flush memtables to disk. Called on graceful shutdown.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().context("Failed to flush tasks DB")?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

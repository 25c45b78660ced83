//! Task operation dispatcher
//!
//! Maps detected intents and confirmed pending operations onto the task
//! store, wrapping every outcome in a structured result the agent can
//! format. Ownership is enforced here: operations against another user's
//! task report not-found rather than leaking its existence.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics;
use crate::storage::{Task, TaskPatch, TaskStore};

use super::confirmation::PendingOperation;
use super::intent::{Intent, StatusFilter};

/// Structured outcome of a dispatched operation.
#[derive(Debug, Clone)]
pub enum OperationResult {
    Completed {
        message: Option<String>,
        task: Option<Task>,
        tasks: Option<Vec<Task>>,
    },
    Failed {
        message: String,
    },
    NeedsConfirmation {
        task_id: i64,
        title: String,
        message: String,
    },
}

impl OperationResult {
    fn metric_label(&self) -> &'static str {
        match self {
            OperationResult::Completed { .. } => "success",
            OperationResult::Failed { .. } => "failure",
            OperationResult::NeedsConfirmation { .. } => "confirmation_required",
        }
    }
}

pub struct Dispatcher {
    tasks: Arc<TaskStore>,
}

impl Dispatcher {
    pub fn new(tasks: Arc<TaskStore>) -> Self {
        Self { tasks }
    }

    /// Execute a freshly detected intent. Destructive operations run
    /// unconfirmed, so a delete comes back as `NeedsConfirmation` first.
    pub fn execute_intent(&self, user_id: &str, intent: &Intent) -> Result<OperationResult> {
        match intent {
            Intent::AddTask { title, description } => {
                self.add_task(user_id, title, Some(description.clone()))
            }
            Intent::ListTasks { status } => self.list_tasks(user_id, *status),
            Intent::CompleteTask { task_id } => self.complete_task(user_id, *task_id, true),
            Intent::UpdateTask {
                task_id,
                title,
                description,
            } => self.update_task(
                user_id,
                *task_id,
                Some(title.clone()),
                Some(description.clone()),
                None,
            ),
            Intent::DeleteTask { task_id } => self.delete_task(user_id, *task_id, false),
            Intent::ConfirmDestructiveAction | Intent::Unknown => {
                Ok(Self::unrecognized_operation())
            }
        }
    }

    /// Execute an operation taken from the confirmation tracker.
    pub fn execute_confirmed(
        &self,
        user_id: &str,
        pending: &PendingOperation,
    ) -> Result<OperationResult> {
        match pending.operation.as_str() {
            "delete_task" => self.delete_task(user_id, pending.task_id, true),
            "complete_task" => self.complete_task(user_id, pending.task_id, true),
            "update_task" => self.update_task(user_id, pending.task_id, None, None, None),
            _ => Ok(Self::unrecognized_operation()),
        }
    }

    pub fn add_task(
        &self,
        user_id: &str,
        title: &str,
        description: Option<String>,
    ) -> Result<OperationResult> {
        let started = Instant::now();
        let task = self.tasks.create_task(user_id, title, description)?;
        let result = OperationResult::Completed {
            message: Some(format!("Task '{}' has been added successfully", task.title)),
            task: Some(task),
            tasks: None,
        };
        record_operation("add_task", &result, started);
        Ok(result)
    }

    pub fn list_tasks(
        &self,
        user_id: &str,
        status: Option<StatusFilter>,
    ) -> Result<OperationResult> {
        let started = Instant::now();
        let completed = status.map(|s| s.completed_value());
        let tasks = self.tasks.list_tasks(user_id, completed)?;

        let status_desc = match status {
            Some(status) => format!(" ({})", status.as_str()),
            None => String::new(),
        };
        let plural = if tasks.len() == 1 { "" } else { "s" };
        let message = format!("You have {} task{}{}", tasks.len(), status_desc, plural);

        let result = OperationResult::Completed {
            message: Some(message),
            task: None,
            tasks: Some(tasks),
        };
        record_operation("list_tasks", &result, started);
        Ok(result)
    }

    pub fn complete_task(
        &self,
        user_id: &str,
        task_id: i64,
        completed: bool,
    ) -> Result<OperationResult> {
        let started = Instant::now();
        let result = match self.tasks.set_completed(user_id, task_id, completed)? {
            Some(task) => {
                let state = if completed { "completed" } else { "marked as pending" };
                OperationResult::Completed {
                    message: Some(format!(
                        "Task '{}' has been {} successfully",
                        task.title, state
                    )),
                    task: Some(task),
                    tasks: None,
                }
            }
            None => Self::not_found(task_id),
        };
        record_operation("complete_task", &result, started);
        Ok(result)
    }

    pub fn update_task(
        &self,
        user_id: &str,
        task_id: i64,
        title: Option<String>,
        description: Option<String>,
        completed: Option<bool>,
    ) -> Result<OperationResult> {
        let started = Instant::now();
        let patch = TaskPatch {
            title,
            description,
            completed,
        };
        let result = match self.tasks.update_task(user_id, task_id, patch)? {
            Some(task) => OperationResult::Completed {
                message: Some(format!("Task '{}' has been updated successfully", task.title)),
                task: Some(task),
                tasks: None,
            },
            None => Self::not_found(task_id),
        };
        record_operation("update_task", &result, started);
        Ok(result)
    }

    pub fn delete_task(
        &self,
        user_id: &str,
        task_id: i64,
        confirmed: bool,
    ) -> Result<OperationResult> {
        let started = Instant::now();
        let result = match self.tasks.get_task(user_id, task_id)? {
            None => Self::not_found(task_id),
            Some(task) if !confirmed => OperationResult::NeedsConfirmation {
                task_id,
                title: task.title.clone(),
                message: format!(
                    "Are you sure you want to delete task '{}'? This action cannot be undone. \
                     Please confirm the deletion.",
                    task.title
                ),
            },
            Some(task) => {
                self.tasks.delete_task(user_id, task_id)?;
                OperationResult::Completed {
                    message: Some(format!("Task '{}' has been deleted successfully", task.title)),
                    task: None,
                    tasks: None,
                }
            }
        };
        record_operation("delete_task", &result, started);
        Ok(result)
    }

    /// Reply for operation names the dispatcher does not recognize, including
    /// a confirmation arriving with nothing pending.
    pub fn unrecognized_operation() -> OperationResult {
        OperationResult::Completed {
            message: Some(
                "I'm not sure how to handle that request. I can help you with tasks like \
                 adding, listing, completing, updating, or deleting tasks. For example, you \
                 can say 'Add a task to buy groceries' or 'Show my tasks'."
                    .to_string(),
            ),
            task: None,
            tasks: None,
        }
    }

    fn not_found(task_id: i64) -> OperationResult {
        OperationResult::Failed {
            message: format!("Task with ID {} not found or does not belong to you", task_id),
        }
    }
}

fn record_operation(operation: &str, result: &OperationResult, started: Instant) {
    metrics::TASK_OPS_TOTAL
        .with_label_values(&[operation, result.metric_label()])
        .inc();
    metrics::TASK_OPS_DURATION
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TaskStore;
    use tempfile::TempDir;

    fn setup_dispatcher() -> (Dispatcher, Arc<TaskStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(TaskStore::new(temp_dir.path()).unwrap());
        (Dispatcher::new(store.clone()), store, temp_dir)
    }

    fn message_of(result: &OperationResult) -> &str {
        match result {
            OperationResult::Completed { message, .. } => message.as_deref().unwrap_or(""),
            OperationResult::Failed { message } => message,
            OperationResult::NeedsConfirmation { message, .. } => message,
        }
    }

    #[test]
    fn test_add_task_reply() {
        let (dispatcher, _store, _dir) = setup_dispatcher();

        let result = dispatcher
            .add_task("alice", "buy groceries", Some("buy groceries".to_string()))
            .unwrap();

        assert_eq!(
            message_of(&result),
            "Task 'buy groceries' has been added successfully"
        );
        match result {
            OperationResult::Completed { task: Some(task), .. } => {
                assert_eq!(task.title, "buy groceries");
                assert!(!task.completed);
            }
            other => panic!("expected Completed with task, got {:?}", other),
        }
    }

    #[test]
    fn test_list_tasks_count_wording() {
        let (dispatcher, _store, _dir) = setup_dispatcher();

        let empty = dispatcher.list_tasks("alice", None).unwrap();
        assert_eq!(message_of(&empty), "You have 0 tasks");

        dispatcher.add_task("alice", "one", None).unwrap();
        let single = dispatcher.list_tasks("alice", None).unwrap();
        assert_eq!(message_of(&single), "You have 1 task");

        dispatcher.add_task("alice", "two", None).unwrap();
        let pair = dispatcher.list_tasks("alice", None).unwrap();
        assert_eq!(message_of(&pair), "You have 2 tasks");

        // The filter description sits between the noun and the plural marker.
        let filtered = dispatcher
            .list_tasks("alice", Some(StatusFilter::Pending))
            .unwrap();
        assert_eq!(message_of(&filtered), "You have 2 task (pending)s");

        dispatcher.complete_task("alice", 1, true).unwrap();
        let completed = dispatcher
            .list_tasks("alice", Some(StatusFilter::Completed))
            .unwrap();
        assert_eq!(message_of(&completed), "You have 1 task (completed)");
    }

    #[test]
    fn test_list_tasks_filters_results() {
        let (dispatcher, _store, _dir) = setup_dispatcher();

        dispatcher.add_task("alice", "one", None).unwrap();
        dispatcher.add_task("alice", "two", None).unwrap();
        dispatcher.complete_task("alice", 2, true).unwrap();

        let pending = dispatcher
            .list_tasks("alice", Some(StatusFilter::Pending))
            .unwrap();
        match pending {
            OperationResult::Completed { tasks: Some(tasks), .. } => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(tasks[0].title, "one");
            }
            other => panic!("expected Completed with tasks, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_task_wording() {
        let (dispatcher, _store, _dir) = setup_dispatcher();

        dispatcher.add_task("alice", "laundry", None).unwrap();

        let done = dispatcher.complete_task("alice", 1, true).unwrap();
        assert_eq!(
            message_of(&done),
            "Task 'laundry' has been completed successfully"
        );

        let reopened = dispatcher.complete_task("alice", 1, false).unwrap();
        assert_eq!(
            message_of(&reopened),
            "Task 'laundry' has been marked as pending successfully"
        );
    }

    #[test]
    fn test_missing_task_reports_not_found() {
        let (dispatcher, _store, _dir) = setup_dispatcher();

        let result = dispatcher.complete_task("alice", 42, true).unwrap();
        assert!(matches!(result, OperationResult::Failed { .. }));
        assert_eq!(
            message_of(&result),
            "Task with ID 42 not found or does not belong to you"
        );
    }

    #[test]
    fn test_cross_user_access_reports_not_found() {
        let (dispatcher, _store, _dir) = setup_dispatcher();

        dispatcher.add_task("alice", "private", None).unwrap();

        let complete = dispatcher.complete_task("bob", 1, true).unwrap();
        assert!(matches!(complete, OperationResult::Failed { .. }));

        let delete = dispatcher.delete_task("bob", 1, true).unwrap();
        assert!(matches!(delete, OperationResult::Failed { .. }));

        // Alice's task is untouched.
        let listed = dispatcher.list_tasks("alice", None).unwrap();
        match listed {
            OperationResult::Completed { tasks: Some(tasks), .. } => assert_eq!(tasks.len(), 1),
            other => panic!("expected Completed with tasks, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_requires_confirmation_first() {
        let (dispatcher, store, _dir) = setup_dispatcher();

        dispatcher.add_task("alice", "old notes", None).unwrap();

        let result = dispatcher.delete_task("alice", 1, false).unwrap();
        match &result {
            OperationResult::NeedsConfirmation { task_id, title, message } => {
                assert_eq!(*task_id, 1);
                assert_eq!(title, "old notes");
                assert_eq!(
                    message,
                    "Are you sure you want to delete task 'old notes'? This action cannot \
                     be undone. Please confirm the deletion."
                );
            }
            other => panic!("expected NeedsConfirmation, got {:?}", other),
        }

        // Nothing was deleted yet.
        assert!(store.get_task("alice", 1).unwrap().is_some());

        let confirmed = dispatcher.delete_task("alice", 1, true).unwrap();
        assert_eq!(
            message_of(&confirmed),
            "Task 'old notes' has been deleted successfully"
        );
        assert!(store.get_task("alice", 1).unwrap().is_none());
    }

    #[test]
    fn test_execute_confirmed_delete() {
        let (dispatcher, store, _dir) = setup_dispatcher();

        dispatcher.add_task("alice", "doomed", None).unwrap();
        let pending = PendingOperation {
            operation: "delete_task".to_string(),
            task_id: 1,
            original_message: "delete task 1".to_string(),
        };

        let result = dispatcher.execute_confirmed("alice", &pending).unwrap();
        assert_eq!(
            message_of(&result),
            "Task 'doomed' has been deleted successfully"
        );
        assert!(store.get_task("alice", 1).unwrap().is_none());
    }

    #[test]
    fn test_unrecognized_operation_reply() {
        let (dispatcher, _store, _dir) = setup_dispatcher();

        let result = dispatcher
            .execute_intent("alice", &Intent::ConfirmDestructiveAction)
            .unwrap();
        assert!(message_of(&result).starts_with("I'm not sure how to handle that request."));
    }

    #[test]
    fn test_execute_intent_update_sets_title_and_description() {
        let (dispatcher, store, _dir) = setup_dispatcher();

        dispatcher.add_task("alice", "old title", None).unwrap();
        let intent = Intent::UpdateTask {
            task_id: 1,
            title: "buy milk".to_string(),
            description: "buy milk and eggs".to_string(),
        };

        let result = dispatcher.execute_intent("alice", &intent).unwrap();
        assert_eq!(
            message_of(&result),
            "Task 'buy milk' has been updated successfully"
        );

        let task = store.get_task("alice", 1).unwrap().unwrap();
        assert_eq!(task.title, "buy milk");
        assert_eq!(task.description.as_deref(), Some("buy milk and eggs"));
    }
}

//! Rule-based intent detection for task phrases
//!
//! Each operation owns an ordered list of patterns, tried against the
//! lowercased message in priority order: add, list, complete, update,
//! delete. The first pattern whose captures also extract cleanly wins; a
//! pattern that matches but yields an unusable capture (a non-numeric task
//! ID, for instance) falls through to the remaining patterns rather than
//! failing. A message that survives every pattern is `Unknown` and is
//! handed to the LLM fallback by the agent.

use regex::Regex;

use crate::storage::MessageRole;

/// Words that, combined with a confirmation prompt in the previous message,
/// short-circuit detection into `ConfirmDestructiveAction`.
const CONFIRMATION_KEYWORDS: [&str; 9] = [
    "yes",
    "confirm",
    "ok",
    "okay",
    "sure",
    "delete",
    "go ahead",
    "proceed",
    "affirmative",
];

const PENDING_STATUS_WORDS: [&str; 4] = ["pending", "incomplete", "open", "remaining"];
const COMPLETED_STATUS_WORDS: [&str; 4] = ["completed", "done", "finished", "closed"];

/// Longest title kept when a free-text capture becomes a task title.
pub const TITLE_CAPTURE_LIMIT: usize = 50;

/// A prior message handed to the detector and the LLM prompt builder.
#[derive(Debug, Clone)]
pub struct ContextMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Completion-state filter extracted from a list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Pending => "pending",
            StatusFilter::Completed => "completed",
        }
    }

    /// The `completed` flag value this filter selects for.
    pub fn completed_value(&self) -> bool {
        matches!(self, StatusFilter::Completed)
    }
}

/// A detected operation with its extracted parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    AddTask { title: String, description: String },
    ListTasks { status: Option<StatusFilter> },
    CompleteTask { task_id: i64 },
    UpdateTask { task_id: i64, title: String, description: String },
    DeleteTask { task_id: i64 },
    ConfirmDestructiveAction,
    Unknown,
}

impl Intent {
    /// Stable operation name used for dispatch records and metric labels.
    pub fn operation(&self) -> &'static str {
        match self {
            Intent::AddTask { .. } => "add_task",
            Intent::ListTasks { .. } => "list_tasks",
            Intent::CompleteTask { .. } => "complete_task",
            Intent::UpdateTask { .. } => "update_task",
            Intent::DeleteTask { .. } => "delete_task",
            Intent::ConfirmDestructiveAction => "confirm_destructive_action",
            Intent::Unknown => "unknown",
        }
    }
}

/// Compiled patterns for every operation.
pub struct IntentDetector {
    add_task: Vec<Regex>,
    list_tasks: Vec<Regex>,
    complete_task: Vec<Regex>,
    update_task: Vec<Regex>,
    delete_task: Vec<Regex>,
    filler_prefix: Regex,
}

impl Default for IntentDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentDetector {
    pub fn new() -> Self {
        Self {
            add_task: compile(&[
                r"(?:add|create|make|new|add a|create a|make a|new)\s+(?:task|to-do|todo|item)\s+(?:to|for)?\s*(.+)",
                r"(?:add|create|make|new)\s+(.+)\s+(?:as a|as|to my)\s+(?:task|to-do|todo|item)",
                r"(?:remind me|remember|note|keep track of)\s+(.+)",
                r"(?:i need to|i have to|must|should)\s+(.+)",
            ]),
            list_tasks: compile(&[
                r"(?:show|list|display|get|fetch|see|view)\s+(?:my\s+)?(?:tasks|todos|to-dos|to dos|items|list)",
                r"(?:what|show|list|display|get|fetch|see|view)\s+(?:have i got|do i have|are my|is my|are there any|is there any)\s*(?:pending|completed|done|all)?\s*(?:tasks|todos|to-dos|to dos|items)",
                r"(?:pending|incomplete|open|remaining)\s+(?:tasks|todos|to-dos|to dos|items)",
                r"(?:completed|done|finished|closed)\s+(?:tasks|todos|to-dos|to dos|items)",
                r"(?:what's|what is)\s+(?:on|in)\s+(?:my\s+)?(?:list|todo|to-do|tasks)",
            ]),
            complete_task: compile(&[
                r"(?:complete|finish|done|mark as done|check off|tick off)\s+(?:task|item)?\s*(?:number|#)?\s*(\d+)",
                r"(?:mark|set|make)\s+(?:task|item)?\s*(?:number|#)?\s*(\d+)\s+(?:as\s+)?(?:complete|finished|done)",
                r"(?:complete|finish|done)\s+(?:the\s+)?(.+?)\s+(?:task|item)",
                r"(\d+)\s+(?:is\s+)?(?:complete|done|finished)",
            ]),
            update_task: compile(&[
                r"(?:update|change|modify|edit|rename)\s+(?:task|item)?\s*(?:number|#)?\s*(\d+)\s+(?:to|as|with)\s+(.+)",
                r"(?:change|update|modify|edit)\s+(?:the\s+)?(.+?)\s+(?:task|item)\s+(?:to|as|with)\s+(.+)",
                r"(?:update|change|modify|edit)\s+(?:task|item)?\s*(?:number|#)?\s*(\d+)\s+(?:title|name|description)\s+(?:to|as)\s+(.+)",
            ]),
            delete_task: compile(&[
                r"(?:delete|remove|eliminate|get rid of|trash|discard)\s+(?:task|item)?\s*(?:number|#)?\s*(\d+)",
                r"(?:delete|remove|eliminate|get rid of|trash|discard)\s+(?:the\s+)?(.+?)\s+(?:task|item)",
                r"(?:remove|delete)\s+(?:task|item)?\s*(?:number|#)?\s*(\d+)\s+(?:from|off)\s+(?:my\s+)?(?:list|tasks|todos)",
            ]),
            filler_prefix: Regex::new(r"^(?:to|that i need to|that i have to|to go and|just)\s+")
                .unwrap(),
        }
    }

    /// Classify a message, using prior messages to recognize confirmations.
    pub fn detect(&self, text: &str, context: &[ContextMessage]) -> Intent {
        let lowered = text.to_lowercase();
        let text = lowered.trim();

        // A short reply like "yes" right after a confirmation prompt is a
        // confirmation, not a new request.
        if let Some(last) = context.last() {
            if last.content.to_lowercase().contains("confirm")
                && CONFIRMATION_KEYWORDS.iter().any(|k| text.contains(k))
            {
                return Intent::ConfirmDestructiveAction;
            }
        }

        for pattern in &self.add_task {
            if let Some(caps) = pattern.captures(text) {
                let captured = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                let description = self.filler_prefix.replace(captured, "").into_owned();
                return Intent::AddTask {
                    title: truncate_chars(&description, TITLE_CAPTURE_LIMIT),
                    description,
                };
            }
        }

        for pattern in &self.list_tasks {
            if pattern.is_match(text) {
                return Intent::ListTasks {
                    status: status_from_text(text),
                };
            }
        }

        for pattern in &self.complete_task {
            if let Some(caps) = pattern.captures(text) {
                if let Some(task_id) = numeric_capture(&caps) {
                    return Intent::CompleteTask { task_id };
                }
            }
        }

        for pattern in &self.update_task {
            if let Some(caps) = pattern.captures(text) {
                let (Some(id_match), Some(content_match)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                if let Ok(task_id) = id_match.as_str().parse::<i64>() {
                    let content = content_match.as_str();
                    return Intent::UpdateTask {
                        task_id,
                        title: truncate_chars(content, TITLE_CAPTURE_LIMIT),
                        description: content.to_string(),
                    };
                }
            }
        }

        for pattern in &self.delete_task {
            if let Some(caps) = pattern.captures(text) {
                if let Some(task_id) = numeric_capture(&caps) {
                    return Intent::DeleteTask { task_id };
                }
            }
        }

        Intent::Unknown
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

/// Parse capture group 1 as a task ID. Free-text captures and numbers too
/// large for an ID come back as `None` so the caller can keep matching.
fn numeric_capture(caps: &regex::Captures<'_>) -> Option<i64> {
    caps.get(1)?.as_str().parse::<i64>().ok()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn status_from_text(text: &str) -> Option<StatusFilter> {
    if PENDING_STATUS_WORDS.iter().any(|w| text.contains(w)) {
        Some(StatusFilter::Pending)
    } else if COMPLETED_STATUS_WORDS.iter().any(|w| text.contains(w)) {
        Some(StatusFilter::Completed)
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Intent {
        IntentDetector::new().detect(text, &[])
    }

    fn confirmation_context() -> Vec<ContextMessage> {
        vec![
            ContextMessage {
                role: MessageRole::User,
                content: "delete task 5".to_string(),
            },
            ContextMessage {
                role: MessageRole::Assistant,
                content: "Are you sure you want to delete task 'pay rent'? This action cannot \
                          be undone. Please confirm the deletion."
                    .to_string(),
            },
        ]
    }

    #[test]
    fn test_add_task_basic() {
        assert_eq!(
            detect("Add a task to buy groceries"),
            Intent::AddTask {
                title: "buy groceries".to_string(),
                description: "buy groceries".to_string(),
            }
        );
    }

    #[test]
    fn test_add_task_strips_filler_prefix() {
        assert_eq!(
            detect("remind me to call mom tomorrow"),
            Intent::AddTask {
                title: "call mom tomorrow".to_string(),
                description: "call mom tomorrow".to_string(),
            }
        );
    }

    #[test]
    fn test_add_task_obligation_phrasing() {
        assert_eq!(
            detect("I need to finish the quarterly report"),
            Intent::AddTask {
                title: "finish the quarterly report".to_string(),
                description: "finish the quarterly report".to_string(),
            }
        );
    }

    #[test]
    fn test_add_task_suffix_phrasing() {
        assert_eq!(
            detect("create finish slides as a task"),
            Intent::AddTask {
                title: "finish slides".to_string(),
                description: "finish slides".to_string(),
            }
        );
    }

    #[test]
    fn test_add_task_title_is_capped_prefix_of_description() {
        let long_errand = "pick up the dry cleaning before the shop closes and then swing by the pharmacy";
        let intent = detect(&format!("add a task to {}", long_errand));
        match intent {
            Intent::AddTask { title, description } => {
                assert_eq!(description, long_errand);
                assert_eq!(title.chars().count(), 50);
                assert!(description.starts_with(&title));
            }
            other => panic!("expected AddTask, got {:?}", other),
        }
    }

    #[test]
    fn test_list_tasks_plain() {
        assert_eq!(detect("show my tasks"), Intent::ListTasks { status: None });
        assert_eq!(detect("what's on my list"), Intent::ListTasks { status: None });
    }

    #[test]
    fn test_list_tasks_with_status() {
        assert_eq!(
            detect("Show my pending tasks"),
            Intent::ListTasks {
                status: Some(StatusFilter::Pending)
            }
        );
        assert_eq!(
            detect("completed tasks"),
            Intent::ListTasks {
                status: Some(StatusFilter::Completed)
            }
        );
        assert_eq!(
            detect("remaining items"),
            Intent::ListTasks {
                status: Some(StatusFilter::Pending)
            }
        );
    }

    #[test]
    fn test_complete_task_by_id() {
        assert_eq!(detect("Complete task 1"), Intent::CompleteTask { task_id: 1 });
        assert_eq!(detect("mark 3 as done"), Intent::CompleteTask { task_id: 3 });
        assert_eq!(detect("2 is done"), Intent::CompleteTask { task_id: 2 });
        assert_eq!(detect("tick off task #12"), Intent::CompleteTask { task_id: 12 });
    }

    #[test]
    fn test_complete_task_numeric_description() {
        // A digits-only description before "task" reads as an ID.
        assert_eq!(detect("finish the 7 task"), Intent::CompleteTask { task_id: 7 });
    }

    #[test]
    fn test_complete_task_wordy_falls_through_to_unknown() {
        assert_eq!(detect("finish the shopping task"), Intent::Unknown);
    }

    #[test]
    fn test_complete_task_overflowing_id_falls_through() {
        assert_eq!(detect("complete task 99999999999999999999"), Intent::Unknown);
    }

    #[test]
    fn test_update_task() {
        assert_eq!(
            detect("Update task 2 to buy milk and eggs"),
            Intent::UpdateTask {
                task_id: 2,
                title: "buy milk and eggs".to_string(),
                description: "buy milk and eggs".to_string(),
            }
        );
    }

    #[test]
    fn test_update_task_wordy_falls_through_to_unknown() {
        assert_eq!(detect("change the groceries task to shopping"), Intent::Unknown);
    }

    #[test]
    fn test_delete_task_by_id() {
        assert_eq!(detect("delete task 5"), Intent::DeleteTask { task_id: 5 });
        assert_eq!(detect("get rid of item 9"), Intent::DeleteTask { task_id: 9 });
    }

    #[test]
    fn test_delete_task_wordy_falls_through_to_unknown() {
        assert_eq!(detect("remove the groceries task"), Intent::Unknown);
    }

    #[test]
    fn test_unknown_text() {
        assert_eq!(detect("What's the weather like in Paris?"), Intent::Unknown);
    }

    #[test]
    fn test_confirmation_requires_prompt_in_last_message() {
        let detector = IntentDetector::new();

        assert_eq!(
            detector.detect("yes", &confirmation_context()),
            Intent::ConfirmDestructiveAction
        );
        assert_eq!(
            detector.detect("affirmative", &confirmation_context()),
            Intent::ConfirmDestructiveAction
        );

        // Without the prompt in context the same words are not confirmations.
        assert_eq!(detector.detect("yes", &[]), Intent::Unknown);
        assert_eq!(detect("ok"), Intent::Unknown);
    }

    #[test]
    fn test_confirmation_ignores_unrelated_reply() {
        let detector = IntentDetector::new();
        assert_eq!(
            detector.detect("never mind that", &confirmation_context()),
            Intent::Unknown
        );
    }

    #[test]
    fn test_add_has_priority_over_later_groups() {
        // "delete" also appears, but the add patterns run first.
        assert_eq!(
            detect("add a task to delete old backups"),
            Intent::AddTask {
                title: "delete old backups".to_string(),
                description: "delete old backups".to_string(),
            }
        );
    }

    #[test]
    fn test_detection_lowercases_captures() {
        assert_eq!(
            detect("Add a task to Call The Bank"),
            Intent::AddTask {
                title: "call the bank".to_string(),
                description: "call the bank".to_string(),
            }
        );
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Intent::Unknown.operation(), "unknown");
        assert_eq!(
            Intent::ConfirmDestructiveAction.operation(),
            "confirm_destructive_action"
        );
        assert_eq!(Intent::CompleteTask { task_id: 1 }.operation(), "complete_task");
    }
}

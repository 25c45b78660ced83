// Input validation helpers shared by the HTTP handlers and the chat agent.
// All validators return anyhow errors; handlers map them onto AppError with
// a field name via ValidationErrorExt.

use anyhow::{anyhow, Result};

/// Maximum allowed length for user IDs
pub const MAX_USER_ID_LENGTH: usize = 128;

/// Maximum allowed length for task titles
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum allowed length for task descriptions
pub const MAX_DESCRIPTION_LENGTH: usize = 5000;

/// Maximum allowed length for a single chat message
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Maximum allowed length for stored conversation message content
pub const MAX_MESSAGE_CONTENT_LENGTH: usize = 5000;

/// Validates a user ID: non-empty, bounded, restricted charset.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(anyhow!("User ID cannot be empty"));
    }

    if user_id.len() > MAX_USER_ID_LENGTH {
        return Err(anyhow!(
            "User ID too long: {} chars (max {})",
            user_id.len(),
            MAX_USER_ID_LENGTH
        ));
    }

    // Allow alphanumeric, dash, underscore, at-sign, dot (covers emails and
    // UUID-style IDs without opening the door to path separators).
    if !user_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.')
    {
        return Err(anyhow!(
            "User ID contains invalid characters (allowed: alphanumeric, -, _, @, .)"
        ));
    }

    Ok(())
}

/// Validates a task title: non-blank after trimming, at most 200 characters.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(anyhow!("Title must be between 1 and 200 characters"));
    }

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(anyhow!("Title must be between 1 and 200 characters"));
    }

    Ok(())
}

/// Validates an optional task description.
pub fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(anyhow!(
            "Description too long: {} chars (max {})",
            description.chars().count(),
            MAX_DESCRIPTION_LENGTH
        ));
    }

    Ok(())
}

/// Validates an inbound chat message. The stored copy is trimmed by the
/// caller; the length cap applies to the raw input.
pub fn validate_chat_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(anyhow!("Message cannot be empty"));
    }

    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(anyhow!("Message must be less than 2000 characters"));
    }

    Ok(())
}

/// Parses a task-list status filter into the completion flag the store
/// filters on. `all` (or absence) means no filter.
pub fn parse_status_filter(raw: &str) -> Result<Option<bool>> {
    match raw.to_lowercase().as_str() {
        "all" => Ok(None),
        "pending" => Ok(Some(false)),
        "completed" => Ok(Some(true)),
        _ => Err(anyhow!(
            "Status filter must be 'all', 'pending', or 'completed'"
        )),
    }
}

/// Validates a conversation ID is a well-formed UUID and returns it parsed.
pub fn validate_conversation_id(id: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(id).map_err(|_| anyhow!("Invalid conversation ID format"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_valid() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id("user-123").is_ok());
        assert!(validate_user_id("test_user").is_ok());
        assert!(validate_user_id("user@example.com").is_ok());
        assert!(validate_user_id("a.b.c").is_ok());
    }

    #[test]
    fn test_validate_user_id_invalid() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("user with spaces").is_err());
        assert!(validate_user_id("user/slash").is_err());
        assert!(validate_user_id("user:colon").is_err());
        assert!(validate_user_id(&"x".repeat(MAX_USER_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_user_id_at_limit() {
        assert!(validate_user_id(&"x".repeat(MAX_USER_ID_LENGTH)).is_ok());
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Buy groceries").is_ok());
        assert!(validate_title("x").is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH)).is_ok());

        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_description() {
        assert!(validate_description("").is_ok());
        assert!(validate_description("some details").is_ok());
        assert!(validate_description(&"x".repeat(MAX_DESCRIPTION_LENGTH)).is_ok());
        assert!(validate_description(&"x".repeat(MAX_DESCRIPTION_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_chat_message() {
        assert!(validate_chat_message("add a task to buy milk").is_ok());
        assert!(validate_chat_message("  trimmed  ").is_ok());
        assert!(validate_chat_message(&"x".repeat(MAX_MESSAGE_LENGTH)).is_ok());

        assert!(validate_chat_message("").is_err());
        assert!(validate_chat_message("   ").is_err());
        assert!(validate_chat_message(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(parse_status_filter("all").unwrap(), None);
        assert_eq!(parse_status_filter("pending").unwrap(), Some(false));
        assert_eq!(parse_status_filter("completed").unwrap(), Some(true));
        // Case-insensitive, matching the lowercase comparison on the route
        assert_eq!(parse_status_filter("Pending").unwrap(), Some(false));
        assert_eq!(parse_status_filter("COMPLETED").unwrap(), Some(true));

        assert!(parse_status_filter("done").is_err());
        assert!(parse_status_filter("").is_err());
    }

    #[test]
    fn test_validate_conversation_id() {
        assert!(validate_conversation_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_conversation_id("not-a-uuid").is_err());
        assert!(validate_conversation_id("").is_err());
    }
}

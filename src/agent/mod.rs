//! Natural-language task agent
//!
//! Raw text flows through intent detection into the operation dispatcher.
//! A confirmation tracker holds destructive operations across messages, and
//! anything the patterns miss falls back to the LLM or a canned reply.

pub mod chat;
pub mod confirmation;
pub mod dispatcher;
pub mod intent;

pub use chat::{AgentReply, ChatAgent};
pub use confirmation::{ConfirmationTracker, PendingOperation};
pub use dispatcher::{Dispatcher, OperationResult};
pub use intent::{ContextMessage, Intent, IntentDetector, StatusFilter};

//! TaskChat Library
//!
//! Conversational todo-list backend with per-user isolation.
//! Tasks are managed either through the REST API or through a natural
//! language chat interface backed by regex intent detection with an
//! LLM fallback for open-ended messages.
//!
//! # Key Features
//! - Per-user task CRUD over RocksDB embedded storage (no external database)
//! - Conversation history with persisted user/assistant messages
//! - Rule-based intent detection with confirmation flow for destructive ops
//! - Optional LLM fallback when no intent matches
//! - Full offline operation when no LLM key is configured

pub mod agent;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod middleware;
pub mod storage;
pub mod tracing_setup;
pub mod validation;

// Re-export dependencies to ensure tests/benchmarks use the same version
pub use chrono;
pub use parking_lot;
pub use uuid;

//! LLM access for free-form chat replies

pub mod client;

pub use client::{LlmClient, LlmReply};

//! HTTP API Handlers - Modular organization of the REST API
//!
//! This module contains all HTTP handlers, split by domain. Each submodule
//! handles a specific area of functionality.

// Core modules
pub mod router;
pub mod state;
pub mod types;

// Health and utilities
pub mod health;

// Task management
pub mod tasks;

// Conversational interface
pub mod chat;
pub mod conversations;

// Re-export commonly used items
pub use router::{build_protected_routes, build_public_routes, build_router, AppState};
pub use state::AppServices;
pub use types::*;

//! ExamFlow Common Library
//!
//! Shared code for the ExamFlow paper workflow service including:
//! - The workflow core: status machine, authorization gate, moderation
//!   log, attachment manager, change notifier and query service
//! - Persistence contract with Postgres and in-memory stores
//! - Blob storage for paper attachments
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod storage;
pub mod workflow;

// Re-export commonly used types
pub use auth::{Principal, Role};
pub use config::AppConfig;
pub use db::{InMemoryPaperStore, PaperStore, Repository};
pub use errors::{AppError, Result};
pub use workflow::{Action, Paper, PaperStatus, PaperWorkflow};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Core types and error definitions for the Taskor engine.
//!
//! This crate provides the foundational types shared across all Taskor
//! crates: the unified error enum, the task/result domain model, and the
//! backend descriptor catalog entry.
//!
//! # Main types
//!
//! - [`TaskorError`] — Unified error enum for all Taskor subsystems.
//! - [`TaskorResult`] — Convenience alias for `Result<T, TaskorError>`.
//! - [`Task`] — One unit of requested generation work.
//! - [`TaskResult`] — The terminal outcome of a task's attempt chain.
//! - [`BackendDescriptor`] — Identity and limits of one callable backend.

/// Backend descriptor and tier classification.
pub mod descriptor;
/// Task, task type, complexity, and result types.
pub mod task;

pub use descriptor::{BackendDescriptor, Tier};
pub use task::{Attempt, Complexity, Task, TaskResult, TaskType};

use std::time::Duration;

// --- Error types ---

/// Top-level error type for the Taskor engine.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskorError {
    /// An error in configuration or registration, including the case
    /// where no registered backend supports a requested task type.
    #[error("Config error: {0}")]
    Config(String),

    /// A single backend attempt failed (transport error, bad response,
    /// empty output). Recoverable by falling back to another backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// An error from an outbound HTTP request to a backend service.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A single attempt exceeded its per-backend timeout.
    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),

    /// The task-level deadline elapsed. Terminal for the whole task.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// An internal orchestration error (unregistered backend, closed
    /// load gate, and similar bookkeeping failures).
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`TaskorError`].
pub type TaskorResult<T> = Result<T, TaskorError>;

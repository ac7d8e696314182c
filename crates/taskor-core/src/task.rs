use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// The kind of generation work a task requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Decompose a goal into an ordered plan.
    Planning,
    /// Generate source code.
    Coding,
    /// Review existing code or text.
    Review,
    /// Write or extend tests.
    Testing,
    /// Diagnose and fix a reported defect.
    Debugging,
    /// Produce documentation.
    Documentation,
    /// Produce deployment configuration or instructions.
    Deployment,
}

impl TaskType {
    /// All task types, in declaration order.
    pub const ALL: [TaskType; 7] = [
        TaskType::Planning,
        TaskType::Coding,
        TaskType::Review,
        TaskType::Testing,
        TaskType::Debugging,
        TaskType::Documentation,
        TaskType::Deployment,
    ];
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Planning => write!(f, "planning"),
            TaskType::Coding => write!(f, "coding"),
            TaskType::Review => write!(f, "review"),
            TaskType::Testing => write!(f, "testing"),
            TaskType::Debugging => write!(f, "debugging"),
            TaskType::Documentation => write!(f, "documentation"),
            TaskType::Deployment => write!(f, "deployment"),
        }
    }
}

/// Caller-declared complexity of a task, used for tier preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Routine work — prefer fast, cheap backends.
    Simple,
    /// No tier preference.
    #[default]
    Medium,
    /// Demanding work — prefer the most capable backends.
    Complex,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// One unit of requested generation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier — caller-supplied or generated.
    pub id: String,
    /// The kind of work requested.
    pub task_type: TaskType,
    /// The prompt or instruction payload, opaque to the engine.
    pub payload: String,
    /// Declared complexity, used for backend tier preference.
    pub complexity: Complexity,
    /// Optional wall-clock budget for the whole attempt chain.
    pub deadline: Option<Duration>,
}

impl Task {
    /// Creates a task with a generated id and [`Complexity::Medium`].
    pub fn new(task_type: TaskType, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type,
            payload: payload.into(),
            complexity: Complexity::Medium,
            deadline: None,
        }
    }

    /// Sets a caller-supplied id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the declared complexity.
    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    /// Sets a wall-clock deadline for the whole attempt chain.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// One failed try within a task's fallback chain, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// The backend that was tried.
    pub backend_id: String,
    /// Why the attempt failed.
    pub error: String,
}

impl Attempt {
    /// Creates an attempt record.
    pub fn new(backend_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            error: error.into(),
        }
    }
}

/// The terminal outcome of a task's attempt chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The task this result belongs to.
    pub task_id: String,
    /// The backend that produced the output; `None` on total failure.
    pub backend_id: Option<String>,
    /// The generated output (empty on failure).
    pub output: String,
    /// Whether any attempt succeeded.
    pub success: bool,
    /// Heuristic quality estimate in `[0, 1]` (0.0 on failure).
    pub quality_score: f64,
    /// Latency of the successful attempt, or of the whole failed chain.
    pub latency: Duration,
    /// Every failed try, in the order it was made.
    pub attempts: Vec<Attempt>,
    /// Terminal error, populated iff `success` is false.
    pub error: Option<String>,
    /// UTC timestamp of when the chain finished.
    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    /// Creates a successful result.
    pub fn success(
        task_id: impl Into<String>,
        backend_id: impl Into<String>,
        output: impl Into<String>,
        quality_score: f64,
        latency: Duration,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            backend_id: Some(backend_id.into()),
            output: output.into(),
            success: true,
            quality_score,
            latency,
            attempts,
            error: None,
            finished_at: Utc::now(),
        }
    }

    /// Creates a failed result.
    pub fn failure(
        task_id: impl Into<String>,
        error: impl Into<String>,
        latency: Duration,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            backend_id: None,
            output: String::new(),
            success: false,
            quality_score: 0.0,
            latency,
            attempts,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }
}

use crate::task::TaskType;
use crate::{TaskorError, TaskorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse speed/quality classification of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Low latency, lower quality. Preferred for simple tasks.
    Fast,
    /// Middle ground.
    Balanced,
    /// Highest quality, slowest. Preferred for complex tasks.
    Powerful,
}

impl Tier {
    /// Default per-attempt timeout for backends of this tier.
    pub fn default_timeout(self) -> Duration {
        match self {
            Tier::Fast => Duration::from_secs(30),
            Tier::Balanced => Duration::from_secs(60),
            Tier::Powerful => Duration::from_secs(120),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Fast => write!(f, "fast"),
            Tier::Balanced => write!(f, "balanced"),
            Tier::Powerful => write!(f, "powerful"),
        }
    }
}

/// Identity, capabilities, and limits of one callable backend.
///
/// Loaded from static configuration at startup; backends discovered from
/// a live service may be appended at runtime. Immutable once registered
/// except `reliability`, which the performance ledger refreshes after
/// each recorded attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique backend identifier (model or service name).
    pub id: String,
    /// Speed/quality tier.
    pub tier: Tier,
    /// Task types this backend can execute. Must be non-empty.
    pub supported_task_types: Vec<TaskType>,
    /// Concurrency ceiling. Must be at least 1.
    pub max_concurrent: u32,
    /// Relative priority; higher is preferred.
    pub priority: i32,
    /// Relative cost weight, `>= 0`.
    pub cost_weight: f64,
    /// Initial reliability estimate in `[0, 1]`.
    pub reliability: f64,
    /// Per-backend attempt timeout override; the tier default applies
    /// when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl BackendDescriptor {
    /// Creates a descriptor with defaults: one concurrent slot,
    /// priority 0, cost weight 1.0, reliability 1.0, tier timeout.
    pub fn new(id: impl Into<String>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            tier,
            supported_task_types: Vec::new(),
            max_concurrent: 1,
            priority: 0,
            cost_weight: 1.0,
            reliability: 1.0,
            timeout_secs: None,
        }
    }

    /// Sets the supported task types.
    pub fn with_task_types(mut self, types: impl IntoIterator<Item = TaskType>) -> Self {
        self.supported_task_types = types.into_iter().collect();
        self
    }

    /// Sets the concurrency ceiling.
    pub fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the relative priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the relative cost weight.
    pub fn with_cost_weight(mut self, weight: f64) -> Self {
        self.cost_weight = weight;
        self
    }

    /// Sets a per-backend attempt timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Whether this backend can execute the given task type.
    pub fn supports(&self, task_type: TaskType) -> bool {
        self.supported_task_types.contains(&task_type)
    }

    /// Validates the descriptor invariants.
    pub fn validate(&self) -> TaskorResult<()> {
        if self.id.is_empty() {
            return Err(TaskorError::Config("backend id must not be empty".into()));
        }
        if self.supported_task_types.is_empty() {
            return Err(TaskorError::Config(format!(
                "backend '{}' must support at least one task type",
                self.id
            )));
        }
        if self.max_concurrent < 1 {
            return Err(TaskorError::Config(format!(
                "backend '{}' must allow at least one concurrent task",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.reliability) {
            return Err(TaskorError::Config(format!(
                "backend '{}' reliability {} out of [0, 1]",
                self.id, self.reliability
            )));
        }
        if self.cost_weight < 0.0 {
            return Err(TaskorError::Config(format!(
                "backend '{}' cost weight must be non-negative",
                self.id
            )));
        }
        Ok(())
    }
}

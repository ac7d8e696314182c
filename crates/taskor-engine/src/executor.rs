use crate::config::EngineConfig;
use crate::ledger::PerformanceLedger;
use crate::load::LoadTracker;
use crate::registry::RegisteredBackend;
use crate::scorer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskor_core::{Task, TaskorError, TaskorResult};
use tracing::{info, warn};

/// The outcome of one successful backend attempt.
#[derive(Debug, Clone)]
pub struct Execution {
    /// The backend's text output.
    pub output: String,
    /// Heuristic quality score of the output.
    pub quality_score: f64,
    /// Wall-clock time of the attempt, slot wait included.
    pub latency: Duration,
}

/// Runs a single attempt of a task against one backend.
///
/// The executor never retries; fallback across backends is the
/// coordinator's job. Each attempt acquires a load slot (waiting if the
/// backend is saturated), invokes the backend under the effective
/// timeout, scores successful output, and records the attempt in the
/// ledger win or lose. The slot is released on every exit path.
#[derive(Clone)]
pub struct TaskExecutor {
    load: Arc<LoadTracker>,
    ledger: Arc<PerformanceLedger>,
    config: Arc<EngineConfig>,
}

impl TaskExecutor {
    /// Creates an executor over the given load tracker and ledger.
    pub fn new(
        load: Arc<LoadTracker>,
        ledger: Arc<PerformanceLedger>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            load,
            ledger,
            config,
        }
    }

    /// Executes one attempt, bounded by the backend's timeout and the
    /// task deadline (when set).
    ///
    /// Errors map to the attempt taxonomy: [`TaskorError::Timeout`] for
    /// a per-backend timeout, [`TaskorError::DeadlineExceeded`] when
    /// the task's own budget ran out (terminal for the whole chain),
    /// and backend/HTTP errors otherwise.
    pub async fn execute(
        &self,
        task: &Task,
        backend: &Arc<RegisteredBackend>,
        deadline: Option<Instant>,
    ) -> TaskorResult<Execution> {
        let backend_id = backend.id();
        let attempt_timeout = self.config.timeout_for(backend.descriptor());

        // The attempt budget is the backend timeout, shrunk to whatever
        // remains of the task deadline.
        let (budget, deadline_bound) = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(TaskorError::DeadlineExceeded);
                }
                if remaining < attempt_timeout {
                    (remaining, true)
                } else {
                    (attempt_timeout, false)
                }
            }
            None => (attempt_timeout, false),
        };

        let started = Instant::now();

        let _permit = match tokio::time::timeout(budget, self.load.acquire(backend_id)).await {
            Ok(permit) => permit?,
            Err(_) => {
                warn!(task_id = %task.id, backend = %backend_id, "executor: timed out waiting for slot");
                return Err(self.budget_error(deadline_bound, attempt_timeout));
            }
        };

        let remaining = budget.saturating_sub(started.elapsed());
        let opts = self
            .config
            .invoke_options
            .clone()
            .with_timeout(remaining);

        let outcome =
            tokio::time::timeout(remaining, backend.invoker().invoke(&task.payload, &opts)).await;
        let latency = started.elapsed();

        match outcome {
            Ok(Ok(output)) if output.trim().is_empty() => {
                self.ledger
                    .record(backend_id, task.task_type, latency, 0.0, false);
                Err(TaskorError::Backend(format!(
                    "backend '{backend_id}' returned empty output"
                )))
            }
            Ok(Ok(output)) => {
                let quality_score = scorer::score(&output, task.task_type, latency);
                self.ledger
                    .record(backend_id, task.task_type, latency, quality_score, true);
                info!(
                    task_id = %task.id,
                    backend = %backend_id,
                    latency_ms = latency.as_millis(),
                    quality = quality_score,
                    "executor: attempt succeeded"
                );
                Ok(Execution {
                    output,
                    quality_score,
                    latency,
                })
            }
            Ok(Err(e)) => {
                self.ledger
                    .record(backend_id, task.task_type, latency, 0.0, false);
                Err(e)
            }
            Err(_) => {
                self.ledger
                    .record(backend_id, task.task_type, latency, 0.0, false);
                warn!(
                    task_id = %task.id,
                    backend = %backend_id,
                    budget_ms = budget.as_millis(),
                    "executor: attempt timed out"
                );
                Err(self.budget_error(deadline_bound, attempt_timeout))
            }
        }
    }

    fn budget_error(&self, deadline_bound: bool, attempt_timeout: Duration) -> TaskorError {
        if deadline_bound {
            TaskorError::DeadlineExceeded
        } else {
            TaskorError::Timeout(attempt_timeout)
        }
    }
}

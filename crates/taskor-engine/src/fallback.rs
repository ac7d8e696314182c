use crate::config::EngineConfig;
use crate::executor::TaskExecutor;
use crate::matcher::CapabilityMatcher;
use std::sync::Arc;
use std::time::Instant;
use taskor_core::{Attempt, Task, TaskResult, TaskorError, TaskorResult};
use tracing::{error, info, warn};

/// Drives a task through its fallback chain until one backend succeeds
/// or the chain is exhausted.
///
/// Attempts within one task are strictly sequential; a short fixed
/// backoff separates them. Every failed try lands in the final result's
/// attempt trail. Configuration errors (no capable backend at all)
/// surface immediately as `Err`; everything else comes back as a
/// same-shape [`TaskResult`].
#[derive(Clone)]
pub struct FallbackCoordinator {
    matcher: CapabilityMatcher,
    executor: TaskExecutor,
    config: Arc<EngineConfig>,
}

impl FallbackCoordinator {
    /// Creates a coordinator from its parts.
    pub fn new(
        matcher: CapabilityMatcher,
        executor: TaskExecutor,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            matcher,
            executor,
            config,
        }
    }

    /// Executes a task with fallback across candidate backends.
    pub async fn execute_with_fallback(&self, task: &Task) -> TaskorResult<TaskResult> {
        let chain_start = Instant::now();
        let deadline = task.deadline.map(|budget| chain_start + budget);

        let candidates = self.matcher.candidates(task.task_type, task.complexity)?;
        let limit = (self.config.max_attempts as usize).min(candidates.len());

        let mut attempts: Vec<Attempt> = Vec::new();

        for (index, backend) in candidates.iter().take(limit).enumerate() {
            info!(
                task_id = %task.id,
                backend = %backend.id(),
                attempt = index + 1,
                of = limit,
                "fallback: dispatching attempt"
            );

            match self.executor.execute(task, backend, deadline).await {
                Ok(execution) => {
                    info!(
                        task_id = %task.id,
                        backend = %backend.id(),
                        failed_attempts = attempts.len(),
                        "fallback: task succeeded"
                    );
                    return Ok(TaskResult::success(
                        task.id.clone(),
                        backend.id(),
                        execution.output,
                        execution.quality_score,
                        execution.latency,
                        attempts,
                    ));
                }
                Err(TaskorError::DeadlineExceeded) => {
                    warn!(task_id = %task.id, backend = %backend.id(), "fallback: deadline exceeded");
                    attempts.push(Attempt::new(backend.id(), "deadline exceeded"));
                    return Ok(TaskResult::failure(
                        task.id.clone(),
                        "deadline exceeded",
                        chain_start.elapsed(),
                        attempts,
                    ));
                }
                Err(e) => {
                    warn!(
                        task_id = %task.id,
                        backend = %backend.id(),
                        error = %e,
                        "fallback: attempt failed, moving to next candidate"
                    );
                    attempts.push(Attempt::new(backend.id(), e.to_string()));
                    if index + 1 < limit && !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        error!(
            task_id = %task.id,
            tried = attempts.len(),
            "fallback: all backends exhausted"
        );
        Ok(TaskResult::failure(
            task.id.clone(),
            "all backends exhausted",
            chain_start.elapsed(),
            attempts,
        ))
    }
}

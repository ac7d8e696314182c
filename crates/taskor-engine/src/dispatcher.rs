use crate::fallback::FallbackCoordinator;
use std::time::Duration;
use taskor_core::{Task, TaskResult};
use tracing::{info, warn};

/// Fans a batch of independent tasks out concurrently and collects a
/// result for every one of them.
///
/// Each task runs its own fallback chain in its own tokio task, bounded
/// only by per-backend concurrency ceilings. One task failing, erroring,
/// or panicking never affects its siblings; whatever happens, the
/// returned vector has the same length and order as the input and every
/// slot holds a terminal [`TaskResult`].
#[derive(Clone)]
pub struct ParallelDispatcher {
    fallback: FallbackCoordinator,
}

impl ParallelDispatcher {
    /// Creates a dispatcher over the given fallback coordinator.
    pub fn new(fallback: FallbackCoordinator) -> Self {
        Self { fallback }
    }

    /// Executes every task concurrently and returns results in input
    /// order once all chains have finished.
    pub async fn execute_batch(&self, tasks: Vec<Task>) -> Vec<TaskResult> {
        info!(batch_size = tasks.len(), "dispatcher: fanning out batch");

        let handles: Vec<(String, tokio::task::JoinHandle<_>)> = tasks
            .into_iter()
            .map(|task| {
                let coordinator = self.fallback.clone();
                let task_id = task.id.clone();
                let handle =
                    tokio::spawn(async move { coordinator.execute_with_fallback(&task).await });
                (task_id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (task_id, handle) in handles {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                // Configuration errors become data at the batch boundary
                // so one bad task cannot sink its siblings.
                Ok(Err(e)) => {
                    warn!(task_id = %task_id, error = %e, "dispatcher: task failed to start");
                    TaskResult::failure(task_id, e.to_string(), Duration::ZERO, Vec::new())
                }
                Err(join_err) if join_err.is_panic() => {
                    warn!(task_id = %task_id, "dispatcher: task panicked");
                    TaskResult::failure(
                        task_id,
                        format!("task panicked: {join_err}"),
                        Duration::ZERO,
                        Vec::new(),
                    )
                }
                Err(join_err) => TaskResult::failure(
                    task_id,
                    format!("task cancelled: {join_err}"),
                    Duration::ZERO,
                    Vec::new(),
                ),
            };
            results.push(result);
        }
        results
    }
}

use crate::config::EngineConfig;
use crate::dispatcher::ParallelDispatcher;
use crate::executor::TaskExecutor;
use crate::fallback::FallbackCoordinator;
use crate::ledger::{LedgerReport, PerformanceLedger};
use crate::load::LoadTracker;
use crate::matcher::CapabilityMatcher;
use crate::registry::BackendRegistry;
use std::sync::Arc;
use taskor_backend::GenerationBackend;
use taskor_core::{BackendDescriptor, Task, TaskResult, TaskType, TaskorResult};
use tracing::info;

/// The multi-backend task orchestration engine.
///
/// Owns the registry, load tracker, and performance ledger, and wires
/// the matcher, executor, fallback coordinator, and dispatcher over
/// them. Constructed explicitly from an injected registry and config;
/// nothing here lives in process-wide globals.
pub struct Orchestrator {
    registry: Arc<BackendRegistry>,
    load: Arc<LoadTracker>,
    ledger: Arc<PerformanceLedger>,
    fallback: FallbackCoordinator,
    dispatcher: ParallelDispatcher,
}

impl Orchestrator {
    /// Creates an engine over an already-populated registry.
    ///
    /// Every registered backend gets a load gate sized to its
    /// descriptor's ceiling, and the ledger is wired to refresh backend
    /// reliability as attempts are recorded.
    pub fn new(registry: BackendRegistry, config: EngineConfig) -> Self {
        let registry = Arc::new(registry);
        let load = Arc::new(LoadTracker::new());
        for backend in registry.all() {
            load.register(backend.id(), backend.descriptor().max_concurrent);
        }
        let ledger = Arc::new(PerformanceLedger::new().with_registry(Arc::clone(&registry)));
        let config = Arc::new(config);

        let matcher = CapabilityMatcher::new(Arc::clone(&registry), Arc::clone(&load));
        let executor = TaskExecutor::new(Arc::clone(&load), Arc::clone(&ledger), Arc::clone(&config));
        let fallback = FallbackCoordinator::new(matcher, executor, Arc::clone(&config));
        let dispatcher = ParallelDispatcher::new(fallback.clone());

        info!(backends = registry.len(), "orchestrator: engine ready");

        Self {
            registry,
            load,
            ledger,
            fallback,
            dispatcher,
        }
    }

    /// Registers a backend discovered at runtime.
    pub fn register_backend(
        &self,
        descriptor: BackendDescriptor,
        invoker: Arc<dyn GenerationBackend>,
    ) -> TaskorResult<()> {
        let id = descriptor.id.clone();
        let max_concurrent = descriptor.max_concurrent;
        self.registry.add(descriptor, invoker)?;
        self.load.register(&id, max_concurrent);
        info!(backend = %id, "orchestrator: backend registered at runtime");
        Ok(())
    }

    /// Executes one task through selection, execution, and fallback.
    ///
    /// Returns `Err` only for configuration errors (no backend supports
    /// the task type); every runtime failure comes back as a
    /// [`TaskResult`] with `success == false`.
    pub async fn submit(&self, task: Task) -> TaskorResult<TaskResult> {
        info!(
            task_id = %task.id,
            task_type = %task.task_type,
            complexity = %task.complexity,
            "orchestrator: task submitted"
        );
        self.fallback.execute_with_fallback(&task).await
    }

    /// Executes a batch of independent tasks concurrently, returning
    /// results in input order once every chain has finished.
    pub async fn submit_batch(&self, tasks: Vec<Task>) -> Vec<TaskResult> {
        self.dispatcher.execute_batch(tasks).await
    }

    /// Snapshot of per-backend and overall statistics. Safe to call
    /// while tasks are executing.
    pub fn report(&self) -> LedgerReport {
        self.ledger.report()
    }

    /// Backends recommended for a task type, best first, based on
    /// recorded quality and latency.
    pub fn recommend(&self, task_type: TaskType) -> Vec<String> {
        self.ledger.recommend(task_type)
    }

    /// The backend catalog.
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// The live load tracker.
    pub fn load(&self) -> &Arc<LoadTracker> {
        &self.load
    }

    /// The performance ledger.
    pub fn ledger(&self) -> &Arc<PerformanceLedger> {
        &self.ledger
    }
}

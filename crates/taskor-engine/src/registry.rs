use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use taskor_backend::GenerationBackend;
use taskor_core::{BackendDescriptor, TaskType, TaskorError, TaskorResult};
use tracing::debug;

/// A backend entry in the registry: its descriptor, its invoker, and a
/// live reliability statistic.
///
/// The descriptor is immutable once registered. Reliability is written
/// only by the performance ledger and read lock-free by the matcher.
pub struct RegisteredBackend {
    descriptor: BackendDescriptor,
    invoker: Arc<dyn GenerationBackend>,
    reliability_bits: AtomicU64,
}

impl RegisteredBackend {
    fn new(descriptor: BackendDescriptor, invoker: Arc<dyn GenerationBackend>) -> Self {
        let reliability_bits = AtomicU64::new(descriptor.reliability.to_bits());
        Self {
            descriptor,
            invoker,
            reliability_bits,
        }
    }

    /// The backend's unique id.
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// The immutable descriptor.
    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// The invoker behind this backend.
    pub fn invoker(&self) -> &Arc<dyn GenerationBackend> {
        &self.invoker
    }

    /// The current reliability estimate in `[0, 1]`.
    pub fn reliability(&self) -> f64 {
        f64::from_bits(self.reliability_bits.load(Ordering::Relaxed))
    }

    fn set_reliability(&self, value: f64) {
        self.reliability_bits
            .store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

impl std::fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("descriptor", &self.descriptor)
            .field("reliability", &self.reliability())
            .finish()
    }
}

/// Catalog of available backends.
///
/// Read-mostly: backends are appended at startup or when discovered
/// from a live service, never removed. Reliability updates go through
/// [`BackendRegistry::update_reliability`], called by the ledger.
#[derive(Default)]
pub struct BackendRegistry {
    backends: RwLock<Vec<Arc<RegisteredBackend>>>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a backend with its invoker.
    ///
    /// Fails on invalid descriptors and duplicate ids.
    pub fn add(
        &self,
        descriptor: BackendDescriptor,
        invoker: Arc<dyn GenerationBackend>,
    ) -> TaskorResult<()> {
        descriptor.validate()?;
        let mut backends = self.backends.write();
        if backends.iter().any(|b| b.id() == descriptor.id) {
            return Err(TaskorError::Config(format!(
                "backend '{}' is already registered",
                descriptor.id
            )));
        }
        debug!(backend = %descriptor.id, tier = %descriptor.tier, "registry: adding backend");
        backends.push(Arc::new(RegisteredBackend::new(descriptor, invoker)));
        Ok(())
    }

    /// Looks a backend up by id.
    pub fn get(&self, id: &str) -> Option<Arc<RegisteredBackend>> {
        self.backends.read().iter().find(|b| b.id() == id).cloned()
    }

    /// All backends supporting the given task type, in registration order.
    pub fn supporting(&self, task_type: TaskType) -> Vec<Arc<RegisteredBackend>> {
        self.backends
            .read()
            .iter()
            .filter(|b| b.descriptor().supports(task_type))
            .cloned()
            .collect()
    }

    /// All registered backends, in registration order.
    pub fn all(&self) -> Vec<Arc<RegisteredBackend>> {
        self.backends.read().clone()
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }

    /// Refreshes a backend's reliability. Returns false for unknown ids.
    pub fn update_reliability(&self, id: &str, value: f64) -> bool {
        match self.get(id) {
            Some(backend) => {
                backend.set_reliability(value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use taskor_backend::InvokeOptions;
    use taskor_core::Tier;

    struct StaticBackend;

    #[async_trait]
    impl GenerationBackend for StaticBackend {
        async fn invoke(&self, _payload: &str, _opts: &InvokeOptions) -> TaskorResult<String> {
            Ok("output".to_string())
        }
    }

    fn descriptor(id: &str, types: &[TaskType]) -> BackendDescriptor {
        BackendDescriptor::new(id, Tier::Balanced).with_task_types(types.iter().copied())
    }

    #[test]
    fn test_add_and_get() {
        let registry = BackendRegistry::new();
        registry
            .add(descriptor("b-1", &[TaskType::Coding]), Arc::new(StaticBackend))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("b-1").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let registry = BackendRegistry::new();
        registry
            .add(descriptor("b-1", &[TaskType::Coding]), Arc::new(StaticBackend))
            .unwrap();
        let err = registry
            .add(descriptor("b-1", &[TaskType::Review]), Arc::new(StaticBackend))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_add_rejects_invalid_descriptor() {
        let registry = BackendRegistry::new();
        let result = registry.add(descriptor("b-1", &[]), Arc::new(StaticBackend));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_supporting_filters_by_task_type() {
        let registry = BackendRegistry::new();
        registry
            .add(
                descriptor("coder", &[TaskType::Coding, TaskType::Debugging]),
                Arc::new(StaticBackend),
            )
            .unwrap();
        registry
            .add(descriptor("writer", &[TaskType::Documentation]), Arc::new(StaticBackend))
            .unwrap();

        let coding = registry.supporting(TaskType::Coding);
        assert_eq!(coding.len(), 1);
        assert_eq!(coding[0].id(), "coder");
        assert!(registry.supporting(TaskType::Deployment).is_empty());
    }

    #[test]
    fn test_reliability_starts_from_descriptor() {
        let registry = BackendRegistry::new();
        let mut desc = descriptor("b-1", &[TaskType::Coding]);
        desc.reliability = 0.75;
        registry.add(desc, Arc::new(StaticBackend)).unwrap();
        let backend = registry.get("b-1").unwrap();
        assert_eq!(backend.reliability(), 0.75);
    }

    #[test]
    fn test_update_reliability_clamps_and_reports_unknown() {
        let registry = BackendRegistry::new();
        registry
            .add(descriptor("b-1", &[TaskType::Coding]), Arc::new(StaticBackend))
            .unwrap();

        assert!(registry.update_reliability("b-1", 0.4));
        assert_eq!(registry.get("b-1").unwrap().reliability(), 0.4);

        assert!(registry.update_reliability("b-1", 1.7));
        assert_eq!(registry.get("b-1").unwrap().reliability(), 1.0);

        assert!(!registry.update_reliability("missing", 0.5));
    }
}

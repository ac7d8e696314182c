use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use taskor_core::{TaskorError, TaskorResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct Gate {
    semaphore: Arc<Semaphore>,
    max: u32,
}

/// A held execution slot on one backend.
///
/// Dropping the permit releases the slot, so release happens exactly
/// once per acquisition on every exit path, including timeouts,
/// cancellation, and panics.
#[derive(Debug)]
pub struct LoadPermit {
    _permit: OwnedSemaphorePermit,
}

/// Tracks in-flight tasks per backend and enforces each backend's
/// concurrency ceiling.
///
/// Counters for different backends are independent; acquiring on one
/// backend never blocks acquisitions on another. The tracker holds its
/// map lock only to look gates up, never across a wait.
#[derive(Default)]
pub struct LoadTracker {
    gates: RwLock<HashMap<String, Gate>>,
}

impl LoadTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend's concurrency ceiling. Idempotent: an
    /// already-registered backend keeps its existing gate.
    pub fn register(&self, id: &str, max_concurrent: u32) {
        let mut gates = self.gates.write();
        gates.entry(id.to_string()).or_insert_with(|| Gate {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
            max: max_concurrent,
        });
    }

    /// Whether the backend has a registered gate.
    pub fn is_registered(&self, id: &str) -> bool {
        self.gates.read().contains_key(id)
    }

    /// Attempts to take a slot without waiting. Returns `None` when the
    /// backend is saturated or unregistered.
    pub fn try_acquire(&self, id: &str) -> Option<LoadPermit> {
        let semaphore = self.gates.read().get(id)?.semaphore.clone();
        semaphore
            .try_acquire_owned()
            .ok()
            .map(|permit| LoadPermit { _permit: permit })
    }

    /// Takes a slot, waiting until one frees up.
    pub async fn acquire(&self, id: &str) -> TaskorResult<LoadPermit> {
        let semaphore = self
            .gates
            .read()
            .get(id)
            .map(|gate| gate.semaphore.clone())
            .ok_or_else(|| {
                TaskorError::Orchestrator(format!("backend '{id}' is not registered for load tracking"))
            })?;
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| TaskorError::Orchestrator(format!("load gate for '{id}' is closed")))?;
        Ok(LoadPermit { _permit: permit })
    }

    /// Number of slots currently held on the backend.
    pub fn active(&self, id: &str) -> u32 {
        self.gates
            .read()
            .get(id)
            .map(|gate| gate.max - gate.semaphore.available_permits() as u32)
            .unwrap_or(0)
    }

    /// Whether the backend currently has a free slot.
    pub fn has_capacity(&self, id: &str) -> bool {
        self.gates
            .read()
            .get(id)
            .map(|gate| gate.semaphore.available_permits() > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn test_try_acquire_enforces_ceiling() {
        let tracker = LoadTracker::new();
        tracker.register("b", 2);

        let p1 = tracker.try_acquire("b").unwrap();
        let _p2 = tracker.try_acquire("b").unwrap();
        assert!(tracker.try_acquire("b").is_none());
        assert_eq!(tracker.active("b"), 2);

        drop(p1);
        assert_eq!(tracker.active("b"), 1);
        assert!(tracker.try_acquire("b").is_some());
    }

    #[test]
    fn test_unregistered_backend_has_no_slots() {
        let tracker = LoadTracker::new();
        assert!(tracker.try_acquire("ghost").is_none());
        assert!(!tracker.has_capacity("ghost"));
        assert_eq!(tracker.active("ghost"), 0);
    }

    #[test]
    fn test_register_is_idempotent() {
        let tracker = LoadTracker::new();
        tracker.register("b", 1);
        let _held = tracker.try_acquire("b").unwrap();
        // Re-registering must not mint fresh slots.
        tracker.register("b", 5);
        assert!(tracker.try_acquire("b").is_none());
    }

    #[test]
    fn test_backends_are_independent() {
        let tracker = LoadTracker::new();
        tracker.register("a", 1);
        tracker.register("b", 1);

        let _pa = tracker.try_acquire("a").unwrap();
        assert!(tracker.try_acquire("a").is_none());
        assert!(tracker.try_acquire("b").is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_free_slot() {
        let tracker = Arc::new(LoadTracker::new());
        tracker.register("b", 1);

        let held = tracker.acquire("b").await.unwrap();

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.acquire("b").await })
        };

        // The waiter must not get a slot while the permit is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let permit = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(permit.is_ok());
    }

    #[tokio::test]
    async fn test_acquire_unregistered_errors() {
        let tracker = LoadTracker::new();
        let err = tracker.acquire("ghost").await.unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }

    #[tokio::test]
    async fn test_ceiling_holds_under_concurrency() {
        let tracker = Arc::new(LoadTracker::new());
        tracker.register("b", 3);

        let peak = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..24 {
            let tracker = Arc::clone(&tracker);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = tracker.acquire("b").await.unwrap();
                let active = tracker.active("b");
                peak.fetch_max(active, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(tracker.active("b"), 0);
    }
}

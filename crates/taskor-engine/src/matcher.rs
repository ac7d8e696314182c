use crate::load::LoadTracker;
use crate::registry::{BackendRegistry, RegisteredBackend};
use std::cmp::Ordering;
use std::sync::Arc;
use taskor_core::{Complexity, TaskType, Tier, TaskorError, TaskorResult};
use tracing::debug;

/// Selects backends for tasks by capability, tier preference, priority,
/// reliability, and current load.
///
/// The matcher never blocks and never errors on saturation: when every
/// capable backend is at its ceiling it still returns the best-ranked
/// one and leaves waiting to the executor. Only total capability
/// absence is an error, and that one fails fast.
#[derive(Clone)]
pub struct CapabilityMatcher {
    registry: Arc<BackendRegistry>,
    load: Arc<LoadTracker>,
}

impl CapabilityMatcher {
    /// Creates a matcher over the given registry and load tracker.
    pub fn new(registry: Arc<BackendRegistry>, load: Arc<LoadTracker>) -> Self {
        Self { registry, load }
    }

    /// Picks the backend to try first for a task.
    ///
    /// Candidates supporting the task type are narrowed to the
    /// complexity-preferred tier when that tier is represented, ranked
    /// by priority, then reliability, then lower current load, and the
    /// first one with a free slot wins. If all are saturated the
    /// top-ranked one is returned anyway.
    pub fn select(
        &self,
        task_type: TaskType,
        complexity: Complexity,
    ) -> TaskorResult<Arc<RegisteredBackend>> {
        let ranked = self.ranked(task_type, complexity)?;
        let chosen = ranked
            .iter()
            .find(|b| self.load.has_capacity(b.id()))
            .unwrap_or(&ranked[0])
            .clone();
        debug!(
            task_type = %task_type,
            complexity = %complexity,
            backend = %chosen.id(),
            active = self.load.active(chosen.id()),
            "matcher: selected backend"
        );
        Ok(chosen)
    }

    /// Builds the ordered fallback chain for a task: the top pick
    /// first, then every other capability-matching backend by
    /// descending priority. Each backend appears at most once.
    pub fn candidates(
        &self,
        task_type: TaskType,
        complexity: Complexity,
    ) -> TaskorResult<Vec<Arc<RegisteredBackend>>> {
        let primary = self.select(task_type, complexity)?;

        let mut rest: Vec<Arc<RegisteredBackend>> = self
            .registry
            .supporting(task_type)
            .into_iter()
            .filter(|b| b.id() != primary.id())
            .collect();
        rest.sort_by(|a, b| b.descriptor().priority.cmp(&a.descriptor().priority));

        let mut chain = Vec::with_capacity(rest.len() + 1);
        chain.push(primary);
        chain.extend(rest);
        Ok(chain)
    }

    /// All capable backends for the task, best first. Errors when no
    /// registered backend supports the task type.
    fn ranked(
        &self,
        task_type: TaskType,
        complexity: Complexity,
    ) -> TaskorResult<Vec<Arc<RegisteredBackend>>> {
        let supporting = self.registry.supporting(task_type);
        if supporting.is_empty() {
            return Err(TaskorError::Config(format!(
                "no registered backend supports task type '{task_type}'"
            )));
        }

        let preferred_tier = match complexity {
            Complexity::Simple => Some(Tier::Fast),
            Complexity::Complex => Some(Tier::Powerful),
            Complexity::Medium => None,
        };

        let mut pool = match preferred_tier {
            Some(tier) => {
                let tiered: Vec<Arc<RegisteredBackend>> = supporting
                    .iter()
                    .filter(|b| b.descriptor().tier == tier)
                    .cloned()
                    .collect();
                if tiered.is_empty() {
                    supporting
                } else {
                    tiered
                }
            }
            None => supporting,
        };

        pool.sort_by(|a, b| {
            b.descriptor()
                .priority
                .cmp(&a.descriptor().priority)
                .then_with(|| {
                    b.reliability()
                        .partial_cmp(&a.reliability())
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| self.load.active(a.id()).cmp(&self.load.active(b.id())))
        });
        Ok(pool)
    }
}

use crate::registry::BackendRegistry;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskor_core::TaskType;
use tracing::debug;

/// Floor for the latency denominator in efficiency rankings.
const LATENCY_EPSILON_SECS: f64 = 1e-3;

/// Running statistics for one (backend, task type) pair.
///
/// Every attempt counts toward the success rate; only successful
/// attempts feed the latency and quality means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Total attempts, successful or not.
    pub attempts: u64,
    /// Successful attempts — the samples behind the means.
    pub sample_count: u64,
    /// Running mean latency of successful attempts, in milliseconds.
    pub mean_latency_ms: f64,
    /// Running mean quality score of successful attempts.
    pub mean_quality: f64,
}

impl PerformanceRecord {
    /// Fraction of attempts that succeeded; 0.0 before any attempt.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.sample_count as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Default)]
struct BackendTotals {
    attempts: u64,
    successes: u64,
}

/// One row of a [`LedgerReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendTypeStats {
    /// The backend these statistics belong to.
    pub backend_id: String,
    /// The task type these statistics belong to.
    pub task_type: TaskType,
    /// The running statistics.
    pub stats: PerformanceRecord,
}

/// Aggregate statistics across every backend and task type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallStats {
    /// Total attempts across the whole engine.
    pub attempts: u64,
    /// Total successful attempts.
    pub successes: u64,
    /// Overall success fraction.
    pub success_rate: f64,
}

/// Snapshot of the ledger, safe to serialize for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReport {
    /// When this snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Per-(backend, task type) rows, ordered by backend then type.
    pub per_backend: Vec<BackendTypeStats>,
    /// Engine-wide totals.
    pub overall: OverallStats,
}

/// Process-wide aggregate of per-backend, per-task-type statistics.
///
/// Updates are scoped to a single record's mutex so unrelated backends
/// and task types never contend. When wired to a registry, each
/// recorded attempt also refreshes that backend's reliability from its
/// overall success rate.
pub struct PerformanceLedger {
    records: RwLock<HashMap<(String, TaskType), Arc<Mutex<PerformanceRecord>>>>,
    totals: RwLock<HashMap<String, Arc<Mutex<BackendTotals>>>>,
    registry: Option<Arc<BackendRegistry>>,
    min_samples: u64,
}

impl Default for PerformanceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceLedger {
    /// Creates a ledger with the default recommendation gate of 3
    /// samples and no registry wiring.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            totals: RwLock::new(HashMap::new()),
            registry: None,
            min_samples: 3,
        }
    }

    /// Wires the ledger to a registry so reliability is refreshed after
    /// each recorded attempt.
    pub fn with_registry(mut self, registry: Arc<BackendRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the minimum sample count before a backend is eligible for
    /// recommendations.
    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Records one completed attempt.
    ///
    /// `latency` and `quality_score` only enter the running means when
    /// `success` is true; the attempt always counts toward the success
    /// rate either way.
    pub fn record(
        &self,
        backend_id: &str,
        task_type: TaskType,
        latency: Duration,
        quality_score: f64,
        success: bool,
    ) {
        let record = self.record_entry(backend_id, task_type);
        {
            let mut record = record.lock();
            record.attempts += 1;
            if success {
                record.sample_count += 1;
                let n = record.sample_count as f64;
                let latency_ms = latency.as_secs_f64() * 1000.0;
                record.mean_latency_ms += (latency_ms - record.mean_latency_ms) / n;
                record.mean_quality += (quality_score - record.mean_quality) / n;
            }
        }

        let totals = self.totals_entry(backend_id);
        let reliability = {
            let mut totals = totals.lock();
            totals.attempts += 1;
            if success {
                totals.successes += 1;
            }
            totals.successes as f64 / totals.attempts as f64
        };

        debug!(
            backend = %backend_id,
            task_type = %task_type,
            success,
            reliability,
            "ledger: recorded attempt"
        );

        if let Some(registry) = &self.registry {
            registry.update_reliability(backend_id, reliability);
        }
    }

    /// A copy of the record for one (backend, task type) pair.
    pub fn get(&self, backend_id: &str, task_type: TaskType) -> Option<PerformanceRecord> {
        self.records
            .read()
            .get(&(backend_id.to_string(), task_type))
            .map(|record| record.lock().clone())
    }

    /// Backends recommended for a task type, best first.
    ///
    /// Only backends with at least the minimum sample count are
    /// eligible; ranking is by quality per second of latency.
    pub fn recommend(&self, task_type: TaskType) -> Vec<String> {
        let records = self.records.read();
        let mut scored: Vec<(String, f64)> = records
            .iter()
            .filter(|((_, t), _)| *t == task_type)
            .filter_map(|((id, _), record)| {
                let record = record.lock();
                if record.sample_count < self.min_samples {
                    return None;
                }
                let latency_secs = (record.mean_latency_ms / 1000.0).max(LATENCY_EPSILON_SECS);
                Some((id.clone(), record.mean_quality / latency_secs))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(id, _)| id).collect()
    }

    /// Takes a serializable snapshot of every record plus overall totals.
    pub fn report(&self) -> LedgerReport {
        let mut per_backend: Vec<BackendTypeStats> = self
            .records
            .read()
            .iter()
            .map(|((id, task_type), record)| BackendTypeStats {
                backend_id: id.clone(),
                task_type: *task_type,
                stats: record.lock().clone(),
            })
            .collect();
        per_backend.sort_by(|a, b| {
            a.backend_id
                .cmp(&b.backend_id)
                .then_with(|| a.task_type.to_string().cmp(&b.task_type.to_string()))
        });

        let mut overall = OverallStats::default();
        for totals in self.totals.read().values() {
            let totals = totals.lock();
            overall.attempts += totals.attempts;
            overall.successes += totals.successes;
        }
        if overall.attempts > 0 {
            overall.success_rate = overall.successes as f64 / overall.attempts as f64;
        }

        LedgerReport {
            generated_at: Utc::now(),
            per_backend,
            overall,
        }
    }

    fn record_entry(
        &self,
        backend_id: &str,
        task_type: TaskType,
    ) -> Arc<Mutex<PerformanceRecord>> {
        let key = (backend_id.to_string(), task_type);
        if let Some(record) = self.records.read().get(&key) {
            return Arc::clone(record);
        }
        Arc::clone(self.records.write().entry(key).or_default())
    }

    fn totals_entry(&self, backend_id: &str) -> Arc<Mutex<BackendTotals>> {
        if let Some(totals) = self.totals.read().get(backend_id) {
            return Arc::clone(totals);
        }
        Arc::clone(
            self.totals
                .write()
                .entry(backend_id.to_string())
                .or_default(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use taskor_backend::{GenerationBackend, InvokeOptions};
    use taskor_core::{BackendDescriptor, Tier, TaskorResult};

    struct StaticBackend;

    #[async_trait]
    impl GenerationBackend for StaticBackend {
        async fn invoke(&self, _payload: &str, _opts: &InvokeOptions) -> TaskorResult<String> {
            Ok("output".to_string())
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_sample_count_and_running_mean() {
        let ledger = PerformanceLedger::new();
        let values = [(ms(100), 0.5), (ms(200), 0.7), (ms(600), 0.9)];
        for (latency, quality) in values {
            ledger.record("b", TaskType::Coding, latency, quality, true);
        }

        let record = ledger.get("b", TaskType::Coding).unwrap();
        assert_eq!(record.sample_count, 3);
        assert_eq!(record.attempts, 3);
        assert!((record.mean_latency_ms - 300.0).abs() < 1e-6);
        assert!((record.mean_quality - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_failures_hit_rate_but_not_means() {
        let ledger = PerformanceLedger::new();
        ledger.record("b", TaskType::Coding, ms(100), 0.8, true);
        ledger.record("b", TaskType::Coding, ms(9999), 0.0, false);

        let record = ledger.get("b", TaskType::Coding).unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.sample_count, 1);
        assert!((record.mean_latency_ms - 100.0).abs() < 1e-6);
        assert!((record.success_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_records_are_per_backend_and_type() {
        let ledger = PerformanceLedger::new();
        ledger.record("a", TaskType::Coding, ms(100), 0.8, true);
        ledger.record("a", TaskType::Review, ms(200), 0.6, true);
        ledger.record("b", TaskType::Coding, ms(300), 0.4, true);

        assert_eq!(ledger.get("a", TaskType::Coding).unwrap().sample_count, 1);
        assert_eq!(ledger.get("a", TaskType::Review).unwrap().sample_count, 1);
        assert_eq!(ledger.get("b", TaskType::Coding).unwrap().sample_count, 1);
        assert!(ledger.get("b", TaskType::Review).is_none());
    }

    #[test]
    fn test_recommend_requires_minimum_samples() {
        let ledger = PerformanceLedger::new();
        ledger.record("b", TaskType::Coding, ms(100), 0.9, true);
        ledger.record("b", TaskType::Coding, ms(100), 0.9, true);
        assert!(ledger.recommend(TaskType::Coding).is_empty());

        ledger.record("b", TaskType::Coding, ms(100), 0.9, true);
        assert_eq!(ledger.recommend(TaskType::Coding), vec!["b"]);
    }

    #[test]
    fn test_recommend_ranks_by_efficiency() {
        let ledger = PerformanceLedger::new().with_min_samples(1);
        // Same quality, but "quick" answers in a tenth of the time.
        ledger.record("quick", TaskType::Coding, ms(100), 0.8, true);
        ledger.record("slow", TaskType::Coding, ms(1000), 0.8, true);
        // High quality does not compensate for a 20x latency gap.
        ledger.record("ponderous", TaskType::Coding, ms(2000), 0.95, true);

        let ranked = ledger.recommend(TaskType::Coding);
        assert_eq!(ranked[0], "quick");
        assert_eq!(ranked, vec!["quick", "slow", "ponderous"]);
    }

    #[test]
    fn test_recommend_is_task_type_scoped() {
        let ledger = PerformanceLedger::new().with_min_samples(1);
        ledger.record("coder", TaskType::Coding, ms(100), 0.8, true);
        assert!(ledger.recommend(TaskType::Review).is_empty());
    }

    #[test]
    fn test_reliability_refreshes_through_registry() {
        let registry = Arc::new(BackendRegistry::new());
        registry
            .add(
                BackendDescriptor::new("b", Tier::Fast).with_task_types([TaskType::Coding]),
                Arc::new(StaticBackend),
            )
            .unwrap();
        let ledger = PerformanceLedger::new().with_registry(Arc::clone(&registry));

        ledger.record("b", TaskType::Coding, ms(100), 0.8, true);
        ledger.record("b", TaskType::Coding, ms(100), 0.0, false);
        ledger.record("b", TaskType::Review, ms(100), 0.0, false);
        ledger.record("b", TaskType::Coding, ms(100), 0.8, true);

        // 2 successes of 4 attempts, across task types.
        let backend = registry.get("b").unwrap();
        assert!((backend.reliability() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_report_rows_and_overall() {
        let ledger = PerformanceLedger::new();
        ledger.record("b", TaskType::Coding, ms(100), 0.8, true);
        ledger.record("a", TaskType::Review, ms(200), 0.6, true);
        ledger.record("a", TaskType::Review, ms(200), 0.0, false);

        let report = ledger.report();
        assert_eq!(report.per_backend.len(), 2);
        assert_eq!(report.per_backend[0].backend_id, "a");
        assert_eq!(report.overall.attempts, 3);
        assert_eq!(report.overall.successes, 2);
        assert!((report.overall.success_rate - 2.0 / 3.0).abs() < 1e-9);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("per_backend"));
    }

    #[test]
    fn test_empty_report() {
        let ledger = PerformanceLedger::new();
        let report = ledger.report();
        assert!(report.per_backend.is_empty());
        assert_eq!(report.overall.attempts, 0);
        assert_eq!(report.overall.success_rate, 0.0);
    }
}

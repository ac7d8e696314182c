use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskor_backend::InvokeOptions;
use taskor_core::{BackendDescriptor, Tier};

/// Global engine defaults.
///
/// Backends themselves are configured through their
/// [`BackendDescriptor`] list; this struct carries everything else the
/// engine needs. It is plain data injected into
/// [`Orchestrator::new`](crate::Orchestrator::new), never read from
/// process-wide globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum backends tried per task before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between fallback attempts.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: Duration,
    /// Attempt timeout for [`Tier::Fast`] backends.
    #[serde(default = "default_fast_timeout")]
    pub fast_timeout: Duration,
    /// Attempt timeout for [`Tier::Balanced`] backends.
    #[serde(default = "default_balanced_timeout")]
    pub balanced_timeout: Duration,
    /// Attempt timeout for [`Tier::Powerful`] backends.
    #[serde(default = "default_powerful_timeout")]
    pub powerful_timeout: Duration,
    /// Generation options passed to every backend invocation.
    #[serde(default)]
    pub invoke_options: InvokeOptions,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_fast_timeout() -> Duration {
    Tier::Fast.default_timeout()
}

fn default_balanced_timeout() -> Duration {
    Tier::Balanced.default_timeout()
}

fn default_powerful_timeout() -> Duration {
    Tier::Powerful.default_timeout()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff: default_retry_backoff(),
            fast_timeout: default_fast_timeout(),
            balanced_timeout: default_balanced_timeout(),
            powerful_timeout: default_powerful_timeout(),
            invoke_options: InvokeOptions::default(),
        }
    }
}

impl EngineConfig {
    /// The effective attempt timeout for a backend: its descriptor
    /// override if set, otherwise the configured tier default.
    pub fn timeout_for(&self, descriptor: &BackendDescriptor) -> Duration {
        if let Some(secs) = descriptor.timeout_secs {
            return Duration::from_secs(secs);
        }
        match descriptor.tier {
            Tier::Fast => self.fast_timeout,
            Tier::Balanced => self.balanced_timeout,
            Tier::Powerful => self.powerful_timeout,
        }
    }
}

//! Health check results and the services producing them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Outcome of a single check, ordered from healthy to unhealthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// The check passed.
    #[default]
    Pass,
    /// The check passed with a warning; still reported as healthy.
    Warn,
    /// The check failed.
    Fail,
}

/// Observation recorded by one named check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckDetail {
    /// Human-readable description of the check.
    pub description: String,
    /// Unit of the observed value.
    pub observed_unit: String,
    /// Observed value.
    pub observed_value: Value,
    /// Outcome.
    pub status: CheckStatus,
}

impl CheckDetail {
    /// A detail with `status` and nothing observed.
    #[must_use]
    pub fn new(status: CheckStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A passing detail.
    #[must_use]
    pub fn pass() -> Self {
        Self::new(CheckStatus::Pass)
    }

    /// A warning detail.
    #[must_use]
    pub fn warn() -> Self {
        Self::new(CheckStatus::Warn)
    }

    /// A failing detail.
    #[must_use]
    pub fn fail() -> Self {
        Self::new(CheckStatus::Fail)
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach an observed value and its unit.
    #[must_use]
    pub fn with_observation(mut self, value: impl Into<Value>, unit: impl Into<String>) -> Self {
        self.observed_value = value.into();
        self.observed_unit = unit.into();
        self
    }
}

/// Named checks produced by one probe invocation.
///
/// # Examples
/// ```
/// use servekit::health::{CheckDetail, CheckResult, CheckStatus};
///
/// let result = CheckResult::default()
///     .with_check("db", CheckDetail::pass())
///     .with_check("cache", CheckDetail::warn());
/// assert_eq!(result.status(), CheckStatus::Warn);
/// assert_eq!(CheckResult::default().status(), CheckStatus::Pass);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResult {
    /// Checks keyed by name.
    pub checks: BTreeMap<String, CheckDetail>,
}

impl CheckResult {
    /// Add a named check.
    #[must_use]
    pub fn with_check(mut self, name: impl Into<String>, detail: CheckDetail) -> Self {
        self.insert(name, detail);
        self
    }

    /// Record a named check, replacing any previous one of the same name.
    pub fn insert(&mut self, name: impl Into<String>, detail: CheckDetail) {
        self.checks.insert(name.into(), detail);
    }

    /// Worst status across all checks; `pass` when there are none.
    #[must_use]
    pub fn status(&self) -> CheckStatus {
        self.checks
            .values()
            .map(|detail| detail.status)
            .max()
            .unwrap_or_default()
    }
}

/// Build identity reported by probes and the API document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Version {
    /// Semantic version of the service.
    pub version: String,
    /// Monotonic release identifier; zero when unknown.
    pub release_id: u64,
}

impl Version {
    /// Version `version` with release `release_id`.
    #[must_use]
    pub fn new(version: impl Into<String>, release_id: u64) -> Self {
        Self {
            version: version.into(),
            release_id,
        }
    }
}

/// Probe kinds served under `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    /// The process is running.
    Liveness,
    /// The process can serve traffic.
    Readiness,
    /// The process finished initialising.
    Startup,
}

/// Produces check results for the health endpoints.
#[async_trait]
pub trait HealthService: Send + Sync {
    /// Checks behind `GET /health` and `GET /health/live`.
    async fn check_liveness(&self) -> CheckResult;

    /// Checks behind `GET /health/ready`.
    async fn check_readiness(&self) -> CheckResult;

    /// Checks behind `GET /health/startup`.
    async fn check_startup(&self) -> CheckResult;

    /// Build identity included in every probe response.
    fn version(&self) -> Version;

    /// Dispatch on `probe`.
    async fn check(&self, probe: Probe) -> CheckResult {
        match probe {
            Probe::Liveness => self.check_liveness().await,
            Probe::Readiness => self.check_readiness().await,
            Probe::Startup => self.check_startup().await,
        }
    }
}

/// A component contributing named checks to [`HealthRegistry`].
#[async_trait]
pub trait HealthProvider: Send + Sync {
    /// Prefix applied to this provider's check names.
    fn name(&self) -> &str;

    /// Checks for `probe`; return an empty result to abstain.
    async fn check(&self, probe: Probe) -> CheckResult;
}

/// [`HealthService`] aggregating registered providers.
///
/// Checks are reported as `"{provider}:{check}"`.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    version: Version,
    providers: Vec<Arc<dyn HealthProvider>>,
}

impl HealthRegistry {
    /// An empty registry reporting `version`.
    #[must_use]
    pub fn new(version: Version) -> Self {
        Self {
            version,
            providers: Vec::new(),
        }
    }

    /// Register a provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn HealthProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Register a provider in place.
    pub fn register(&mut self, provider: Arc<dyn HealthProvider>) {
        self.providers.push(provider);
    }

    async fn aggregate(&self, probe: Probe) -> CheckResult {
        let mut result = CheckResult::default();
        for provider in &self.providers {
            let name = provider.name();
            for (check, detail) in provider.check(probe).await.checks {
                result.insert(format!("{name}:{check}"), detail);
            }
        }
        result
    }
}

#[async_trait]
impl HealthService for HealthRegistry {
    async fn check_liveness(&self) -> CheckResult {
        self.aggregate(Probe::Liveness).await
    }

    async fn check_readiness(&self) -> CheckResult {
        self.aggregate(Probe::Readiness).await
    }

    async fn check_startup(&self) -> CheckResult {
        self.aggregate(Probe::Startup).await
    }

    fn version(&self) -> Version {
        self.version.clone()
    }
}

/// Server lifecycle as seen by the probes.
///
/// Starts not ready but live. The server marks it ready once listening and
/// draining when shutdown begins, so liveness fails fast during the drain.
pub struct LifecycleProbe {
    ready: AtomicBool,
    live: AtomicBool,
}

impl Default for LifecycleProbe {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(false),
            live: AtomicBool::new(true),
        }
    }
}

impl LifecycleProbe {
    /// Create a probe that is live but not yet ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the server as ready to take traffic.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Mark the server as draining; readiness and liveness fail from now on.
    pub fn mark_draining(&self) {
        self.live.store(false, Ordering::Release);
    }

    /// Return readiness state.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Return liveness state.
    pub fn is_alive(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn detail(ok: bool, description: &str) -> CheckDetail {
        let detail = if ok {
            CheckDetail::pass()
        } else {
            CheckDetail::fail()
        };
        detail
            .with_description(description)
            .with_observation(ok, "boolean")
    }
}

#[async_trait]
impl HealthProvider for LifecycleProbe {
    fn name(&self) -> &str {
        "server"
    }

    async fn check(&self, probe: Probe) -> CheckResult {
        let (name, ok, description) = match probe {
            Probe::Liveness => ("live", self.is_alive(), "server is not draining"),
            Probe::Readiness => (
                "ready",
                self.is_ready() && self.is_alive(),
                "server accepts traffic",
            ),
            Probe::Startup => ("started", self.is_ready(), "server finished starting"),
        };
        CheckResult::default().with_check(name, Self::detail(ok, description))
    }
}

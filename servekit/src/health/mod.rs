//! Health probes: liveness, readiness and startup endpoints for
//! orchestrators and load balancers.
//!
//! A [`HealthService`] produces a [`CheckResult`] per probe; the handler
//! maps the worst sub-check status onto the HTTP status (`fail` → 503,
//! otherwise 200) and renders a [`HealthResponse`]. [`HealthRegistry`] is
//! the stock service, aggregating any number of [`HealthProvider`]s such as
//! the server's own [`LifecycleProbe`].

pub mod dto;
pub mod handler;
pub mod service;

pub use dto::{HealthCheck, HealthResponse};
pub use handler::{HealthHandler, probe_status};
pub use service::{
    CheckDetail, CheckResult, CheckStatus, HealthProvider, HealthRegistry, HealthService,
    LifecycleProbe, Probe, Version,
};

//! HTTP server configuration object and helpers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{DEFAULT_SHUTDOWN_GRACE_SECS, HttpSettings};
use crate::health::LifecycleProbe;

/// Builder-style configuration for binding and stopping the HTTP server.
#[derive(Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: String,
    pub(crate) shutdown_grace: Duration,
    pub(crate) lifecycle: Option<Arc<LifecycleProbe>>,
}

impl ServerConfig {
    /// Bind `bind_addr` with the default shutdown grace period.
    #[must_use]
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            lifecycle: None,
        }
    }

    /// Construct a server configuration from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &HttpSettings) -> Self {
        Self::new(settings.address()).with_shutdown_grace(settings.shutdown_grace())
    }

    /// Grant in-flight requests `grace` to finish during graceful shutdown.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Mark `probe` ready once listening and draining once stopping.
    #[must_use]
    pub fn with_lifecycle_probe(mut self, probe: Arc<LifecycleProbe>) -> Self {
        self.lifecycle = Some(probe);
        self
    }

    /// Return the address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    /// Return the graceful shutdown deadline.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }
}

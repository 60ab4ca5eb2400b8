//! Server construction, supervision and graceful shutdown.
//!
//! [`start`] binds the listener and hands the accept loop to a supervisor
//! task, returning once the server is listening. The lifecycle moves
//! through [`LifecycleState`]:
//!
//! ```text
//! Idle → Listening → Serving ─┬─→ ShuttingDown → Stopped
//!                             └─→ Failed ─→ ShuttingDown → Stopped
//! ```
//!
//! An accept loop that ends with an error while the server is not shutting
//! down marks the server `Failed` and requests process shutdown through the
//! shared [`Shutdown`] signal exactly once.

pub mod config;
pub mod proxy;

pub use config::ServerConfig;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use actix_web::HttpServer;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::{AppDependencies, build_app};
use crate::config::ConfigError;
use crate::health::LifecycleProbe;
use crate::metrics::MetricsError;

/// Observable server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not started.
    Idle,
    /// The listener is bound.
    Listening,
    /// The accept loop is running.
    Serving,
    /// The accept loop ended unexpectedly.
    Failed,
    /// A stop was requested and in-flight requests are draining.
    ShuttingDown,
    /// The server has stopped.
    Stopped,
}

/// Errors raised while starting, running or stopping the server.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The listen address could not be bound.
    #[error("listen {address}: {source}")]
    Bind {
        /// Address that failed to bind.
        address: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },
    /// The accept loop ended with an error.
    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),
    /// The supervisor task could not be joined.
    #[error("server task failed: {0}")]
    Join(String),
    /// In-flight requests did not finish before the deadline.
    #[error("server shutdown failed: requests still running after {0:?}")]
    ShutdownTimeout(Duration),
    /// Settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The metrics layer could not be configured.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Process-wide shutdown signal.
///
/// Clones share state. [`Shutdown::request`] reports whether the call was
/// the first one, so a failure path can tell whether it triggered shutdown.
///
/// # Examples
/// ```
/// use servekit::server::Shutdown;
///
/// let shutdown = Shutdown::new();
/// assert!(shutdown.request());
/// assert!(!shutdown.clone().request());
/// assert!(shutdown.is_requested());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    /// A signal that has not been requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; returns `true` only for the first request.
    pub fn request(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::AcqRel);
        if first {
            self.token.cancel();
        }
        first
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}

type StateTx = Arc<watch::Sender<LifecycleState>>;

/// A running server.
pub struct ServerHandle {
    addrs: Vec<SocketAddr>,
    server: actix_web::dev::ServerHandle,
    state: StateTx,
    supervisor: JoinHandle<Result<(), LifecycleError>>,
    lifecycle: Option<Arc<LifecycleProbe>>,
    shutdown: Shutdown,
    grace: Duration,
}

impl ServerHandle {
    /// Addresses the listener is bound to.
    #[must_use]
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Shutdown signal triggered when the accept loop fails.
    #[must_use]
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Configured graceful shutdown deadline.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.grace
    }

    /// Resolve once the server fails (`true`) or stops (`false`).
    pub async fn wait_failed(&self) -> bool {
        let mut states = self.subscribe();
        states
            .wait_for(|state| matches!(state, LifecycleState::Failed | LifecycleState::Stopped))
            .await
            .is_ok_and(|state| *state == LifecycleState::Failed)
    }

    /// Stop accepting connections and drain in-flight requests.
    ///
    /// The lifecycle probe turns liveness `fail` first. Waiting is bounded
    /// by `deadline`: once it expires the call returns while the workers
    /// finish draining in the background, each bounded by the configured
    /// shutdown grace.
    ///
    /// # Errors
    /// Returns [`LifecycleError::ShutdownTimeout`] when the deadline expired,
    /// or the accept-loop failure that ended the server earlier.
    pub async fn stop(self, deadline: Duration) -> Result<(), LifecycleError> {
        info!("shutting down server");
        self.state.send_replace(LifecycleState::ShuttingDown);
        if let Some(probe) = &self.lifecycle {
            probe.mark_draining();
        }

        // The stop command is queued when the future is created.
        drop(self.server.stop(true));
        let mut supervisor = self.supervisor;
        let outcome = match tokio::time::timeout(deadline, &mut supervisor).await {
            Ok(Ok(served)) => served,
            Ok(Err(err)) => Err(LifecycleError::Join(err.to_string())),
            Err(_) => {
                warn!(
                    deadline_ms = deadline.as_millis(),
                    "graceful shutdown timed out; leaving workers to drain"
                );
                Err(LifecycleError::ShutdownTimeout(deadline))
            }
        };
        self.state.send_replace(LifecycleState::Stopped);

        match &outcome {
            Ok(()) => info!("server shutdown completed"),
            Err(err) => error!(error = %err, "server shutdown failed"),
        }
        outcome
    }
}

/// Whole seconds granted to workers for draining; never rounds down to zero.
pub(crate) fn worker_shutdown_secs(grace: Duration) -> u64 {
    grace.as_secs() + u64::from(grace.subsec_nanos() > 0)
}

/// Bind the configured address and serve `deps` on a supervised task.
///
/// Must be called from within an actix system.
///
/// # Errors
/// Returns [`LifecycleError::Bind`] when the address cannot be bound;
/// nothing is served in that case.
pub fn start(
    deps: AppDependencies,
    config: ServerConfig,
    shutdown: Shutdown,
) -> Result<ServerHandle, LifecycleError> {
    let ServerConfig {
        bind_addr,
        shutdown_grace,
        lifecycle,
    } = config;
    info!(address = %bind_addr, "starting server");

    let state: StateTx = Arc::new(watch::Sender::new(LifecycleState::Idle));
    let server = HttpServer::new(move || build_app(deps.clone()))
        .disable_signals()
        .shutdown_timeout(worker_shutdown_secs(shutdown_grace))
        .bind(bind_addr.as_str())
        .map_err(|source| {
            error!(address = %bind_addr, error = %source, "failed to bind listener");
            LifecycleError::Bind {
                address: bind_addr.clone(),
                source,
            }
        })?;
    let addrs = server.addrs();
    state.send_replace(LifecycleState::Listening);

    let server = server.run();
    let handle = server.handle();
    let supervisor = actix_web::rt::spawn(supervise(server, state.clone(), shutdown.clone()));
    state.send_if_modified(|current| {
        let listening = *current == LifecycleState::Listening;
        if listening {
            *current = LifecycleState::Serving;
        }
        listening
    });

    if let Some(probe) = &lifecycle {
        probe.mark_ready();
    }
    for addr in &addrs {
        info!(address = %addr, "server listening");
    }

    Ok(ServerHandle {
        addrs,
        server: handle,
        state,
        supervisor,
        lifecycle,
        shutdown,
        grace: shutdown_grace,
    })
}

/// Drive the accept loop to completion.
///
/// An error while the server is not shutting down marks it failed and
/// requests process shutdown.
pub(crate) async fn supervise<F>(
    serve: F,
    state: StateTx,
    shutdown: Shutdown,
) -> Result<(), LifecycleError>
where
    F: Future<Output = std::io::Result<()>>,
{
    let Err(err) = serve.await else {
        return Ok(());
    };
    if matches!(
        *state.borrow(),
        LifecycleState::ShuttingDown | LifecycleState::Stopped
    ) {
        debug!(error = %err, "accept loop ended during shutdown");
        return Ok(());
    }
    error!(error = %err, "server failed");
    state.send_replace(LifecycleState::Failed);
    if shutdown.request() {
        info!("process shutdown requested after server failure");
    }
    Err(LifecycleError::Serve(err))
}

#[cfg(test)]
mod tests;

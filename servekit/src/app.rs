//! Application assembly and middleware wiring.
//!
//! [`HttpModule`] collects settings, collaborators and route registrations,
//! and [`build_app`] turns them into an actix-web application with the
//! standard middleware chain, outermost first:
//!
//! 1. [`Trace`]: request id, `trace-id` header and request log.
//! 2. [`Recover`]: handler panics become 500 responses.
//! 3. Metrics, when enabled.
//! 4. GET-only guard, when enabled.
//!
//! Unmatched routes are answered by the configured [`Fallback`].

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::{Condition, from_fn};
use actix_web::{App, web};
use prometheus::Registry;
use tracing::info;
use utoipa::openapi::OpenApi;

use crate::config::{DocsSettings, HttpSettings};
use crate::docs::{self, DocsHandler};
use crate::fallback::{self, Fallback};
use crate::health::{HealthHandler, HealthService, LifecycleProbe, Version};
use crate::metrics::MetricsLayer;
use crate::middleware::{Recover, Trace, get_only};
use crate::server::proxy::ProxyPolicy;
use crate::server::{self, LifecycleError, ServerConfig, ServerHandle, Shutdown};

/// Registers a group of routes on the application.
///
/// Closures taking `&mut ServiceConfig` implement this trait; annotate the
/// parameter type so the closure accepts any borrow.
///
/// # Examples
/// ```
/// use actix_web::{HttpResponse, web};
/// use servekit::app::Routes;
///
/// struct Orders;
///
/// impl Routes for Orders {
///     fn register(&self, cfg: &mut web::ServiceConfig) {
///         cfg.route("/orders", web::get().to(|| async { HttpResponse::Ok().finish() }));
///     }
/// }
/// ```
pub trait Routes: Send + Sync {
    /// Add routes, resources or scopes to `cfg`.
    fn register(&self, cfg: &mut web::ServiceConfig);
}

impl<F> Routes for F
where
    F: Fn(&mut web::ServiceConfig) + Send + Sync,
{
    fn register(&self, cfg: &mut web::ServiceConfig) {
        self(cfg);
    }
}

/// Everything one application instance needs; cloned per worker.
#[derive(Clone)]
pub struct AppDependencies {
    proxy: web::Data<ProxyPolicy>,
    fallback: web::Data<Fallback>,
    health: HealthHandler,
    docs: Option<web::Data<DocsHandler>>,
    metrics: MetricsLayer,
    get_only: bool,
    routes: Vec<Arc<dyn Routes>>,
}

/// Build the application described by `deps`.
pub fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        proxy,
        fallback,
        health,
        docs,
        metrics,
        get_only: get_only_enabled,
        routes,
    } = deps;

    let app = App::new()
        .app_data(proxy)
        .app_data(fallback)
        .wrap(Condition::new(get_only_enabled, from_fn(get_only)))
        .wrap(metrics)
        .wrap(Recover)
        .wrap(Trace)
        .configure(|cfg| health.configure(cfg));

    let app = match &docs {
        Some(docs) => app.configure(|cfg| docs::configure(docs, cfg)),
        None => app,
    };

    routes
        .iter()
        .fold(app, |app, group| app.configure(|cfg| group.register(cfg)))
        .default_service(web::to(fallback::respond))
}

struct DocsSource {
    settings: DocsSettings,
    document: OpenApi,
    version: Version,
}

/// Builder for an HTTP service.
///
/// # Examples
/// ```no_run
/// use std::sync::Arc;
///
/// use servekit::app::HttpModule;
/// use servekit::config::HttpSettings;
/// use servekit::health::{HealthRegistry, LifecycleProbe, Version};
///
/// # async fn run() -> Result<(), servekit::server::LifecycleError> {
/// let probe = Arc::new(LifecycleProbe::new());
/// let health = HealthRegistry::new(Version::new("1.0.0", 1)).with_provider(probe.clone());
/// let server = HttpModule::new(HttpSettings::new("127.0.0.1:8080"))
///     .with_health(Arc::new(health))
///     .with_lifecycle_probe(probe)
///     .start()?;
/// let grace = server.shutdown_grace();
/// server.stop(grace).await
/// # }
/// ```
pub struct HttpModule {
    settings: HttpSettings,
    health: Option<Arc<dyn HealthService>>,
    lifecycle: Option<Arc<LifecycleProbe>>,
    docs: Option<DocsSource>,
    registry: Option<Registry>,
    routes: Vec<Arc<dyn Routes>>,
    fallback: Fallback,
    shutdown: Shutdown,
}

impl HttpModule {
    /// A module serving nothing but the fallback.
    #[must_use]
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            settings,
            health: None,
            lifecycle: None,
            docs: None,
            registry: None,
            routes: Vec::new(),
            fallback: Fallback::default(),
            shutdown: Shutdown::new(),
        }
    }

    /// Serve the `/health` probes from `service`.
    #[must_use]
    pub fn with_health(mut self, service: Arc<dyn HealthService>) -> Self {
        self.health = Some(service);
        self
    }

    /// Drive `probe` from the server lifecycle.
    ///
    /// Register the same probe with the health service to expose it.
    #[must_use]
    pub fn with_lifecycle_probe(mut self, probe: Arc<LifecycleProbe>) -> Self {
        self.lifecycle = Some(probe);
        self
    }

    /// Serve `document` under `/swagger/` when `settings.enabled`.
    #[must_use]
    pub fn with_docs(
        mut self,
        settings: DocsSettings,
        document: OpenApi,
        version: Version,
    ) -> Self {
        self.docs = Some(DocsSource {
            settings,
            document,
            version,
        });
        self
    }

    /// Record metrics into `registry` instead of a private one.
    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Mount `routes`.
    #[must_use]
    pub fn with_routes(mut self, routes: impl Routes + 'static) -> Self {
        self.routes.push(Arc::new(routes));
        self
    }

    /// Answer unmatched routes with `fallback`.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Share `shutdown` with the rest of the process.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Loaded settings.
    #[must_use]
    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Validate the settings and build the per-app dependencies.
    ///
    /// # Errors
    /// Returns [`LifecycleError::Config`] or [`LifecycleError::Metrics`]
    /// when the settings are invalid.
    pub fn dependencies(&self) -> Result<AppDependencies, LifecycleError> {
        let metrics = MetricsLayer::build(&self.settings, self.registry.clone())?;
        if metrics.is_enabled() {
            info!(namespace = %self.settings.metrics_namespace()?, "metrics enabled");
        }
        let docs = self.docs.as_ref().map(|source| {
            web::Data::new(DocsHandler::new(
                source.settings.clone(),
                source.document.clone(),
                &source.version,
            ))
        });
        Ok(AppDependencies {
            proxy: web::Data::new(ProxyPolicy::from_settings(&self.settings)?),
            fallback: web::Data::new(self.fallback.clone()),
            health: HealthHandler::new(self.health.clone()),
            docs,
            metrics,
            get_only: self.settings.get_only,
            routes: self.routes.clone(),
        })
    }

    /// Bind the listener and start serving.
    ///
    /// Must be called from within an actix system.
    ///
    /// # Errors
    /// Returns [`LifecycleError`] when the settings are invalid or the
    /// address cannot be bound.
    pub fn start(self) -> Result<ServerHandle, LifecycleError> {
        let deps = self.dependencies()?;
        let config = ServerConfig::from_settings(&self.settings);
        let config = match self.lifecycle {
            Some(probe) => config.with_lifecycle_probe(probe),
            None => config,
        };
        server::start(deps, config, self.shutdown)
    }
}

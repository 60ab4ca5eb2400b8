//! Optional Prometheus metrics middleware wrapper.
//!
//! When enabled, requests are counted and timed by `actix-web-prom` and the
//! registry is exposed at `GET /metrics` in the Prometheus text format.
//! Disabled, the layer passes requests through untouched and no endpoint is
//! served.

use actix_service::{
    Service, ServiceExt as _, Transform,
    boxed::{self, BoxService},
};
use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Compat;
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use futures_util::future::LocalBoxFuture;
use prometheus::Registry;
use std::sync::Arc;

use crate::config::{ConfigError, HttpSettings};

/// Path serving the metrics registry.
pub const METRICS_PATH: &str = "/metrics";

/// Failure to configure the metrics layer.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The metrics settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `actix-web-prom` rejected the configuration.
    #[error("failed to build Prometheus middleware: {0}")]
    Build(String),
}

#[derive(Clone)]
pub(crate) enum MetricsLayer {
    Enabled(Arc<PrometheusMetrics>),
    Disabled,
}

impl MetricsLayer {
    #[must_use]
    pub(crate) fn from_option(metrics: Option<PrometheusMetrics>) -> Self {
        match metrics {
            Some(metrics) => Self::Enabled(Arc::new(metrics)),
            None => Self::Disabled,
        }
    }

    /// Build the layer described by `settings`.
    ///
    /// Metrics are recorded into `registry`, or into a fresh registry so
    /// separate apps in one process never collide.
    pub(crate) fn build(
        settings: &HttpSettings,
        registry: Option<Registry>,
    ) -> Result<Self, MetricsError> {
        if !settings.metrics_enabled {
            return Ok(Self::Disabled);
        }
        let metrics = PrometheusMetricsBuilder::new(settings.metrics_namespace()?)
            .endpoint(METRICS_PATH)
            .registry(registry.unwrap_or_default())
            .build()
            .map_err(|err| MetricsError::Build(err.to_string()))?;
        Ok(Self::from_option(Some(metrics)))
    }

    pub(crate) fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        match self.clone() {
            MetricsLayer::Enabled(metrics) => {
                let fut = Compat::new((*metrics).clone()).new_transform(service);
                Box::pin(async move {
                    let svc = fut.await?;
                    Ok(boxed::service(svc))
                })
            }
            MetricsLayer::Disabled => Box::pin(async move {
                let svc = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
                Ok(boxed::service(svc))
            }),
        }
    }
}

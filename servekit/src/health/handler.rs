//! HTTP handlers for `/health`, `/health/live`, `/health/ready` and
//! `/health/startup`.

use std::sync::Arc;

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, ResponseError, web};

use super::dto::HealthResponse;
use super::service::{CheckStatus, HealthService, Probe};
use crate::error::{Error, ErrorResponse};

/// Serves the probe endpoints from an optional [`HealthService`].
///
/// Without a service every probe answers 404.
#[derive(Clone, Default)]
pub struct HealthHandler {
    service: Option<Arc<dyn HealthService>>,
}

impl HealthHandler {
    /// Serve probes from `service`.
    #[must_use]
    pub fn new(service: Option<Arc<dyn HealthService>>) -> Self {
        Self { service }
    }

    /// Mount the probe routes.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.clone()))
            .route("/health", web::get().to(health))
            .route("/health/live", web::get().to(live))
            .route("/health/ready", web::get().to(ready))
            .route("/health/startup", web::get().to(startup));
    }

    async fn respond(&self, probe: Probe) -> HttpResponse {
        let Some(service) = &self.service else {
            return Error::not_found("").error_response();
        };
        let result = service.check(probe).await;
        let body = HealthResponse::new(result, &service.version());
        HttpResponse::build(probe_status(body.status))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .json(body)
    }
}

/// HTTP status for an overall check status: `fail` is 503, anything else 200.
///
/// # Examples
/// ```
/// use actix_web::http::StatusCode;
/// use servekit::health::{CheckStatus, probe_status};
///
/// assert_eq!(probe_status(CheckStatus::Warn), StatusCode::OK);
/// assert_eq!(probe_status(CheckStatus::Fail), StatusCode::SERVICE_UNAVAILABLE);
/// ```
#[must_use]
pub fn probe_status(status: CheckStatus) -> StatusCode {
    match status {
        CheckStatus::Fail => StatusCode::SERVICE_UNAVAILABLE,
        CheckStatus::Pass | CheckStatus::Warn => StatusCode::OK,
    }
}

/// Liveness probe. Return 200 while the service is running and 503 once it fails.
#[utoipa::path(
    get,
    path = "/health",
    tags = ["health"],
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse),
        (status = 404, description = "Health checks are not configured", body = ErrorResponse),
        (status = 503, description = "Service is not alive", body = HealthResponse)
    )
)]
pub async fn health(handler: web::Data<HealthHandler>) -> HttpResponse {
    handler.respond(Probe::Liveness).await
}

/// Liveness probe under its explicit path.
#[utoipa::path(
    get,
    path = "/health/live",
    tags = ["health"],
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse),
        (status = 404, description = "Health checks are not configured", body = ErrorResponse),
        (status = 503, description = "Service is not alive", body = HealthResponse)
    )
)]
pub async fn live(handler: web::Data<HealthHandler>) -> HttpResponse {
    handler.respond(Probe::Liveness).await
}

/// Readiness probe. Return 200 when the service can take traffic; 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tags = ["health"],
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 404, description = "Health checks are not configured", body = ErrorResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse)
    )
)]
pub async fn ready(handler: web::Data<HealthHandler>) -> HttpResponse {
    handler.respond(Probe::Readiness).await
}

/// Startup probe. Return 200 once initialisation has completed; 503 before.
#[utoipa::path(
    get,
    path = "/health/startup",
    tags = ["health"],
    responses(
        (status = 200, description = "Service has completed initialisation", body = HealthResponse),
        (status = 404, description = "Health checks are not configured", body = ErrorResponse),
        (status = 503, description = "Service is still initialising", body = HealthResponse)
    )
)]
pub async fn startup(handler: web::Data<HealthHandler>) -> HttpResponse {
    handler.respond(Probe::Startup).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::service::{CheckDetail, CheckResult, Version};
    use actix_web::{App, test as actix_test};
    use async_trait::async_trait;
    use rstest::rstest;

    /// Reports `status` for `probe` and `pass` for every other probe.
    struct Scripted {
        probe: Probe,
        status: CheckStatus,
    }

    impl Scripted {
        fn result_for(&self, probe: Probe) -> CheckResult {
            let status = if probe == self.probe {
                self.status
            } else {
                CheckStatus::Pass
            };
            CheckResult::default().with_check("scripted", CheckDetail::new(status))
        }
    }

    #[async_trait]
    impl HealthService for Scripted {
        async fn check_liveness(&self) -> CheckResult {
            self.result_for(Probe::Liveness)
        }

        async fn check_readiness(&self) -> CheckResult {
            self.result_for(Probe::Readiness)
        }

        async fn check_startup(&self) -> CheckResult {
            self.result_for(Probe::Startup)
        }

        fn version(&self) -> Version {
            Version::new("2.0.0", 9)
        }
    }

    async fn get(handler: HealthHandler, path: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let app =
            actix_test::init_service(App::new().configure(|cfg| handler.configure(cfg))).await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri(path).to_request(),
        )
        .await;
        let status = res.status();
        let cache = res
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        (status, cache, actix_test::read_body(res).await.to_vec())
    }

    #[rstest]
    #[case("/health", Probe::Liveness)]
    #[case("/health/live", Probe::Liveness)]
    #[case("/health/ready", Probe::Readiness)]
    #[case("/health/startup", Probe::Startup)]
    #[actix_rt::test]
    async fn maps_overall_status_onto_http_status(
        #[case] path: &str,
        #[case] probe: Probe,
        #[values(CheckStatus::Pass, CheckStatus::Warn, CheckStatus::Fail)] status: CheckStatus,
    ) {
        let handler = HealthHandler::new(Some(Arc::new(Scripted { probe, status })));

        let (code, cache, body) = get(handler, path).await;
        assert_eq!(code, probe_status(status));
        assert_eq!(cache.as_deref(), Some("no-store"));
        let body: HealthResponse = serde_json::from_slice(&body).expect("health body");
        assert_eq!(body.status, status);
        assert_eq!(body.version, "2.0.0");
        assert_eq!(body.release_id, 9);
        assert_eq!(body.checks["scripted"].status, status);
    }

    #[rstest]
    #[case("/health")]
    #[case("/health/live")]
    #[case("/health/ready")]
    #[case("/health/startup")]
    #[actix_rt::test]
    async fn unconfigured_probes_answer_not_found(#[case] path: &str) {
        let (code, _, body) = get(HealthHandler::default(), path).await;

        assert_eq!(code, StatusCode::NOT_FOUND);
        let body: ErrorResponse = serde_json::from_slice(&body).expect("error body");
        assert_eq!(body.message, "Not Found");
    }

    #[rstest]
    #[case(CheckStatus::Pass, StatusCode::OK)]
    #[case(CheckStatus::Warn, StatusCode::OK)]
    #[case(CheckStatus::Fail, StatusCode::SERVICE_UNAVAILABLE)]
    fn status_mapping(#[case] status: CheckStatus, #[case] expected: StatusCode) {
        assert_eq!(probe_status(status), expected);
    }
}

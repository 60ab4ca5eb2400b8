//! Swagger UI and API document serving.
//!
//! The document is served at `/swagger/doc.json` and the UI under
//! `/swagger/`. Its `info.version` is the service version and its single
//! server URL is `{scheme}://{host}{base_path}`. A configured public host
//! always wins; otherwise host and scheme are taken from the first request
//! to the docs routes and fixed for the lifetime of the process.

use std::sync::OnceLock;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, HeaderValue};
use actix_web::middleware::{Next, from_fn};
use actix_web::{HttpRequest, HttpResponse, web};
use sha2::{Digest, Sha256};
use tracing::{debug, error};
use utoipa::openapi::OpenApi;
use utoipa::openapi::server::Server;
use utoipa_swagger_ui::{Config, SwaggerUi};

use crate::config::DocsSettings;
use crate::error::Error;
use crate::health::Version;
use crate::server::proxy::ProxyPolicy;

/// Path of the served API document.
pub const DOC_PATH: &str = "/swagger/doc.json";

/// Where clients reach the service, fixed on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    scheme: String,
    host: String,
}

/// Serves an OpenAPI document and the Swagger UI pointing at it.
///
/// Share one instance across workers (it is wrapped in [`web::Data`]) so
/// host inference happens once per process.
pub struct DocsHandler {
    settings: DocsSettings,
    document: OpenApi,
    origin: OnceLock<Origin>,
}

impl DocsHandler {
    /// Serve `document`, stamped with `version`.
    #[must_use]
    pub fn new(settings: DocsSettings, mut document: OpenApi, version: &Version) -> Self {
        if !version.version.is_empty() {
            document.info.version.clone_from(&version.version);
        }
        Self {
            settings,
            document,
            origin: OnceLock::new(),
        }
    }

    /// Whether the docs routes are served.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn origin(&self, req: &HttpRequest, proxy: &ProxyPolicy) -> &Origin {
        self.origin.get_or_init(|| {
            let origin = Origin {
                scheme: proxy.scheme(req),
                host: self
                    .settings
                    .public_host()
                    .map_or_else(|| proxy.host(req), str::to_owned),
            };
            debug!(scheme = %origin.scheme, host = %origin.host, "api document origin fixed");
            origin
        })
    }

    /// The document as served in response to `req`.
    #[must_use]
    pub fn document(&self, req: &HttpRequest, proxy: &ProxyPolicy) -> OpenApi {
        let Origin { scheme, host } = self.origin(req, proxy);
        let base = self.settings.public_path();
        let mut document = self.document.clone();
        document.servers = Some(vec![Server::new(format!("{scheme}://{host}{base}"))]);
        document
    }

    fn respond(&self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        let proxy = proxy_policy(req);
        let body = serde_json::to_vec(&self.document(req, &proxy)).map_err(|err| {
            error!(error = %err, "failed to serialise api document");
            Error::internal("failed to serialise api document")
        })?;
        let etag = weak_etag(&body);
        let etag_header = HeaderValue::from_str(&etag)
            .map_err(|_| Error::internal("failed to encode document etag"))?;
        let fresh = req
            .headers()
            .get(header::IF_NONE_MATCH)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|candidates| etag_matches(candidates, &etag));
        let mut response = if fresh {
            HttpResponse::NotModified()
        } else {
            HttpResponse::Ok()
        };
        response.insert_header((header::ETAG, etag_header));
        if fresh {
            return Ok(response.finish());
        }
        Ok(response.content_type("application/json").body(body))
    }
}

/// Mount `/swagger/doc.json` and the Swagger UI when docs are enabled.
///
/// Every route under `/swagger` fixes the document origin, so opening the UI
/// first pins the host the UI was reached through.
pub fn configure(docs: &web::Data<DocsHandler>, cfg: &mut web::ServiceConfig) {
    if !docs.is_enabled() {
        return;
    }
    cfg.app_data(docs.clone()).service(
        web::scope("/swagger")
            .wrap(from_fn(fix_origin))
            .route("/doc.json", web::get().to(serve_document))
            .service(SwaggerUi::new("/{_:.*}").config(Config::from(DOC_PATH))),
    );
}

fn proxy_policy(req: &HttpRequest) -> ProxyPolicy {
    req.app_data::<web::Data<ProxyPolicy>>()
        .map(|policy| policy.get_ref().clone())
        .unwrap_or_default()
}

async fn fix_origin(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    if let Some(docs) = req.app_data::<web::Data<DocsHandler>>() {
        docs.origin(req.request(), &proxy_policy(req.request()));
    }
    next.call(req).await
}

async fn serve_document(
    req: HttpRequest,
    docs: web::Data<DocsHandler>,
) -> Result<HttpResponse, Error> {
    docs.respond(&req)
}

fn weak_etag(body: &[u8]) -> String {
    format!("W/\"{}\"", hex::encode(Sha256::digest(body)))
}

/// `If-None-Match` uses weak comparison: `W/` prefixes are ignored.
fn etag_matches(candidates: &str, etag: &str) -> bool {
    let opaque = |tag: &str| tag.trim().trim_start_matches("W/").to_owned();
    let wanted = opaque(etag);
    candidates
        .split(',')
        .any(|candidate| candidate.trim() == "*" || opaque(candidate) == wanted)
}

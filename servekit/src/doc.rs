//! OpenAPI description of the endpoints this crate serves itself.
//!
//! [`ApiDoc`] registers the health probe paths, the health DTOs and the
//! error envelopes. Services merge it into their own document:
//!
//! ```
//! use servekit::doc::ApiDoc;
//! use utoipa::OpenApi;
//!
//! #[derive(OpenApi)]
//! #[openapi(info(title = "Orders"))]
//! struct OrdersDoc;
//!
//! let mut doc = OrdersDoc::openapi();
//! doc.merge(ApiDoc::openapi());
//! assert!(doc.paths.paths.contains_key("/health/ready"));
//! ```
//!
//! The generated document is exported via `cargo run --bin openapi-dump`.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::health::{CheckStatus, HealthCheck, HealthResponse};
use crate::validation::FieldError;

/// OpenAPI document for the health probes and shared error shapes.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "servekit",
        description = "Health probes and error envelopes shared by servekit services."
    ),
    paths(
        crate::health::handler::health,
        crate::health::handler::live,
        crate::health::handler::ready,
        crate::health::handler::startup,
    ),
    components(schemas(
        HealthResponse,
        HealthCheck,
        CheckStatus,
        ErrorResponse,
        FieldError
    )),
    tags(
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;

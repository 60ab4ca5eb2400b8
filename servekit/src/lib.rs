//! Thin, typed adapters for actix-web services: validated extractors,
//! health probes, Prometheus metrics, API docs serving and a supervised
//! server lifecycle.

pub mod app;
pub mod config;
pub mod doc;
pub mod docs;
pub mod error;
pub mod fallback;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod validation;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use middleware::Trace;

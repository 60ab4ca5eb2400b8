//! Reference service: health probes, metrics and API docs around an empty
//! route table, configured from `HTTP_*` and `DOCS_*` settings.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::OrthoConfig;
use tracing::{error, info};

use servekit::ApiDoc;
use servekit::app::HttpModule;
use servekit::config::{DocsSettings, HttpSettings};
use servekit::health::{HealthRegistry, LifecycleProbe, Version};
use servekit::logging;
use servekit::server::Shutdown;
use utoipa::OpenApi;

/// Settings are read from configuration files and the environment; both
/// settings groups share one process, so command-line flags are not parsed.
fn program_name() -> [OsString; 1] {
    [std::env::args_os()
        .next()
        .unwrap_or_else(|| OsString::from("servekit"))]
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    logging::init();

    let http = HttpSettings::load_from_iter(program_name())
        .map_err(|e| std::io::Error::other(format!("failed to load HTTP settings: {e}")))?;
    let docs = DocsSettings::load_from_iter(program_name())
        .map_err(|e| std::io::Error::other(format!("failed to load docs settings: {e}")))?;

    let version = Version::new(env!("CARGO_PKG_VERSION"), 0);
    let probe = Arc::new(LifecycleProbe::new());
    let health = HealthRegistry::new(version.clone()).with_provider(probe.clone());
    let shutdown = Shutdown::new();

    let server = HttpModule::new(http)
        .with_health(Arc::new(health))
        .with_lifecycle_probe(probe)
        .with_docs(docs, ApiDoc::openapi(), version)
        .with_shutdown(shutdown.clone())
        .start()
        .map_err(std::io::Error::other)?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("interrupt received");
        }
        () = shutdown.requested() => {}
    }

    let grace = server.shutdown_grace();
    server.stop(grace).await.map_err(std::io::Error::other)
}

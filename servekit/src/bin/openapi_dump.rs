//! Print the OpenAPI document as JSON.

use std::io::{self, Write};
use std::process::ExitCode;

use servekit::ApiDoc;
use utoipa::OpenApi;

fn main() -> ExitCode {
    let rendered = ApiDoc::openapi().to_pretty_json();
    let outcome = match rendered {
        Ok(json) => writeln!(io::stdout().lock(), "{json}"),
        Err(err) => writeln!(io::stderr().lock(), "failed to render OpenAPI document: {err}")
            .and(Err(io::Error::other(err.to_string()))),
    };
    if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

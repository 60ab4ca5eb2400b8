//! JSON response for requests that match no route.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};

use crate::error::ErrorResponse;

/// Status and message answered for unmatched routes.
///
/// Defaults to `404 Not Found`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    status: StatusCode,
    message: String,
}

impl Default for Fallback {
    fn default() -> Self {
        Self::new(StatusCode::NOT_FOUND, "")
    }
}

impl Fallback {
    /// Answer unmatched routes with `status`; a blank `message` uses the
    /// status's canonical reason.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            status.canonical_reason().unwrap_or("Not Found").to_owned()
        } else {
            message
        };
        Self { status, message }
    }

    /// Status answered for unmatched routes.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Message answered for unmatched routes.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(ErrorResponse::new(
            self.message.clone(),
            self.status,
            None,
        ))
    }
}

/// Default service answering with the app's [`Fallback`].
pub(crate) async fn respond(fallback: Option<web::Data<Fallback>>) -> HttpResponse {
    fallback.map_or_else(|| Fallback::default().response(), |fallback| fallback.response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test as actix_test};
    use rstest::rstest;

    #[rstest]
    fn defaults_to_not_found() {
        let fallback = Fallback::default();

        assert_eq!(fallback.status(), StatusCode::NOT_FOUND);
        assert_eq!(fallback.message(), "Not Found");
    }

    #[rstest]
    #[case(StatusCode::GONE, "", "Gone")]
    #[case(StatusCode::FORBIDDEN, "nothing to see", "nothing to see")]
    fn blank_messages_use_the_reason(
        #[case] status: StatusCode,
        #[case] message: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(Fallback::new(status, message).message(), expected);
    }

    #[rstest]
    #[case(None, StatusCode::NOT_FOUND, "Not Found")]
    #[case(Some(Fallback::new(StatusCode::GONE, "retired")), StatusCode::GONE, "retired")]
    #[actix_rt::test]
    async fn unmatched_routes_get_the_envelope(
        #[case] fallback: Option<Fallback>,
        #[case] status: StatusCode,
        #[case] message: &str,
    ) {
        let mut app = App::new().default_service(web::to(respond));
        if let Some(fallback) = fallback {
            app = app.app_data(web::Data::new(fallback));
        }
        let app = actix_test::init_service(app).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/nope").to_request(),
        )
        .await;
        assert_eq!(res.status(), status);
        let body: ErrorResponse = actix_test::read_body_json(res).await;
        assert_eq!(body.message, message);
        assert_eq!(body.status_code, status.as_u16());
    }
}

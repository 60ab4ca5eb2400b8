//! Restrict a service to read-only methods.

use actix_web::Error;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::middleware::Next;

use crate::error::Error as ApiError;

/// Reject every method other than GET and HEAD with 405.
///
/// Wrap with [`actix_web::middleware::from_fn`]; the app builder installs it
/// behind [`actix_web::middleware::Condition`] when GET-only mode is
/// configured.
///
/// Rejected requests are answered here with a 405 [`ApiError`] envelope
/// instead of being propagated as an error.
///
/// # Errors
/// Propagates errors from the wrapped service.
pub async fn get_only(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    if matches!(*req.method(), Method::GET | Method::HEAD) {
        return next
            .call(req)
            .await
            .map(ServiceResponse::map_into_left_body);
    }
    let rejection = ApiError::method_not_allowed(format!(
        "{} is not allowed; only GET requests are accepted",
        req.method()
    ));
    Ok(req.error_response(rejection).map_into_right_body())
}

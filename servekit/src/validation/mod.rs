//! Request validation: typed parsing, structural rules and custom checks.
//!
//! Handlers declare their input as one of the extractors in [`extract`]:
//!
//! ```
//! use actix_web::HttpResponse;
//! use serde::Deserialize;
//! use servekit::validation::{ValidBody, Validated};
//! use validator::Validate;
//!
//! #[derive(Debug, Deserialize, Validate)]
//! struct CreateUser {
//!     #[validate(required, length(min = 2))]
//!     name: Option<String>,
//! }
//!
//! impl Validated for CreateUser {}
//!
//! async fn create(ValidBody(user): ValidBody<CreateUser>) -> HttpResponse {
//!     HttpResponse::Created().body(user.name.unwrap_or_default())
//! }
//! ```
//!
//! Failures render through [`actix_web::ResponseError`] as the JSON error
//! envelope, so handlers only ever observe validated values.

pub mod errors;
pub mod extract;
pub mod pipeline;
pub mod rules;

pub use errors::{FieldError, FieldErrors, message_for};
pub use extract::{ValidBody, ValidHeaders, ValidParams, ValidQuery};
pub use pipeline::{
    Location, RequestError, parse_body, parse_headers, parse_params, parse_query, validate,
};

use crate::error::Error;

/// Business validation run after the structural rules pass.
///
/// Every validation target implements this trait; the default accepts the
/// value unchanged.
///
/// # Examples
/// ```
/// use servekit::error::Error;
/// use servekit::validation::Validated;
/// use validator::Validate;
///
/// #[derive(Validate)]
/// struct Range {
///     start: u32,
///     end: u32,
/// }
///
/// impl Validated for Range {
///     fn validate_custom(&self) -> Result<(), Error> {
///         if self.start > self.end {
///             return Err(Error::invalid_request("start must not exceed end"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validated: validator::Validate {
    /// Check invariants the declarative rules cannot express.
    ///
    /// # Errors
    /// Returns the [`Error`] to surface to the client unchanged.
    fn validate_custom(&self) -> Result<(), Error> {
        Ok(())
    }
}

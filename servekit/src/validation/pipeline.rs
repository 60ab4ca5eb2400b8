//! Parse-then-validate operations for each request source.
//!
//! Each `parse_*` function deserialises one part of the request into `T`
//! and hands the value to [`validate`], which runs the structural rules
//! followed by [`Validated::validate_custom`]. Custom validation never runs
//! on a value that failed the structural rules.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, web};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::form_urlencoded;

use super::Validated;
use super::errors::FieldErrors;
use crate::error::{Error, ErrorResponse};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Request part a value is parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Request body.
    Body,
    /// Query string.
    Query,
    /// Path parameters.
    Params,
    /// Request headers.
    Headers,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Body => "body",
            Self::Query => "query",
            Self::Params => "params",
            Self::Headers => "headers",
        })
    }
}

/// Failure to turn a request into a validated value.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The request part could not be deserialised.
    #[error("failed to parse {location}: {cause}")]
    Parse {
        /// Request part that failed to parse.
        location: Location,
        /// Deserialiser message.
        cause: String,
    },
    /// One or more structural rules failed.
    #[error(transparent)]
    Invalid(#[from] FieldErrors),
    /// Custom validation rejected the value.
    #[error(transparent)]
    Rejected(Error),
}

impl RequestError {
    fn parse(location: Location, cause: impl fmt::Display) -> Self {
        Self::Parse {
            location,
            cause: cause.to_string(),
        }
    }
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse { .. } => StatusCode::BAD_REQUEST,
            Self::Invalid(errors) => errors.status_code(),
            Self::Rejected(error) => error.status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Parse { .. } => HttpResponse::build(self.status_code()).json(ErrorResponse::new(
                self.to_string(),
                self.status_code(),
                None,
            )),
            Self::Invalid(errors) => errors.error_response(),
            Self::Rejected(error) => error.error_response(),
        }
    }
}

/// Run the structural rules, then custom validation, on `value`.
///
/// # Errors
/// Returns [`RequestError::Invalid`] listing every violated rule, or
/// [`RequestError::Rejected`] carrying the custom validation error verbatim.
///
/// # Examples
/// ```
/// use servekit::validation::{RequestError, Validated, validate};
/// use validator::Validate;
///
/// #[derive(Validate)]
/// struct Search {
///     #[validate(length(min = 3))]
///     term: String,
/// }
///
/// impl Validated for Search {}
///
/// let err = validate(Search { term: "ab".into() }).err().expect("too short");
/// assert_eq!(
///     err.to_string(),
///     "validation failed: term: term must be at least 3"
/// );
/// ```
pub fn validate<T: Validated>(value: T) -> Result<T, RequestError> {
    if let Err(report) = value.validate() {
        let errors = FieldErrors::from_report(&report);
        debug!(violations = errors.len(), "request failed structural validation");
        return Err(RequestError::Invalid(errors));
    }
    value.validate_custom().map_err(RequestError::Rejected)?;
    Ok(value)
}

/// Parse the request body according to its content type and validate it.
///
/// `application/x-www-form-urlencoded` bodies are decoded as forms; every
/// other content type is decoded as JSON.
///
/// # Errors
/// Returns [`RequestError`] when decoding or validation fails.
pub fn parse_body<T>(req: &HttpRequest, body: &[u8]) -> Result<T, RequestError>
where
    T: DeserializeOwned + Validated,
{
    let value = if req.content_type() == FORM_CONTENT_TYPE {
        let form =
            std::str::from_utf8(body).map_err(|err| RequestError::parse(Location::Body, err))?;
        web::Query::<T>::from_query(form)
            .map_err(|err| RequestError::parse(Location::Body, err))?
            .into_inner()
    } else {
        serde_json::from_slice(body).map_err(|err| RequestError::parse(Location::Body, err))?
    };
    validate(value)
}

/// Parse the query string and validate it.
///
/// # Errors
/// Returns [`RequestError`] when decoding or validation fails.
pub fn parse_query<T>(req: &HttpRequest) -> Result<T, RequestError>
where
    T: DeserializeOwned + Validated,
{
    let value = web::Query::<T>::from_query(req.query_string())
        .map_err(|err| RequestError::parse(Location::Query, err))?
        .into_inner();
    validate(value)
}

/// Parse the matched path parameters and validate them.
///
/// # Errors
/// Returns [`RequestError`] when decoding or validation fails.
pub fn parse_params<T>(req: &HttpRequest) -> Result<T, RequestError>
where
    T: DeserializeOwned + Validated,
{
    let value = req
        .match_info()
        .load::<T>()
        .map_err(|err| RequestError::parse(Location::Params, err))?;
    validate(value)
}

/// Parse the request headers and validate them.
///
/// Header names are presented lower-cased and values are decoded like query
/// parameters, so numeric and boolean fields parse; repeated headers are
/// joined with `", "`. Use `#[serde(rename = "x-api-key")]` to bind
/// hyphenated names.
///
/// # Errors
/// Returns [`RequestError`] when decoding or validation fails.
pub fn parse_headers<T>(req: &HttpRequest) -> Result<T, RequestError>
where
    T: DeserializeOwned + Validated,
{
    let mut encoded = form_urlencoded::Serializer::new(String::new());
    for name in req.headers().keys() {
        let joined = req
            .headers()
            .get_all(name)
            .map(|value| value.to_str().map_err(|err| RequestError::parse(Location::Headers, err)))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        encoded.append_pair(name.as_str(), &joined);
    }
    let value = web::Query::<T>::from_query(&encoded.finish())
        .map_err(|err| RequestError::parse(Location::Headers, err))?
        .into_inner();
    validate(value)
}

//! Field-level validation failures and their human-readable messages.
//!
//! [`FieldErrors::from_report`] flattens a `validator` report into one
//! [`FieldError`] per violated rule. Nested structs contribute dotted paths
//! (`address.city`) and collections contribute indexed paths
//! (`items[1].name`). `validator` keeps fields in a hash map, so fields are
//! emitted in name order while rules within a field keep their declaration
//! order; formatting the same report twice yields identical collections.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::ErrorResponse;

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    /// Path of the offending field.
    #[schema(example = "address.city")]
    pub field: String,
    /// Rule tag, such as `required`, `min` or `oneof`.
    #[schema(example = "required")]
    pub tag: String,
    /// Offending value rendered as text; omitted when absent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Human-readable message.
    #[schema(example = "address.city is required")]
    pub message: String,
}

impl FieldError {
    fn from_violation(field: &str, violation: &ValidationError) -> Self {
        let (tag, param) = normalise(violation);
        let value = violation
            .params
            .get("value")
            .map(render)
            .unwrap_or_default();
        Self {
            field: field.to_owned(),
            message: message_for(&tag, field, &param),
            tag,
            value,
        }
    }
}

/// Ordered collection of field errors.
///
/// Renders as a 400 response whose `details` lists every [`FieldError`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    /// Flatten a `validator` report.
    ///
    /// # Examples
    /// ```
    /// use servekit::validation::FieldErrors;
    /// use validator::Validate;
    ///
    /// #[derive(Validate)]
    /// struct Signup {
    ///     #[validate(required)]
    ///     name: Option<String>,
    /// }
    ///
    /// let report = Signup { name: None }.validate().expect_err("name is missing");
    /// let errors = FieldErrors::from_report(&report);
    /// assert_eq!(errors.to_string(), "validation failed: name: name is required");
    /// ```
    #[must_use]
    pub fn from_report(report: &ValidationErrors) -> Self {
        let mut errors = Vec::new();
        collect("", report, &mut errors);
        Self(errors)
    }

    /// Field errors in report order.
    #[must_use]
    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }

    /// Number of violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no violation was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the violations.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Consume the collection.
    #[must_use]
    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl From<Vec<FieldError>> for FieldErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation failed: ")?;
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

impl ResponseError for FieldErrors {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        let details = serde_json::to_value(&self.0).ok();
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(
            self.to_string(),
            self.status_code(),
            details,
        ))
    }
}

/// Human-readable message for a rule `tag` violated by `field`.
///
/// # Examples
/// ```
/// use servekit::validation::message_for;
///
/// assert_eq!(message_for("min", "age", "18"), "age must be at least 18");
/// assert_eq!(
///     message_for("oneof", "sort", "asc desc"),
///     "sort must be one of: asc, desc"
/// );
/// assert_eq!(message_for("email", "contact", ""), "contact is invalid");
/// ```
#[must_use]
pub fn message_for(tag: &str, field: &str, param: &str) -> String {
    match tag {
        "required" => format!("{field} is required"),
        "min" => format!("{field} must be at least {param}"),
        "max" => format!("{field} must be at most {param}"),
        "url" => format!("{field} must be a valid URL"),
        "oneof" => format!("{field} must be one of: {}", param.replace(' ', ", ")),
        _ => format!("{field} is invalid"),
    }
}

fn collect(prefix: &str, report: &ValidationErrors, out: &mut Vec<FieldError>) {
    let mut fields: Vec<_> = report.errors().iter().collect();
    fields.sort_by(|(left, _), (right, _)| left.cmp(right));
    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(violations) => out.extend(
                violations
                    .iter()
                    .map(|violation| FieldError::from_violation(&path, violation)),
            ),
            ValidationErrorsKind::Struct(nested) => collect(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

/// Map a violation onto the tag and parameter used for its message.
///
/// `length` and `range` carry both bounds in one rule; they become `min` or
/// `max` depending on which bound the value violated.
fn normalise(violation: &ValidationError) -> (String, String) {
    let code = &*violation.code;
    let param = |name: &str| violation.params.get(name);
    match code {
        "length" | "range" => {
            let min = param("min");
            let max = param("max");
            let below_min = min
                .and_then(Value::as_f64)
                .zip(param("value").and_then(|value| measure(code, value)))
                .is_some_and(|(min, observed)| observed < min);
            match (min, max) {
                (Some(min), _) if below_min => ("min".to_owned(), render(min)),
                (Some(min), None) => ("min".to_owned(), render(min)),
                (_, Some(max)) => ("max".to_owned(), render(max)),
                _ => (code.to_owned(), String::new()),
            }
        }
        _ => (
            code.to_owned(),
            param("param").map(render).unwrap_or_default(),
        ),
    }
}

/// Quantity a `length` or `range` rule compares against its bounds.
fn measure(code: &str, value: &Value) -> Option<f64> {
    #[expect(
        clippy::cast_precision_loss,
        reason = "lengths are compared against declared bounds only"
    )]
    let len = |count: usize| count as f64;
    match (code, value) {
        (_, Value::Number(number)) => number.as_f64(),
        ("length", Value::String(text)) => Some(len(text.chars().count())),
        ("length", Value::Array(items)) => Some(len(items.len())),
        ("length", Value::Object(entries)) => Some(len(entries.len())),
        _ => None,
    }
}

/// Render a rule parameter or offending value as plain text.
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() && is_integral(float) => format!("{float:.0}"),
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}

fn is_integral(float: f64) -> bool {
    float.fract().abs() < f64::EPSILON && float.abs() < 1e15
}

#[cfg(test)]
mod tests;

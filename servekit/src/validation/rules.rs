//! Reusable rule functions for `#[validate(custom(function = ...))]`.

use std::borrow::Cow;

use validator::ValidationError;

/// Require `value` to be one of `allowed`.
///
/// The failure carries the `oneof` tag and the allowed values as its
/// parameter, so it is formatted as `"{field} must be one of: a, b"`.
///
/// # Errors
/// Returns a `oneof` [`ValidationError`] when `value` is not listed.
///
/// # Examples
/// ```
/// use servekit::validation::rules::one_of;
///
/// assert!(one_of("red", &["red", "green"]).is_ok());
/// let err = one_of("blue", &["red", "green"]).expect_err("not allowed");
/// assert_eq!(err.code, "oneof");
/// ```
pub fn one_of(value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        return Ok(());
    }
    let mut error = ValidationError::new("oneof");
    error.add_param(Cow::from("param"), &allowed.join(" "));
    error.add_param(Cow::from("value"), &value);
    Err(error)
}

//! JSON bodies returned by the health endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::service::{CheckDetail, CheckResult, CheckStatus, Version};

/// One named check in a probe response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// Human-readable description of the check.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Unit of measurement for the observed value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub observed_unit: String,
    /// Observed value of the check.
    #[serde(default)]
    pub observed_value: Value,
    /// Outcome of the check.
    pub status: CheckStatus,
}

impl From<CheckDetail> for HealthCheck {
    fn from(detail: CheckDetail) -> Self {
        Self {
            description: detail.description,
            observed_unit: detail.observed_unit,
            observed_value: detail.observed_value,
            status: detail.status,
        }
    }
}

/// Probe response body.
///
/// # Examples
/// ```
/// use servekit::health::{CheckResult, HealthResponse, Version};
///
/// let body = HealthResponse::new(CheckResult::default(), &Version::default());
/// let json = serde_json::to_value(&body).expect("serialise");
/// assert_eq!(json, serde_json::json!({"status": "pass"}));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall status: the worst status of all checks.
    pub status: CheckStatus,
    /// Version of the service.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schema(example = "1.4.0")]
    pub version: String,
    /// Release identifier of the service.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub release_id: u64,
    /// Checks keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, HealthCheck>,
}

impl HealthResponse {
    /// Project a check result and build identity into a response body.
    #[must_use]
    pub fn new(result: CheckResult, version: &Version) -> Self {
        Self {
            status: result.status(),
            version: version.version.clone(),
            release_id: version.release_id,
            checks: result
                .checks
                .into_iter()
                .map(|(name, detail)| (name, HealthCheck::from(detail)))
                .collect(),
        }
    }
}

#[expect(
    clippy::trivially_copy_pass_by_ref,
    reason = "serde's skip_serializing_if passes fields by reference"
)]
fn is_zero(value: &u64) -> bool {
    *value == 0
}

//! HTTP and documentation settings loaded via OrthoConfig.
//!
//! Settings are layered from configuration files, environment variables and
//! CLI flags by [`OrthoConfig`]. The raw values are validated into typed
//! runtime values by the accessors below so misconfiguration surfaces as a
//! [`ConfigError`] at startup instead of as a failing request later.

use std::net::{AddrParseError, IpAddr};
use std::time::Duration;

use actix_web::http::header::HeaderName;
use ortho_config::OrthoConfig;
use serde::Deserialize;

const DEFAULT_ADDRESS: &str = "127.0.0.1:3000";
pub(crate) const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;
const DEFAULT_METRICS_NAMESPACE: &str = "http";

/// Errors raised while validating loaded settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A trusted proxy entry is not an IP address.
    #[error("invalid trusted proxy '{value}': {source}")]
    InvalidProxy {
        /// Offending list entry.
        value: String,
        /// Parse failure reported by the standard library.
        #[source]
        source: AddrParseError,
    },
    /// The proxy header is not a valid HTTP header name.
    #[error("invalid proxy header '{value}'")]
    InvalidProxyHeader {
        /// Offending header name.
        value: String,
    },
    /// The metrics namespace is empty.
    #[error("metrics namespace must not be empty")]
    EmptyMetricsNamespace,
}

/// Listener, proxy, metrics and shutdown settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "HTTP")]
pub struct HttpSettings {
    /// Listen address (`host:port`).
    pub address: Option<String>,
    /// Comma-separated list of trusted proxy IP addresses.
    pub proxies: Option<String>,
    /// Header carrying the client IP when the peer is a trusted proxy.
    pub proxy_header: Option<String>,
    /// Reject every method other than GET and HEAD.
    #[ortho_config(default = false)]
    pub get_only: bool,
    /// Seconds granted to in-flight requests during graceful shutdown.
    pub shutdown_grace_secs: Option<u64>,
    /// Expose Prometheus metrics at `/metrics`.
    #[ortho_config(default = false)]
    pub metrics_enabled: bool,
    /// Prefix applied to the exported metric names.
    pub metrics_namespace: Option<String>,
}

impl HttpSettings {
    /// Settings listening on `address` with every optional feature disabled.
    ///
    /// # Examples
    /// ```
    /// use servekit::config::HttpSettings;
    ///
    /// let settings = HttpSettings::new("127.0.0.1:0");
    /// assert_eq!(settings.address(), "127.0.0.1:0");
    /// assert!(!settings.metrics_enabled);
    /// ```
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            proxies: None,
            proxy_header: None,
            get_only: false,
            shutdown_grace_secs: None,
            metrics_enabled: false,
            metrics_namespace: None,
        }
    }

    /// Return the configured listen address, falling back to the default.
    #[must_use]
    pub fn address(&self) -> &str {
        self.address
            .as_deref()
            .filter(|address| !address.trim().is_empty())
            .unwrap_or(DEFAULT_ADDRESS)
    }

    /// Parse the trusted proxy list.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidProxy`] for the first entry that is not
    /// an IP address.
    pub fn trusted_proxies(&self) -> Result<Vec<IpAddr>, ConfigError> {
        self.proxies
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse().map_err(|source| ConfigError::InvalidProxy {
                    value: entry.to_owned(),
                    source,
                })
            })
            .collect()
    }

    /// Parse the proxy header name, if one is configured.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidProxyHeader`] when the value is not a
    /// valid header name.
    pub fn proxy_header(&self) -> Result<Option<HeaderName>, ConfigError> {
        match self.proxy_header.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => HeaderName::try_from(name)
                .map(Some)
                .map_err(|_| ConfigError::InvalidProxyHeader {
                    value: name.to_owned(),
                }),
        }
    }

    /// Return the graceful shutdown deadline.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(
            self.shutdown_grace_secs
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
        )
    }

    /// Return the metrics namespace, falling back to the default.
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyMetricsNamespace`] when explicitly set to
    /// blank.
    pub fn metrics_namespace(&self) -> Result<&str, ConfigError> {
        match self.metrics_namespace.as_deref() {
            None => Ok(DEFAULT_METRICS_NAMESPACE),
            Some(namespace) if namespace.trim().is_empty() => {
                Err(ConfigError::EmptyMetricsNamespace)
            }
            Some(namespace) => Ok(namespace),
        }
    }
}

/// API documentation settings.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DOCS")]
pub struct DocsSettings {
    /// Serve the Swagger UI and the API document.
    #[ortho_config(default = false)]
    pub enabled: bool,
    /// Host advertised in the document; inferred from the first request when unset.
    pub public_host: Option<String>,
    /// Base path advertised in the document.
    pub public_path: Option<String>,
}

impl DocsSettings {
    /// Return the configured public host, ignoring blank values.
    #[must_use]
    pub fn public_host(&self) -> Option<&str> {
        self.public_host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
    }

    /// Return the configured base path, or an empty string.
    #[must_use]
    pub fn public_path(&self) -> &str {
        self.public_path.as_deref().map_or("", str::trim)
    }
}

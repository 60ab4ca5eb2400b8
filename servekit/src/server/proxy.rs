//! Trusted-proxy policy for client address, host and scheme resolution.
//!
//! Forwarding headers are only honoured when the direct peer is one of the
//! configured trusted proxies; otherwise the connection's own values are
//! used so clients cannot spoof their address or the advertised host.

use std::net::IpAddr;

use actix_web::HttpRequest;
use actix_web::http::header::{self, HeaderName};

use crate::config::{ConfigError, HttpSettings};

/// Resolves client-facing request attributes according to the proxy trust list.
#[derive(Debug, Clone, Default)]
pub struct ProxyPolicy {
    trusted: Vec<IpAddr>,
    header: Option<HeaderName>,
}

impl ProxyPolicy {
    /// Build a policy trusting `trusted` peers and reading the client IP from `header`.
    #[must_use]
    pub fn new(trusted: Vec<IpAddr>, header: Option<HeaderName>) -> Self {
        Self { trusted, header }
    }

    /// Build a policy from loaded settings.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the proxy list or header name is invalid.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            settings.trusted_proxies()?,
            settings.proxy_header()?,
        ))
    }

    /// Whether the direct peer of `req` is a trusted proxy.
    #[must_use]
    pub fn is_trusted(&self, req: &HttpRequest) -> bool {
        req.peer_addr()
            .is_some_and(|peer| self.trusted.contains(&peer.ip()))
    }

    /// Client IP: the first entry of the proxy header when the peer is
    /// trusted, the peer address otherwise.
    #[must_use]
    pub fn client_ip(&self, req: &HttpRequest) -> Option<String> {
        let forwarded = self
            .header
            .as_ref()
            .filter(|_| self.is_trusted(req))
            .and_then(|name| req.headers().get(name))
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        forwarded.or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
    }

    /// Host the client used to reach the service, including any port.
    #[must_use]
    pub fn host(&self, req: &HttpRequest) -> String {
        if self.is_trusted(req) {
            return req.connection_info().host().to_owned();
        }
        req.headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .or_else(|| req.uri().authority().map(ToString::to_string))
            .unwrap_or_else(|| req.app_config().host().to_owned())
    }

    /// Scheme the client used to reach the service.
    #[must_use]
    pub fn scheme(&self, req: &HttpRequest) -> String {
        if self.is_trusted(req) {
            return req.connection_info().scheme().to_owned();
        }
        if req.app_config().secure() {
            "https".to_owned()
        } else {
            "http".to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use rstest::{fixture, rstest};
    use std::net::SocketAddr;

    const PROXY: &str = "10.0.0.1:4000";
    const CLIENT: &str = "192.0.2.7:5000";

    #[fixture]
    fn policy() -> ProxyPolicy {
        ProxyPolicy::new(
            vec!["10.0.0.1".parse().expect("ip")],
            Some(HeaderName::from_static("x-forwarded-for")),
        )
    }

    fn request_from(peer: &str) -> TestRequest {
        TestRequest::default()
            .peer_addr(peer.parse::<SocketAddr>().expect("socket addr"))
            .insert_header((header::HOST, "internal:8080"))
            .insert_header(("x-forwarded-for", "203.0.113.9, 10.0.0.1"))
            .insert_header(("x-forwarded-host", "api.example.com"))
            .insert_header(("x-forwarded-proto", "https"))
    }

    #[rstest]
    fn trusted_peer_forwards_client_attributes(policy: ProxyPolicy) {
        let req = request_from(PROXY).to_http_request();

        assert!(policy.is_trusted(&req));
        assert_eq!(policy.client_ip(&req).as_deref(), Some("203.0.113.9"));
        assert_eq!(policy.host(&req), "api.example.com");
        assert_eq!(policy.scheme(&req), "https");
    }

    #[rstest]
    fn untrusted_peer_ignores_forwarding_headers(policy: ProxyPolicy) {
        let req = request_from(CLIENT).to_http_request();

        assert!(!policy.is_trusted(&req));
        assert_eq!(policy.client_ip(&req).as_deref(), Some("192.0.2.7"));
        assert_eq!(policy.host(&req), "internal:8080");
        assert_eq!(policy.scheme(&req), "http");
    }

    #[rstest]
    fn empty_policy_trusts_nobody() {
        let req = request_from(PROXY).to_http_request();
        let policy = ProxyPolicy::default();

        assert!(!policy.is_trusted(&req));
        assert_eq!(policy.client_ip(&req).as_deref(), Some("10.0.0.1"));
    }
}

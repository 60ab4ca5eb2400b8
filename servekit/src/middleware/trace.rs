//! Request tracing: a trace identifier per request, echoed in the
//! `trace-id` response header, plus one structured log line per request.
//!
//! The identifier lives in a Tokio task-local for the duration of the
//! handler, so errors built anywhere in the request pick it up. An inbound
//! `trace-id` header holding a UUID is reused instead of minting a new one.
//!
//! Task-locals do not follow work onto spawned tasks; wrap such work in
//! [`TraceId::scope`] to keep the identifier visible there.

use std::cell::RefCell;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::web::Bytes;
use actix_web::{Error, HttpMessage as _, web};
use futures_util::StreamExt as _;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::future::Future;
use tokio::task_local;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::TRACE_ID_HEADER;
use crate::server::proxy::ProxyPolicy;

task_local! {
    static TRACE_ID: TraceId;
}

/// UUID correlating one request across log lines and error bodies.
///
/// # Examples
/// ```
/// use servekit::middleware::trace::TraceId;
///
/// let id: TraceId = "6f1c1a9e-7c3c-4d5e-9c71-0b8c2d0f4a11".parse().expect("uuid");
/// assert_eq!(id.to_string(), "6f1c1a9e-7c3c-4d5e-9c71-0b8c2d0f4a11");
/// assert!(TraceId::current().is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceId(pub(crate) Uuid);

impl TraceId {
    #[rustfmt::skip]
    fn generate() -> Self { Self(Uuid::new_v4()) }

    /// Identifier of the request being handled, if any.
    #[rustfmt::skip]
    pub fn current() -> Option<Self> { TRACE_ID.try_with(|id| *id).ok() }

    /// Run `fut` with `trace_id` as the current identifier.
    ///
    /// # Examples
    /// ```
    /// use servekit::middleware::trace::TraceId;
    ///
    /// # actix_web::rt::System::new().block_on(async {
    /// let id: TraceId = "6f1c1a9e-7c3c-4d5e-9c71-0b8c2d0f4a11".parse().expect("uuid");
    /// let seen = TraceId::scope(id, async { TraceId::current() }).await;
    /// assert_eq!(seen, Some(id));
    /// # });
    /// ```
    pub async fn scope<Fut>(trace_id: Self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        TRACE_ID.scope(trace_id, fut).await
    }

    fn from_request(req: &ServiceRequest) -> Option<Self> {
        req.headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Probe and scrape endpoints are polled constantly and stay out of the
/// request log.
pub(crate) fn is_quiet_path(path: &str) -> bool {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    path == "/health"
        || path == "/metrics"
        || path.starts_with("/health/")
        || path.starts_with("/metrics/")
}

/// Longest request body prefix attached to a rejected request's log line.
const MAX_LOGGED_BODY: usize = 4096;

/// Copy of the request body prefix the handler consumed.
#[derive(Clone, Default)]
struct BodyRecorder(Rc<RefCell<Vec<u8>>>);

impl BodyRecorder {
    fn record(&self, chunk: &Bytes) {
        let mut buffer = self.0.borrow_mut();
        let room = MAX_LOGGED_BODY.saturating_sub(buffer.len());
        buffer.extend_from_slice(chunk.get(..room.min(chunk.len())).unwrap_or_default());
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Route the request payload through the recorder.
    fn attach(&self, req: &mut ServiceRequest) {
        let recorder = self.clone();
        let stream = req.take_payload().inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                recorder.record(bytes);
            }
        });
        req.set_payload(Payload::Stream {
            payload: Box::pin(stream),
        });
    }
}

/// Request attributes captured before the request is handed to the service.
struct RequestLog {
    method: String,
    url: String,
    ip: String,
    user_agent: String,
    body: BodyRecorder,
    started: Instant,
}

impl RequestLog {
    fn capture(req: &mut ServiceRequest) -> Self {
        let ip = req
            .app_data::<web::Data<ProxyPolicy>>()
            .and_then(|policy| policy.client_ip(req.request()))
            .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
            .unwrap_or_default();
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let body = BodyRecorder::default();
        body.attach(req);
        Self {
            method: req.method().to_string(),
            url: req.uri().to_string(),
            ip,
            user_agent,
            body,
            started: Instant::now(),
        }
    }

    fn finish<B>(self, trace_id: TraceId, res: &ServiceResponse<B>) {
        let failure = res.response().error().map(ToString::to_string);
        self.report(trace_id, res.status(), failure.as_deref());
    }

    /// Log a request whose inner service returned an error instead of a
    /// response; the framework renders it after this layer.
    fn fail(self, trace_id: TraceId, err: &Error) {
        let status = err.as_response_error().status_code();
        self.report(trace_id, status, Some(&err.to_string()));
    }

    fn report(&self, trace_id: TraceId, status: StatusCode, failure: Option<&str>) {
        let latency = self.started.elapsed();
        emit(self, trace_id, status, latency, failure);
    }
}

fn emit(
    log: &RequestLog,
    trace_id: TraceId,
    status: StatusCode,
    latency: Duration,
    failure: Option<&str>,
) {
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    let status = status.as_u16();
    let failure = failure.unwrap_or_default();
    if status >= 500 {
        error!(
            trace_id = %trace_id, latency_ms, status, method = %log.method, url = %log.url,
            ip = %log.ip, ua = %log.user_agent, body = %log.body.text(), error = failure,
            "request failed"
        );
    } else if status >= 400 {
        warn!(
            trace_id = %trace_id, latency_ms, status, method = %log.method, url = %log.url,
            ip = %log.ip, ua = %log.user_agent, body = %log.body.text(), error = failure,
            "request rejected"
        );
    } else {
        info!(
            trace_id = %trace_id, latency_ms, status, method = %log.method, url = %log.url,
            ip = %log.ip, ua = %log.user_agent, "request handled"
        );
    }
}

/// Middleware installing a [`TraceId`] per request and logging the outcome.
///
/// Probe and scrape paths are served without a log line.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use servekit::Trace;
///
/// let app = App::new().wrap(Trace);
/// ```
#[derive(Clone)]
pub struct Trace;

impl<S, B> Transform<S, ServiceRequest> for Trace
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceMiddleware { service }))
    }
}

/// Service produced by [`Trace`].
pub struct TraceMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for TraceMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let trace_id = TraceId::from_request(&req).unwrap_or_else(TraceId::generate);
        let header_value = trace_id.to_string();
        let log = (!is_quiet_path(req.path())).then(|| RequestLog::capture(&mut req));
        let fut = self.service.call(req);
        Box::pin(TraceId::scope(trace_id, async move {
            let mut res = match fut.await {
                Ok(res) => res,
                Err(err) => {
                    if let Some(log) = log {
                        log.fail(trace_id, &err);
                    }
                    return Err(err);
                }
            };
            match HeaderValue::from_str(&header_value) {
                Ok(value) => {
                    res.response_mut()
                        .headers_mut()
                        .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
                }
                Err(error) => {
                    error!(
                        %error,
                        trace_id = %trace_id,
                        "failed to encode trace identifier header"
                    );
                }
            }
            if let Some(log) = log {
                log.finish(trace_id, &res);
            }
            Ok(res)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use actix_web::{App, HttpResponse, test as actix_test, web};
    use rstest::rstest;

    /// In-memory log sink for asserting on emitted request lines.
    #[derive(Clone, Default)]
    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl LogSink {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    impl io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn body_recorder_keeps_a_bounded_prefix() {
        let recorder = BodyRecorder::default();
        recorder.record(&Bytes::from(vec![b'a'; MAX_LOGGED_BODY - 2]));
        recorder.record(&Bytes::from_static(b"bcdef"));

        let text = recorder.text();
        assert_eq!(text.len(), MAX_LOGGED_BODY);
        assert!(text.ends_with("abc"));
    }

    #[actix_web::test]
    async fn rejected_requests_log_the_request_body() {
        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = actix_test::init_service(App::new().wrap(Trace).route(
            "/widgets",
            web::post().to(|body: String| async move { HttpResponse::BadRequest().body(body) }),
        ))
        .await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/widgets")
                .set_payload(r#"{"name":""}"#)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let logged = sink.text();
        assert!(logged.contains("request rejected"), "logs: {logged}");
        assert!(logged.contains(r#"{\"name\":\"\"}"#), "logs: {logged}");
    }

    #[actix_web::test]
    async fn handled_requests_do_not_log_the_body() {
        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = actix_test::init_service(App::new().wrap(Trace).route(
            "/widgets",
            web::post().to(|body: String| async move { HttpResponse::Ok().body(body) }),
        ))
        .await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/widgets")
                .set_payload("secret-payload")
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let logged = sink.text();
        assert!(logged.contains("request handled"), "logs: {logged}");
        assert!(!logged.contains("secret-payload"), "logs: {logged}");
    }

    #[tokio::test]
    async fn trace_id_generate_produces_uuid() {
        let trace_id = TraceId::generate();
        let parsed = Uuid::parse_str(&trace_id.to_string()).expect("valid UUID");
        assert_eq!(parsed.to_string(), trace_id.to_string());
    }

    #[tokio::test]
    async fn trace_id_current_reflects_scope() {
        let expected = TraceId::generate();
        let observed = TraceId::scope(expected, async move { TraceId::current() }).await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn trace_id_current_is_none_out_of_scope() {
        assert!(TraceId::current().is_none());
    }

    #[rstest]
    #[case("/health", true)]
    #[case("/health/", true)]
    #[case("/health/ready", true)]
    #[case("/metrics", true)]
    #[case("/metrics/", true)]
    #[case("/healthz", false)]
    #[case("/api/health", false)]
    #[case("/", false)]
    fn quiet_paths_skip_request_logging(#[case] path: &str, #[case] quiet: bool) {
        assert_eq!(is_quiet_path(path), quiet);
    }

    async fn trace_header_for(request: actix_test::TestRequest) -> (String, String) {
        let app = actix_test::init_service(App::new().wrap(Trace).route(
            "/",
            web::get().to(|| async move {
                let id = TraceId::current().expect("trace id in scope");
                HttpResponse::Ok().body(id.to_string())
            }),
        ))
        .await;
        let res = actix_test::call_service(&app, request.uri("/").to_request()).await;
        let header = res
            .headers()
            .get(TRACE_ID_HEADER)
            .expect("trace id header")
            .to_str()
            .expect("header is ascii")
            .to_owned();
        let body = actix_test::read_body(res).await;
        let body = std::str::from_utf8(&body).expect("utf8 body").to_owned();
        (header, body)
    }

    #[actix_web::test]
    async fn exposes_trace_id_in_handler() {
        let (header, body) = trace_header_for(actix_test::TestRequest::get()).await;
        assert_eq!(header, body);
        Uuid::parse_str(&header).expect("generated UUID");
    }

    #[actix_web::test]
    async fn reuses_inbound_trace_id() {
        let inbound = "6f1c1a9e-7c3c-4d5e-9c71-0b8c2d0f4a11";
        let (header, body) = trace_header_for(
            actix_test::TestRequest::get().insert_header((TRACE_ID_HEADER, inbound)),
        )
        .await;
        assert_eq!(header, inbound);
        assert_eq!(body, inbound);
    }

    #[actix_web::test]
    async fn replaces_malformed_inbound_trace_id() {
        let (header, _) = trace_header_for(
            actix_test::TestRequest::get().insert_header((TRACE_ID_HEADER, "not-a-uuid")),
        )
        .await;
        assert_ne!(header, "not-a-uuid");
        Uuid::parse_str(&header).expect("generated UUID");
    }

    #[actix_web::test]
    async fn propagates_trace_id_in_error() {
        use crate::error::{ApiResult, Error as ApiError, ErrorResponse};

        let app = actix_test::init_service(App::new().wrap(Trace).route(
            "/",
            web::get().to(|| async move {
                // The error captures the scoped TraceId automatically.
                ApiResult::<HttpResponse>::Err(ApiError::not_found("missing"))
            }),
        ))
        .await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/").to_request(),
        )
        .await;
        assert!(res.headers().contains_key(TRACE_ID_HEADER));
        let body: ErrorResponse = actix_test::read_body_json(res).await;
        assert_eq!(body.message, "missing");
        assert_eq!(body.status_code, 404);
    }
}

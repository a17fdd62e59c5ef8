//! Per-request observability: timing, access log, monitoring events, panics.
//!
//! ```text
//! START → TIMING → HANDLER_RUNNING ─┬─ COMPLETED ─→ LOGGED → (REPORTED) → END
//!                                   └─ PANIC → RECOVERED → LOGGED → REPORTED → re-panic
//! ```
//!
//! A panic is never swallowed: after it is logged and reported it resumes
//! unwinding, and the connection task dies the way it would without this
//! layer.

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use http::{Method, StatusCode, Version};
use serde_json::json;

use super::Layer;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::{Fault, Response};
use crate::telemetry::{Event, Level, LogEntry, PanicError, Telemetry, install_hook, take_backtrace};

// ── ResponseCapture ───────────────────────────────────────────────────────────

/// Records the status and size of the response on its way out.
///
/// Observation only: the response passes through untouched. The size is
/// what goes on the wire, so a `HEAD` request or a `204`/`304` response
/// counts zero body bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseCapture {
    status: StatusCode,
    bytes: u64,
    head: bool,
}

impl Default for ResponseCapture {
    fn default() -> Self {
        Self { status: StatusCode::OK, bytes: 0, head: false }
    }
}

impl ResponseCapture {
    pub fn new() -> Self { Self::default() }

    /// A capture for a request made with `method`.
    pub fn for_method(method: &Method) -> Self {
        Self { head: *method == Method::HEAD, ..Self::default() }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn bytes(&self) -> u64 { self.bytes }

    /// Records `res` and hands it back unchanged.
    pub fn observe(&mut self, res: Response) -> Response {
        self.status = res.status_code();
        if !self.head && !bodyless(self.status) {
            self.bytes += res.body().len() as u64;
        }
        res
    }

    /// Overrides the recorded status. Used when the handler never produced
    /// a response.
    pub fn force_status(&mut self, status: StatusCode) {
        self.status = status;
    }
}

fn bodyless(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

// ── Layer ─────────────────────────────────────────────────────────────────────

/// The observability middleware.
///
/// ```rust,no_run
/// # use echobin::{Router, reflect, telemetry::Telemetry, middleware::Observe};
/// let app = Router::new()
///     .fallback(reflect::echo)
///     .layer(Observe::new(Telemetry::disabled()));
/// ```
pub struct Observe {
    telemetry: Telemetry,
}

impl Observe {
    pub fn new(telemetry: Telemetry) -> Self {
        install_hook();
        Self { telemetry }
    }
}

impl Layer for Observe {
    fn wrap(&self, inner: BoxedHandler) -> BoxedHandler {
        Arc::new(Observed { inner, telemetry: self.telemetry.clone() })
    }
}

struct Observed {
    inner: BoxedHandler,
    telemetry: Telemetry,
}

impl ErasedHandler for Observed {
    fn call(&self, req: Request) -> BoxFuture {
        let inner = Arc::clone(&self.inner);
        let telemetry = self.telemetry.clone();

        Box::pin(async move {
            let meta = RequestMeta::from(&req);
            let started_at = Utc::now();
            let start = Instant::now();
            let mut capture = ResponseCapture::for_method(req.method());

            let outcome = AssertUnwindSafe(async move { inner.call(req).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(res) => {
                    let res = capture.observe(res);
                    let fault = res.fault().cloned();
                    let entry = meta.entry(
                        started_at,
                        start.elapsed(),
                        &capture,
                        fault.as_ref().map(|f| f.message.clone()),
                    );
                    telemetry.log(&entry);
                    if let Some(level) = telemetry.policy().classify(entry.status) {
                        telemetry.capture(status_event(level, &meta, &entry, fault));
                    }
                    res
                }
                Err(payload) => {
                    let err = PanicError::from_payload(&*payload);
                    capture.force_status(StatusCode::INTERNAL_SERVER_ERROR);
                    let entry = meta.entry(started_at, start.elapsed(), &capture, Some(err.to_string()));
                    telemetry.log(&entry);
                    telemetry.capture(panic_event(&err, &meta, take_backtrace()));
                    panic::resume_unwind(payload)
                }
            }
        })
    }
}

// ── Request metadata ──────────────────────────────────────────────────────────

/// What the log line and events need from the request, copied out before
/// the handler takes ownership of it.
struct RequestMeta {
    remote_addr: SocketAddr,
    method: Method,
    url: String,
    path: String,
    protocol: Version,
    user_agent: String,
    referer: String,
    host: String,
}

impl From<&Request> for RequestMeta {
    fn from(req: &Request) -> Self {
        Self {
            remote_addr: req.remote_addr(),
            method: req.method().clone(),
            url: req.uri().to_string(),
            path: req.path().to_owned(),
            protocol: req.version(),
            user_agent: req.header("user-agent").unwrap_or_default().to_owned(),
            referer: req.header("referer").unwrap_or_default().to_owned(),
            host: req.host().to_owned(),
        }
    }
}

impl RequestMeta {
    fn entry(
        &self,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        capture: &ResponseCapture,
        error: Option<String>,
    ) -> LogEntry {
        LogEntry {
            remote_addr: self.remote_addr,
            started_at,
            method: self.method.clone(),
            path: self.path.clone(),
            protocol: self.protocol,
            status: capture.status(),
            response_size: capture.bytes(),
            elapsed,
            user_agent: self.user_agent.clone(),
            referer: self.referer.clone(),
            host: self.host.clone(),
            error,
        }
    }

    fn tagged(&self, event: Event) -> Event {
        event
            .tag("http.method", self.method.as_str())
            .tag("http.url", self.url.clone())
            .tag("user_agent", self.user_agent.clone())
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

fn status_event(level: Level, meta: &RequestMeta, entry: &LogEntry, fault: Option<Fault>) -> Event {
    let summary = format!("HTTP {}: {} {}", entry.status.as_u16(), meta.method, meta.path);
    let mut event = match (level, fault) {
        (Level::Error, Some(fault)) => {
            let mut event = Event::exception(fault.kind, fault.message);
            for (k, v) in fault.tags {
                event = event.tag(&k, v);
            }
            event.extra = fault.extra;
            event
        }
        (Level::Info, _) => Event::message(Level::Info, format!("{} {}", meta.method, meta.path))
            .tag("transaction", format!("{} {}", meta.method, meta.path)),
        (level, _) => Event::message(level, summary),
    };

    event = meta.tagged(event).tag("http.status_code", entry.status.as_u16().to_string());
    event.context("request", json!({
        "method": meta.method.as_str(),
        "url": meta.url,
        "user_agent": meta.user_agent,
        "remote_ip": meta.remote_addr.to_string(),
        "response_time": entry.elapsed.as_millis() as u64,
        "response_size": entry.response_size,
    }))
}

fn panic_event(err: &PanicError, meta: &RequestMeta, backtrace: Option<String>) -> Event {
    let mut event = meta.tagged(Event::exception("HandlerPanic", err.to_string()))
        .tag("panic", "true")
        .context("request", json!({
            "method": meta.method.as_str(),
            "url": meta.url,
            "user_agent": meta.user_agent,
            "remote_ip": meta.remote_addr.to_string(),
        }));
    if let Some(trace) = backtrace {
        event = event.extra("backtrace", trace);
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn capture_starts_at_200_and_passes_through() {
        let mut capture = ResponseCapture::new();
        assert_eq!(capture.status(), StatusCode::OK);

        let res = capture.observe(Response::builder().status(StatusCode::CREATED).text("hello"));
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.body(), b"hello");
        assert_eq!(capture.status(), StatusCode::CREATED);
        assert_eq!(capture.bytes(), 5);

        capture.force_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(capture.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn head_and_bodyless_statuses_count_no_bytes() {
        let mut head = ResponseCapture::for_method(&Method::HEAD);
        let res = head.observe(Response::text("hello"));
        assert_eq!(res.body(), b"hello");
        assert_eq!(head.bytes(), 0);

        let mut get = ResponseCapture::for_method(&Method::GET);
        get.observe(Response::builder().status(StatusCode::NOT_MODIFIED).text("stale"));
        assert_eq!(get.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(get.bytes(), 0);
    }

    fn meta() -> RequestMeta {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/hook?x=1")
            .header("user-agent", "uptime-check/1.0")
            .header("host", "echo.local")
            .body(Bytes::new())
            .unwrap();
        RequestMeta::from(&Request::from(req))
    }

    fn entry_for(meta: &RequestMeta, status: StatusCode) -> LogEntry {
        let mut capture = ResponseCapture::new();
        capture.force_status(status);
        meta.entry(Utc::now(), Duration::from_millis(12), &capture, None)
    }

    #[test]
    fn server_error_without_fault_synthesizes_message() {
        let meta = meta();
        let event = status_event(Level::Error, &meta, &entry_for(&meta, StatusCode::BAD_GATEWAY), None);
        assert_eq!(event.message.as_deref(), Some("HTTP 502: POST /hook"));
        assert_eq!(event.tags["http.status_code"], "502");
        assert_eq!(event.contexts["request"]["url"], "/hook?x=1");
        assert_eq!(event.contexts["request"]["response_time"], 12);
    }

    #[test]
    fn server_error_with_fault_becomes_exception() {
        let meta = meta();
        let fault = Fault::new("BodyParseError", "expected value").tag("endpoint", "handle_request").extra("body", "{bad");
        let event = status_event(Level::Error, &meta, &entry_for(&meta, StatusCode::INTERNAL_SERVER_ERROR), Some(fault));

        let exception = event.exception.as_ref().unwrap();
        assert_eq!(exception.values[0].kind, "BodyParseError");
        assert_eq!(event.tags["endpoint"], "handle_request");
        assert_eq!(event.extra["body"], "{bad");
        assert_eq!(event.tags["user_agent"], "uptime-check/1.0");
    }

    #[test]
    fn panic_event_attaches_backtrace() {
        let meta = meta();
        let event = panic_event(&PanicError("boom".into()), &meta, Some("frame 0".into()));
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.tags["panic"], "true");
        assert_eq!(event.summary(), "panic: boom");
        assert_eq!(event.extra["backtrace"], "frame 0");
    }
}

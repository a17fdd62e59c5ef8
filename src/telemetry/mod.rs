//! Telemetry: the local access log and the external monitoring sink.
//!
//! # Data Flow
//! ```text
//! middleware::Observe
//!     → LogSink         (one access line per request, synchronous)
//!     → MonitoringSink  (error / warning / performance events, queued)
//! ```
//!
//! Both sinks live in a [`Telemetry`] handle built once at startup and
//! cloned into the middleware. Nothing here is global except the panic hook.

mod access_log;
mod event;
mod monitor;
mod panic;
mod sentry;

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tracing::{error, info};

pub use access_log::{LogEntry, LogSink, TracingSink};
pub use event::{Event, Exception, ExceptionValue, Level};
pub use monitor::{MonitoringSink, NoopMonitor};
pub use panic::{PanicError, install_hook};
pub use sentry::{Dsn, SendError, SentryMonitor};

pub(crate) use panic::take_backtrace;

use crate::config::MonitorConfig;
use crate::error::Error;

// ── Reporting policy ──────────────────────────────────────────────────────────

/// Which responses become monitoring events.
///
/// `5xx` is always an error. The lower tiers are switchable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportPolicy {
    /// `4xx` → warning.
    pub client_errors: bool,
    /// Everything below `400` → informational performance event.
    pub performance: bool,
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self { client_errors: true, performance: false }
    }
}

impl ReportPolicy {
    pub fn classify(&self, status: StatusCode) -> Option<Level> {
        if status.is_server_error() || status.as_u16() >= 600 {
            Some(Level::Error)
        } else if status.is_client_error() {
            self.client_errors.then_some(Level::Warning)
        } else {
            self.performance.then_some(Level::Info)
        }
    }
}

// ── Telemetry handle ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Telemetry {
    monitor: Arc<dyn MonitoringSink>,
    log: Arc<dyn LogSink>,
    policy: ReportPolicy,
}

impl Telemetry {
    pub fn new(monitor: Arc<dyn MonitoringSink>, log: Arc<dyn LogSink>) -> Self {
        Self { monitor, log, policy: ReportPolicy::default() }
    }

    /// Access log only; monitoring events are dropped.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopMonitor), Arc::new(TracingSink))
    }

    /// Builds the handle from configuration. No DSN means no monitoring,
    /// which is not an error. Must be called inside a tokio runtime.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, Error> {
        let policy = ReportPolicy {
            client_errors: config.report_client_errors,
            performance: config.report_performance,
        };
        let Some(dsn) = config.dsn() else {
            info!("SENTRY_DSN not set, monitoring disabled");
            return Ok(Self::disabled().with_policy(policy));
        };

        let dsn: Dsn = dsn.parse()?;
        info!(endpoint = dsn.store_url(), environment = %config.environment, "monitoring enabled");
        let monitor = SentryMonitor::spawn(dsn, config)?;
        Ok(Self::new(Arc::new(monitor), Arc::new(TracingSink)).with_policy(policy))
    }

    pub fn with_policy(mut self, policy: ReportPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ReportPolicy { self.policy }

    pub fn log(&self, entry: &LogEntry) {
        self.log.emit(entry);
    }

    pub fn capture(&self, event: Event) {
        self.monitor.capture(event);
    }

    /// Logs `err` locally and reports it with `tags` and `extra` context.
    pub fn capture_error(
        &self,
        err: &dyn std::error::Error,
        message: &str,
        tags: &[(&str, &str)],
        extra: serde_json::Map<String, serde_json::Value>,
    ) {
        error!(error = %err, "{message}");
        let mut event = Event::exception("Error", err.to_string()).tag("message", message);
        for (k, v) in tags {
            event = event.tag(k, *v);
        }
        event.extra = extra;
        self.monitor.capture(event);
    }

    /// Gives the monitoring sink up to `timeout` to drain.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.monitor.flush(timeout).await
    }
}

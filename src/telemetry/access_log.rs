//! One access-log line per request.
//!
//! ```text
//! 127.0.0.1:51234 - - "POST /api/test HTTP/1.1" 200 52 "" "curl/8.5.0" 0.001 (localhost:8081)
//! 127.0.0.1:51234 - - "GET /boom HTTP/1.1" 500 0 "" "curl/8.5.0" 0.000 (localhost:8081) error="panic: boom"
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::{Method, StatusCode, Version};
use tracing::info;

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub remote_addr: SocketAddr,
    pub started_at: DateTime<Utc>,
    pub method: Method,
    pub path: String,
    pub protocol: Version,
    pub status: StatusCode,
    pub response_size: u64,
    pub elapsed: Duration,
    pub user_agent: String,
    pub referer: String,
    pub host: String,
    pub error: Option<String>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - - \"{} {} {:?}\" {} {} \"{}\" \"{}\" {:.3} ({})",
            self.remote_addr,
            self.method,
            self.path,
            self.protocol,
            self.status.as_u16(),
            self.response_size,
            self.referer,
            self.user_agent,
            self.elapsed.as_secs_f64(),
            self.host,
        )?;
        if let Some(err) = &self.error {
            write!(f, " error=\"{err}\"")?;
        }
        Ok(())
    }
}

/// Local, synchronous destination for access-log entries.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, entry: &LogEntry);
}

/// Emits each entry as an `info` event on the `access_log` target.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, entry: &LogEntry) {
        info!(
            target: "access_log",
            status = entry.status.as_u16(),
            bytes = entry.response_size,
            elapsed_ms = entry.elapsed.as_millis() as u64,
            "{entry}"
        );
    }
}

//! Shared utilities: recording sinks and request helpers.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use echobin::telemetry::{Event, LogEntry, LogSink, MonitoringSink, Telemetry};
use echobin::{BoxedHandler, Request, Response};

/// Keeps every monitoring event.
#[derive(Default)]
pub struct RecordingMonitor(Mutex<Vec<Event>>);

impl RecordingMonitor {
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MonitoringSink for RecordingMonitor {
    fn capture(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    async fn flush(&self, _timeout: Duration) -> bool {
        true
    }
}

/// Keeps every access-log entry.
#[derive(Default)]
pub struct RecordingLog(Mutex<Vec<LogEntry>>);

impl RecordingLog {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.0.lock().unwrap().clone()
    }
}

impl LogSink for RecordingLog {
    fn emit(&self, entry: &LogEntry) {
        self.0.lock().unwrap().push(entry.clone());
    }
}

pub struct Recorded {
    pub telemetry: Telemetry,
    pub monitor: Arc<RecordingMonitor>,
    pub log: Arc<RecordingLog>,
}

pub fn recorded() -> Recorded {
    let monitor = Arc::new(RecordingMonitor::default());
    let log = Arc::new(RecordingLog::default());
    let telemetry = Telemetry::new(monitor.clone(), log.clone());
    Recorded { telemetry, monitor, log }
}

pub fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: &'static [u8]) -> Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    Request::from(builder.body(Bytes::from_static(body)).unwrap())
}

pub async fn call(app: &BoxedHandler, req: Request) -> Response {
    app.call(req).await
}

pub fn json_body(res: &Response) -> serde_json::Value {
    serde_json::from_slice(res.body()).expect("response body is JSON")
}

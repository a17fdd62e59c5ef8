//! The external monitoring sink seam.

use std::time::Duration;

use async_trait::async_trait;

use super::event::Event;

/// Where error, warning and performance events go.
///
/// `capture` is called on the request path and must return immediately:
/// queue the event, never wait on the network. `flush` is called once at
/// shutdown.
#[async_trait]
pub trait MonitoringSink: Send + Sync + 'static {
    fn capture(&self, event: Event);

    /// Waits up to `timeout` for queued events to be delivered. Returns
    /// `false` if the deadline passed first.
    async fn flush(&self, timeout: Duration) -> bool;
}

/// Sink used when no DSN is configured. Drops everything.
pub struct NoopMonitor;

#[async_trait]
impl MonitoringSink for NoopMonitor {
    fn capture(&self, _event: Event) {}

    async fn flush(&self, _timeout: Duration) -> bool {
        true
    }
}

//! Sentry-compatible HTTP sink.
//!
//! Events are queued on a bounded channel and posted by one background task,
//! so `capture` never waits on the network. A full queue drops the event
//! with a local warning. Each POST is bounded by [`SEND_TIMEOUT`].

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use url::Url;

use super::event::{Event, Level};
use super::monitor::MonitoringSink;
use crate::config::MonitorConfig;
use crate::error::Error;

const QUEUE_CAPACITY: usize = 1_024;
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const CLIENT_NAME: &str = concat!("echobin/", env!("CARGO_PKG_VERSION"));

// ── DSN ───────────────────────────────────────────────────────────────────────

/// A parsed `scheme://public_key@host[:port][/prefix]/project_id` DSN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dsn {
    public_key: String,
    store_url: String,
}

impl Dsn {
    pub fn public_key(&self) -> &str { &self.public_key }

    /// `scheme://host[:port][/prefix]/api/<project>/store/`
    pub fn store_url(&self) -> &str { &self.store_url }

    fn auth_header(&self) -> String {
        format!(
            "Sentry sentry_version=7, sentry_client={CLIENT_NAME}, sentry_key={}",
            self.public_key
        )
    }
}

impl FromStr for Dsn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| Error::InvalidDsn { dsn: s.to_owned(), reason };

        let url = Url::parse(s).map_err(|_| invalid("not a URL"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.username().is_empty() {
            return Err(invalid("missing public key"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;

        let mut segments: Vec<&str> = url.path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let project = segments.pop().ok_or_else(|| invalid("missing project id"))?;
        let prefix: String = segments.iter().map(|seg| format!("/{seg}")).collect();
        let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();

        Ok(Self {
            public_key: url.username().to_owned(),
            store_url: format!("{}://{host}{port}{prefix}/api/{project}/store/", url.scheme()),
        })
    }
}

// ── Delivery errors ───────────────────────────────────────────────────────────

/// Failure to hand one event to the remote collector. Logged, never surfaced.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector answered {0}")]
    Rejected(reqwest::StatusCode),
}

// ── Sink ──────────────────────────────────────────────────────────────────────

enum Command {
    Deliver(Box<Event>),
    Flush(oneshot::Sender<()>),
}

/// Process-wide fields stamped on every payload.
#[derive(Clone, Serialize)]
struct Stamp {
    platform: &'static str,
    environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    release: Option<String>,
}

#[derive(Serialize)]
struct Payload<'a> {
    #[serde(flatten)]
    event: &'a Event,
    #[serde(flatten)]
    stamp: &'a Stamp,
}

pub struct SentryMonitor {
    tx: mpsc::Sender<Command>,
    sample_rate: f64,
    traces_sample_rate: f64,
    debug: bool,
}

impl SentryMonitor {
    /// Starts the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(dsn: Dsn, config: &MonitorConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        let stamp = Stamp {
            platform: "other",
            environment: config.environment.clone(),
            release: config.release.clone(),
        };

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(deliver_loop(client, dsn, stamp, config.debug, rx));

        Ok(Self {
            tx,
            sample_rate: config.sample_rate,
            traces_sample_rate: config.traces_sample_rate,
            debug: config.debug,
        })
    }

    fn sampled(&self, level: Level) -> bool {
        let rate = match level {
            Level::Info => self.traces_sample_rate,
            Level::Warning | Level::Error => self.sample_rate,
        };
        rate >= 1.0 || fastrand::f64() < rate
    }
}

#[async_trait]
impl MonitoringSink for SentryMonitor {
    fn capture(&self, event: Event) {
        if !self.sampled(event.level) {
            if self.debug {
                debug!(event_id = %event.event_id, "event dropped by sampling");
            }
            return;
        }
        match self.tx.try_send(Command::Deliver(Box::new(event))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => warn!("monitoring queue full, dropping event"),
            Err(mpsc::error::TrySendError::Closed(_)) => warn!("monitoring sink stopped, dropping event"),
        }
    }

    async fn flush(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        let flushed = async {
            self.tx.send(Command::Flush(done_tx)).await.is_ok() && done_rx.await.is_ok()
        };
        tokio::time::timeout(timeout, flushed).await.unwrap_or(false)
    }
}

async fn deliver_loop(
    client: reqwest::Client,
    dsn: Dsn,
    stamp: Stamp,
    debug: bool,
    mut rx: mpsc::Receiver<Command>,
) {
    let auth = dsn.auth_header();
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Deliver(event) => match post(&client, &dsn, &auth, &event, &stamp).await {
                Ok(()) if debug => debug!(event_id = %event.event_id, "event delivered"),
                Ok(()) => {}
                Err(e) => warn!(error = %e, event_id = %event.event_id, "monitoring delivery failed"),
            },
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn post(
    client: &reqwest::Client,
    dsn: &Dsn,
    auth: &str,
    event: &Event,
    stamp: &Stamp,
) -> Result<(), SendError> {
    let res = client
        .post(dsn.store_url())
        .header("X-Sentry-Auth", auth)
        .json(&Payload { event, stamp })
        .send()
        .await?;
    if res.status().is_success() {
        Ok(())
    } else {
        Err(SendError::Rejected(res.status()))
    }
}

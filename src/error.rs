//! Unified error type.

/// Boxed error used for request bodies coming off the wire.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by echobin's fallible setup operations.
///
/// Request-level failures (unreadable or malformed bodies) are expressed as
/// HTTP [`Response`](crate::Response) values, not as `Error`s. This type
/// surfaces infrastructure failures: binding a port, accepting a connection,
/// or building the monitoring client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid monitoring DSN `{dsn}`: {reason}")]
    InvalidDsn { dsn: String, reason: &'static str },

    #[error("monitoring client: {0}")]
    Client(#[from] reqwest::Error),
}

//! # echobin
//!
//! A diagnostic HTTP echo service. Point a webhook or an API client at it
//! and it answers with what it received:
//!
//! ```text
//! $ curl -s 'localhost:8081/x?a=1&a=2&b=3' -d '{"user":"alice"}'
//! {"body":{"user":"alice"},"headers":{...},"queries":{"a":["1","2"],"b":"3"},"params":{}}
//! ```
//!
//! ## Pieces
//!
//! - [`reflect`] — the catch-all handler that mirrors a request as JSON
//! - [`middleware::Observe`] — access log, monitoring events, panic capture
//! - [`telemetry`] — the log sink and the (optional) Sentry-compatible sink
//! - [`Router`] / [`Server`] — hyper on tokio, graceful shutdown
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use echobin::{Router, Server, health, reflect};
//! use echobin::middleware::Observe;
//! use echobin::telemetry::Telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let telemetry = Telemetry::disabled();
//!     let app = Router::new()
//!         .any("/healthz", health::liveness)
//!         .fallback(reflect::echo)
//!         .layer(Observe::new(telemetry.clone()));
//!
//!     Server::bind(([0, 0, 0, 0], 8081).into()).serve(app).await.unwrap();
//!     telemetry.flush(std::time::Duration::from_secs(10)).await;
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod health;
pub mod middleware;
pub mod reflect;
pub mod telemetry;

pub use error::{BoxError, Error};
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use request::Request;
pub use response::{Fault, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;

/// The standard app: `/healthz` plus the catch-all reflector, observed.
pub fn app(telemetry: telemetry::Telemetry) -> Router {
    Router::new()
        .any("/healthz", health::liveness)
        .fallback(reflect::echo)
        .layer(middleware::Observe::new(telemetry))
}

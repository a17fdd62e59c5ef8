//! Middleware layer.
//!
//! A [`Layer`] takes the handler it sits in front of and returns a new one.
//! It runs once, when the router is frozen, not per request. The wrapped
//! handler is where cross-cutting work happens, such as timing and
//! error reporting.
//!
//! Built-in middleware:
//! - [`Observe`] — access log line, monitoring events, panic capture

mod observe;

pub use observe::{Observe, ResponseCapture};

use crate::handler::BoxedHandler;

pub trait Layer: Send + Sync + 'static {
    fn wrap(&self, inner: BoxedHandler) -> BoxedHandler;
}

//! Radix-tree request router.
//!
//! Registered paths answer any method; an optional fallback catches
//! everything else. Middleware registered with [`Router::layer`] wraps the
//! whole table, so it sees every request, including the ones nothing matched.

use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::middleware::Layer;
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Lookup order: registered path, fallback, `404`.
pub struct Router {
    routes: MatchitRouter<BoxedHandler>,
    fallback: Option<BoxedHandler>,
    layers: Vec<Arc<dyn Layer>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: MatchitRouter::new(),
            fallback: None,
            layers: Vec::new(),
        }
    }

    /// Register a handler for `path` that answers every method.
    pub fn any(mut self, path: &str, handler: impl Handler) -> Self {
        self.routes
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Handler for every request no route matched.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(handler.into_boxed_handler());
        self
    }

    /// Wrap the whole router in `layer`. The last layer added is outermost.
    pub fn layer(mut self, layer: impl Layer) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Freezes the routing table into one handler with every layer applied.
    pub fn into_handler(mut self) -> BoxedHandler {
        let layers = std::mem::take(&mut self.layers);
        let table: BoxedHandler = Arc::new(self);
        layers.iter().fold(table, |inner, layer| layer.wrap(inner))
    }

    pub(crate) fn lookup(&self, path: &str) -> Option<BoxedHandler> {
        match self.routes.at(path) {
            Ok(m) => Some(Arc::clone(m.value)),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl ErasedHandler for Router {
    fn call(&self, req: Request) -> BoxFuture {
        match self.lookup(req.path()) {
            Some(handler) => handler.call(req),
            None => Box::pin(async { Response::status(StatusCode::NOT_FOUND) }),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

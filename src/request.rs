//! Incoming HTTP request type.

use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::Body;

use crate::error::BoxError;

type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// An incoming HTTP request.
///
/// The head (method, URI, headers) is parsed up front. The body is left on
/// the wire until a handler asks for it with [`Request::read_body`].
pub struct Request {
    pub(crate) head: http::request::Parts,
    pub(crate) body: RequestBody,
    pub(crate) remote_addr: SocketAddr,
}

impl Request {
    /// Wraps any `http::Request` whose body yields [`Bytes`].
    ///
    /// The server calls this for every hyper request; tests use it to feed
    /// in-memory bodies.
    pub fn from_http<B>(req: http::Request<B>, remote_addr: SocketAddr) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (head, body) = req.into_parts();
        Self {
            head,
            body: body.map_err(Into::into).boxed_unsync(),
            remote_addr,
        }
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn version(&self) -> Version { self.head.version }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// Case-insensitive header lookup. Non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.head.uri.query()
    }

    /// Virtual host: the `Host` header, or the URI authority for HTTP/2.
    pub fn host(&self) -> &str {
        self.header("host")
            .or_else(|| self.head.uri.authority().map(|a| a.as_str()))
            .unwrap_or_default()
    }

    /// Drains the body into one contiguous buffer.
    ///
    /// The body can be read once; later calls yield an empty buffer. A
    /// transport failure (e.g. the client hanging up mid-upload) is returned
    /// as-is.
    pub async fn read_body(&mut self) -> Result<Bytes, BoxError> {
        let body = std::mem::replace(&mut self.body, empty_body());
        Ok(body.collect().await?.to_bytes())
    }
}

impl From<http::Request<Bytes>> for Request {
    /// Builds a request from an in-memory body, attributed to `0.0.0.0:0`.
    fn from(req: http::Request<Bytes>) -> Self {
        let req = req.map(http_body_util::Full::new);
        Self::from_http(req, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
    }
}

fn empty_body() -> RequestBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync()
}

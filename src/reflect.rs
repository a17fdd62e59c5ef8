//! The request reflector: turns any inbound request into its JSON mirror.
//!
//! ```text
//! { "body": <any JSON or {}>, "headers": {..}, "queries": {..}, "params": {} }
//! ```
//!
//! Header and query values follow one rule: a name seen once maps to a bare
//! string, a name seen more than once maps to an array in arrival order.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::{Fault, Response};

/// A header or query value after collapsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Collapsed {
    One(String),
    Many(Vec<String>),
}

/// Exactly one value stays scalar; anything else stays a list, order kept.
pub fn collapse(values: Vec<String>) -> Collapsed {
    match <[String; 1]>::try_from(values) {
        Ok([one]) => Collapsed::One(one),
        Err(values) => Collapsed::Many(values),
    }
}

/// The JSON mirror of one request.
#[derive(Debug, Serialize)]
pub struct ReflectedRequest {
    pub body: Value,
    pub headers: BTreeMap<String, Collapsed>,
    pub queries: BTreeMap<String, Collapsed>,
    /// Always empty; path parameters are not extracted.
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    /// The transport failed while the body was being drained.
    #[error("{0}")]
    BodyRead(#[source] BoxError),

    /// The body arrived intact but is not JSON.
    #[error("{source}")]
    BodyParse { source: serde_json::Error, raw: Bytes },
}

impl ReflectError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BodyRead(_) => "BodyReadError",
            Self::BodyParse { .. } => "BodyParseError",
        }
    }
}

/// Empty body reads as `{}`; anything else must be exactly one JSON value.
pub fn parse_body(raw: Bytes) -> Result<Value, ReflectError> {
    if raw.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(&raw).map_err(|source| ReflectError::BodyParse { source, raw })
}

/// Every header except `Host`, which belongs to the access log's virtual host.
pub fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, Collapsed> {
    headers.keys()
        .filter(|name| **name != http::header::HOST)
        .map(|name| {
            let values = headers.get_all(name).iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (name.as_str().to_owned(), collapse(values))
        })
        .collect()
}

pub fn collect_queries(query: Option<&str>) -> BTreeMap<String, Collapsed> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        grouped.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    grouped.into_iter().map(|(k, v)| (k, collapse(v))).collect()
}

/// Drains the body and mirrors the request.
pub async fn reflect(req: &mut Request) -> Result<ReflectedRequest, ReflectError> {
    let raw = req.read_body().await.map_err(ReflectError::BodyRead)?;
    Ok(ReflectedRequest {
        body: parse_body(raw)?,
        headers: collect_headers(req.headers()),
        queries: collect_queries(req.query()),
        params: BTreeMap::new(),
    })
}

/// Catch-all handler: `200` with the JSON mirror, or `500` with the raw
/// error text when the body cannot be read or parsed.
pub async fn echo(mut req: Request) -> Response {
    let err = match reflect(&mut req).await {
        Ok(mirror) => match serde_json::to_vec(&mirror) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                return Response::json(bytes);
            }
            Err(e) => {
                warn!(error = %e, "failed to encode reflected request");
                return Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .text(e.to_string());
            }
        },
        Err(err) => err,
    };

    let mut fault = Fault::new(err.kind(), err.to_string()).tag("endpoint", "handle_request");
    match &err {
        ReflectError::BodyRead(_) => {
            warn!(error = %err, "failed to read request body");
            fault = fault.extra("url", req.uri().to_string());
        }
        ReflectError::BodyParse { raw, .. } => {
            warn!(error = %err, "failed to parse JSON body");
            fault = fault.extra("body", String::from_utf8_lossy(raw).into_owned());
        }
    }

    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .text(err.to_string())
        .with_fault(fault)
}

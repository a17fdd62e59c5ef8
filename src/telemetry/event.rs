//! Monitoring events.
//!
//! The shape follows the Sentry store API closely enough to be posted as-is
//! once the sink adds its process-wide fields (environment, release).

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Exception {
    pub values: Vec<ExceptionValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExceptionValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: String,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<Exception>,
    pub tags: BTreeMap<String, String>,
    pub contexts: Map<String, Value>,
    pub extra: Map<String, Value>,
}

impl Event {
    fn blank(level: Level) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message: None,
            exception: None,
            tags: BTreeMap::new(),
            contexts: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn message(level: Level, message: impl Into<String>) -> Self {
        Self { message: Some(message.into()), ..Self::blank(level) }
    }

    /// Error-level event carrying one exception.
    pub fn exception(kind: impl Into<String>, value: impl Into<String>) -> Self {
        let exception = Exception {
            values: vec![ExceptionValue { kind: kind.into(), value: value.into() }],
        };
        Self { exception: Some(exception), ..Self::blank(Level::Error) }
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_owned(), value.into());
        self
    }

    pub fn context(mut self, name: &str, value: Value) -> Self {
        self.contexts.insert(name.to_owned(), value);
        self
    }

    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_owned(), value.into());
        self
    }

    /// Text a human would search for: the message, or the exception value.
    pub fn summary(&self) -> &str {
        self.message.as_deref()
            .or_else(|| self.exception.as_ref().and_then(|e| e.values.first()).map(|v| v.value.as_str()))
            .unwrap_or_default()
    }
}

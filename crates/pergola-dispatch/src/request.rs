//! The request handed through the dispatch pipeline.
//!
//! The core treats the request as opaque: it reads named parameters (cache
//! key functions do) and uses its identity for logging. Everything else -
//! headers, sessions, bodies - belongs to the host server.

use std::collections::HashMap;
use std::fmt;

/// An inbound request as seen by the dispatch core.
#[derive(Debug, Clone, Default)]
pub struct Request {
    id: Option<String>,
    params: HashMap<String, String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a debug identity used in log lines.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a named parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets a named parameter on an existing request.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// Reads a named parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "request {}", id),
            None => f.write_str("request"),
        }
    }
}

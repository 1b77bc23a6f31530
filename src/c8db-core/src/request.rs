//! Logical request descriptors
//!
//! A [`Request`] describes one API call independent of which host serves it.
//! Paths are relative to the fabric's API root; the connection prepends the
//! host and root when the request is dispatched.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// Structured value, JSON-encoded on dispatch
    Json(Value),
    /// Opaque payload sent unmodified
    Raw { bytes: Vec<u8>, content_type: String },
}

impl Body {
    pub fn is_binary(&self) -> bool {
        matches!(self, Body::Raw { .. })
    }

    /// Wire bytes and content type, `None` for an empty body
    pub fn encode(&self) -> Result<Option<(Vec<u8>, String)>, serde_json::Error> {
        match self {
            Body::Empty => Ok(None),
            Body::Json(value) => Ok(Some((
                serde_json::to_vec(value)?,
                "application/json".to_string(),
            ))),
            Body::Raw {
                bytes,
                content_type,
            } => Ok(Some((bytes.clone(), content_type.clone()))),
        }
    }
}

/// Request describes a single logical API call
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, Value>,
    pub body: Body,
    pub headers: BTreeMap<String, String>,
    /// HostPool index this request must be sent to; pinned requests never fail over
    pub host: Option<usize>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: Body::Empty,
            headers: BTreeMap::new(),
            host: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::Head, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn query_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Merge every field of an options object into the query
    pub fn query_map(mut self, params: Map<String, Value>) -> Self {
        self.query.extend(params);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn raw(mut self, bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        self.body = Body::Raw {
            bytes,
            content_type: content_type.into(),
        };
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn pinned(mut self, host: usize) -> Self {
        self.host = Some(host);
        self
    }

    /// Serialized query pairs in key order; `null` values are omitted
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .filter_map(|(key, value)| query_value(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

/// Render one query value; arrays are joined with `,`
pub fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

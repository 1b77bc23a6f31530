//! Document and index handle resolution
//!
//! A handle is whatever a caller uses to point at a document: a bare key
//! (`"alice"`), a full id (`"users/alice"`), or a document-shaped object
//! carrying `_key` and/or `_id`. Resolution turns it into the canonical id
//! relative to a collection's id prefix (`"users/"`).

use serde_json::Value;

use crate::error::ArgumentError;
use crate::models::DocumentMeta;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentHandle {
    /// Key or fully qualified id
    Str(String),
    /// Structured reference, e.g. a previously returned document
    Ref {
        key: Option<String>,
        id: Option<String>,
    },
}

impl DocumentHandle {
    /// Resolve to a canonical document id
    ///
    /// Strings containing `/` are returned unchanged; bare keys get the
    /// prefix. For structured references `_id` wins over `_key`.
    pub fn resolve(&self, id_prefix: &str) -> Result<String, ArgumentError> {
        match self {
            DocumentHandle::Str(s) if s.is_empty() => Err(ArgumentError::InvalidHandle(
                "empty document handle".to_string(),
            )),
            DocumentHandle::Str(s) if s.contains('/') => Ok(s.clone()),
            DocumentHandle::Str(s) => Ok(format!("{}{}", id_prefix, s)),
            DocumentHandle::Ref { id: Some(id), .. } if !id.is_empty() => Ok(id.clone()),
            DocumentHandle::Ref { key: Some(key), .. } if !key.is_empty() => {
                Ok(format!("{}{}", id_prefix, key))
            }
            DocumentHandle::Ref { .. } => Err(ArgumentError::InvalidHandle(
                "object has neither _key nor _id".to_string(),
            )),
        }
    }
}

fn str_field(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(Value::as_str).map(str::to_string)
}

impl From<&str> for DocumentHandle {
    fn from(s: &str) -> Self {
        DocumentHandle::Str(s.to_string())
    }
}

impl From<String> for DocumentHandle {
    fn from(s: String) -> Self {
        DocumentHandle::Str(s)
    }
}

impl From<&String> for DocumentHandle {
    fn from(s: &String) -> Self {
        DocumentHandle::Str(s.clone())
    }
}

impl From<&Value> for DocumentHandle {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => DocumentHandle::Str(s.clone()),
            other => DocumentHandle::Ref {
                key: str_field(other, "_key"),
                id: str_field(other, "_id"),
            },
        }
    }
}

impl From<Value> for DocumentHandle {
    fn from(value: Value) -> Self {
        DocumentHandle::from(&value)
    }
}

impl From<&DocumentMeta> for DocumentHandle {
    fn from(meta: &DocumentMeta) -> Self {
        DocumentHandle::Ref {
            key: Some(meta.key.clone()),
            id: Some(meta.id.clone()),
        }
    }
}

/// Reference to an index: a string id or an index description with `id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexHandle {
    Str(String),
    Ref { id: Option<String> },
}

impl IndexHandle {
    pub fn resolve(&self, collection_name: &str) -> Result<String, ArgumentError> {
        let raw = match self {
            IndexHandle::Str(s) => s.as_str(),
            IndexHandle::Ref { id: Some(id) } => id.as_str(),
            IndexHandle::Ref { id: None } => {
                return Err(ArgumentError::InvalidHandle(
                    "index object has no id".to_string(),
                ))
            }
        };
        if raw.is_empty() {
            return Err(ArgumentError::InvalidHandle("empty index handle".to_string()));
        }
        if raw.contains('/') {
            Ok(raw.to_string())
        } else {
            Ok(format!("{}/{}", collection_name, raw))
        }
    }
}

impl From<&str> for IndexHandle {
    fn from(s: &str) -> Self {
        IndexHandle::Str(s.to_string())
    }
}

impl From<String> for IndexHandle {
    fn from(s: String) -> Self {
        IndexHandle::Str(s)
    }
}

impl From<&Value> for IndexHandle {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => IndexHandle::Str(s.clone()),
            other => IndexHandle::Ref {
                id: str_field(other, "id"),
            },
        }
    }
}

impl From<Value> for IndexHandle {
    fn from(value: Value) -> Self {
        IndexHandle::from(&value)
    }
}

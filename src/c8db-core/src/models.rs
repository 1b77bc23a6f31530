use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document metadata returned by write operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMeta {
    // Absent when the write was issued with `silent`
    #[serde(rename = "_key", default)]
    pub key: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_rev", default)]
    pub rev: String,
    #[serde(rename = "_oldRev", default, skip_serializing_if = "Option::is_none")]
    pub old_rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

/// CollectionType as encoded on the wire (2 = document, 3 = edge)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    Document,
    Edge,
}

impl CollectionType {
    pub fn code(self) -> u32 {
        match self {
            CollectionType::Document => 2,
            CollectionType::Edge => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(CollectionType::Document),
            3 => Some(CollectionType::Edge),
            _ => None,
        }
    }
}

/// CollectionInfo as returned by `GET /collection/{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: u32,
    #[serde(rename = "type", default)]
    pub type_code: u32,
    #[serde(rename = "isSystem", default)]
    pub is_system: bool,
}

impl CollectionInfo {
    pub fn kind(&self) -> Option<CollectionType> {
        CollectionType::from_code(self.type_code)
    }
}

/// ServerErrorBody is the error payload the server attaches to failed calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerErrorBody {
    pub error: bool,
    #[serde(rename = "errorNum")]
    pub error_num: i64,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
    #[serde(default)]
    pub code: Option<u16>,
}

impl ServerErrorBody {
    /// Extract the error payload if `body` carries one
    pub fn detect(body: &Value) -> Option<Self> {
        if body.get("error").and_then(Value::as_bool) != Some(true) {
            return None;
        }
        body.get("errorNum")?.as_i64()?;
        serde_json::from_value(body.clone()).ok()
    }
}

/// ImportResult reports the outcome of a bulk import
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportResult {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub empty: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub ignored: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// CursorBatch is one page of a query result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CursorBatch {
    #[serde(default)]
    pub result: Vec<Value>,
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub extra: Option<Value>,
}

/// ListType selects what `list()` returns for each document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListType {
    #[default]
    Id,
    Key,
    Path,
}

impl ListType {
    pub fn as_str(self) -> &'static str {
        match self {
            ListType::Id => "id",
            ListType::Key => "key",
            ListType::Path => "path",
        }
    }
}

/// EdgeDirection filters edges relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Any,
    In,
    Out,
}

impl EdgeDirection {
    /// Query value; `Any` is expressed by omitting the parameter
    pub fn as_query(self) -> Option<&'static str> {
        match self {
            EdgeDirection::Any => None,
            EdgeDirection::In => Some("in"),
            EdgeDirection::Out => Some("out"),
        }
    }
}

/// SimpleQueryOptions are the paging knobs shared by the simple queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleQueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(rename = "batchSize", default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
}

//! Bulk import payloads
//!
//! Row arrays are sent as newline-delimited JSON, one row per line, always
//! terminated by a trailing delimiter, so an empty array is a lone
//! delimiter. Strings and byte buffers are assumed to be pre-formatted and
//! pass through untouched.

use serde_json::{Map, Value};

pub const LINE_DELIMITER: &str = "\r\n";

#[derive(Debug, Clone, PartialEq)]
pub enum ImportPayload {
    Rows(Vec<Value>),
    Text(String),
    Bytes(Vec<u8>),
}

impl ImportPayload {
    pub fn into_bytes(self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            ImportPayload::Rows(rows) => {
                let lines = rows
                    .iter()
                    .map(serde_json::to_string)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut out = lines.join(LINE_DELIMITER);
                out.push_str(LINE_DELIMITER);
                Ok(out.into_bytes())
            }
            ImportPayload::Text(text) => Ok(text.into_bytes()),
            ImportPayload::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<Vec<Value>> for ImportPayload {
    fn from(rows: Vec<Value>) -> Self {
        ImportPayload::Rows(rows)
    }
}

impl From<String> for ImportPayload {
    fn from(text: String) -> Self {
        ImportPayload::Text(text)
    }
}

impl From<&str> for ImportPayload {
    fn from(text: &str) -> Self {
        ImportPayload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for ImportPayload {
    fn from(bytes: Vec<u8>) -> Self {
        ImportPayload::Bytes(bytes)
    }
}

/// How the server interprets each line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportType {
    /// Parameter omitted: first line holds attribute names, the rest are value tuples
    None,
    #[default]
    Auto,
    Documents,
    Array,
}

impl ImportType {
    pub fn as_query(self) -> Option<&'static str> {
        match self {
            ImportType::None => None,
            ImportType::Auto => Some("auto"),
            ImportType::Documents => Some("documents"),
            ImportType::Array => Some("array"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicate {
    Error,
    Update,
    Replace,
    Ignore,
}

impl OnDuplicate {
    pub fn as_str(self) -> &'static str {
        match self {
            OnDuplicate::Error => "error",
            OnDuplicate::Update => "update",
            OnDuplicate::Replace => "replace",
            OnDuplicate::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub import_type: ImportType,
    pub from_prefix: Option<String>,
    pub to_prefix: Option<String>,
    pub overwrite: Option<bool>,
    pub wait_for_sync: Option<bool>,
    pub on_duplicate: Option<OnDuplicate>,
    pub complete: Option<bool>,
    pub details: Option<bool>,
}

impl ImportOptions {
    pub fn to_query(&self, collection: &str) -> Map<String, Value> {
        let mut query = Map::new();
        if let Some(t) = self.import_type.as_query() {
            query.insert("type".to_string(), Value::from(t));
        }
        if let Some(prefix) = &self.from_prefix {
            query.insert("fromPrefix".to_string(), Value::from(prefix.as_str()));
        }
        if let Some(prefix) = &self.to_prefix {
            query.insert("toPrefix".to_string(), Value::from(prefix.as_str()));
        }
        let flags = [
            ("overwrite", self.overwrite),
            ("waitForSync", self.wait_for_sync),
            ("complete", self.complete),
            ("details", self.details),
        ];
        for (name, value) in flags {
            if let Some(v) = value {
                query.insert(name.to_string(), Value::Bool(v));
            }
        }
        if let Some(on_duplicate) = self.on_duplicate {
            query.insert("onDuplicate".to_string(), Value::from(on_duplicate.as_str()));
        }
        query.insert("collection".to_string(), Value::from(collection));
        query
    }
}

//! Options normalization
//!
//! Write operations accept shorthands in place of a full options value: a
//! `bool` means `returnNew`, a string means an expected revision. Every
//! shorthand converts into one canonical [`WriteOptions`] before anything is
//! dispatched, and [`WriteOptions::to_wire`] decides where each field travels
//! for a given dialect.

use serde_json::{json, Map, Value};

use crate::config::Dialect;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub wait_for_sync: Option<bool>,
    pub return_new: Option<bool>,
    pub return_old: Option<bool>,
    pub silent: Option<bool>,
    /// Expected revision of the target document
    pub rev: Option<String>,
    pub overwrite: Option<bool>,
    /// When false, attributes set to null by an update are removed
    pub keep_null: Option<bool>,
    pub merge_objects: Option<bool>,
    pub ignore_revs: Option<bool>,
}

/// Where normalized options travel on the wire
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireOptions {
    pub query: Map<String, Value>,
    pub if_match: Option<String>,
}

impl WriteOptions {
    pub fn wait_for_sync(mut self, value: bool) -> Self {
        self.wait_for_sync = Some(value);
        self
    }

    pub fn return_new(mut self, value: bool) -> Self {
        self.return_new = Some(value);
        self
    }

    pub fn return_old(mut self, value: bool) -> Self {
        self.return_old = Some(value);
        self
    }

    pub fn silent(mut self, value: bool) -> Self {
        self.silent = Some(value);
        self
    }

    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub fn overwrite(mut self, value: bool) -> Self {
        self.overwrite = Some(value);
        self
    }

    pub fn keep_null(mut self, value: bool) -> Self {
        self.keep_null = Some(value);
        self
    }

    pub fn merge_objects(mut self, value: bool) -> Self {
        self.merge_objects = Some(value);
        self
    }

    pub fn ignore_revs(mut self, value: bool) -> Self {
        self.ignore_revs = Some(value);
        self
    }

    /// Split into query parameters and a conditional header
    ///
    /// The current dialect sends the revision as `if-match`; the legacy
    /// dialect keeps it as the `rev` query parameter.
    pub fn to_wire(&self, dialect: Dialect) -> WireOptions {
        let mut query = Map::new();
        let flags = [
            ("waitForSync", self.wait_for_sync),
            ("returnNew", self.return_new),
            ("returnOld", self.return_old),
            ("silent", self.silent),
            ("overwrite", self.overwrite),
            ("keepNull", self.keep_null),
            ("mergeObjects", self.merge_objects),
            ("ignoreRevs", self.ignore_revs),
        ];
        for (name, value) in flags {
            if let Some(v) = value {
                query.insert(name.to_string(), Value::Bool(v));
            }
        }

        let mut if_match = None;
        if let Some(rev) = &self.rev {
            match dialect {
                Dialect::Current => if_match = Some(rev.clone()),
                Dialect::Legacy => {
                    query.insert("rev".to_string(), Value::String(rev.clone()));
                }
            }
        }

        WireOptions { query, if_match }
    }
}

impl From<bool> for WriteOptions {
    fn from(return_new: bool) -> Self {
        WriteOptions::default().return_new(return_new)
    }
}

impl From<&str> for WriteOptions {
    fn from(rev: &str) -> Self {
        WriteOptions::default().rev(rev)
    }
}

impl From<String> for WriteOptions {
    fn from(rev: String) -> Self {
        WriteOptions::default().rev(rev)
    }
}

impl From<Option<WriteOptions>> for WriteOptions {
    fn from(opts: Option<WriteOptions>) -> Self {
        opts.unwrap_or_default()
    }
}

/// One or more attribute paths an index covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFields(pub Vec<String>);

impl IndexFields {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for IndexFields {
    fn from(field: &str) -> Self {
        IndexFields(vec![field.to_string()])
    }
}

impl From<String> for IndexFields {
    fn from(field: String) -> Self {
        IndexFields(vec![field])
    }
}

impl From<Vec<String>> for IndexFields {
    fn from(fields: Vec<String>) -> Self {
        IndexFields(fields)
    }
}

impl From<Vec<&str>> for IndexFields {
    fn from(fields: Vec<&str>) -> Self {
        IndexFields(fields.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for IndexFields {
    fn from(fields: &[&str]) -> Self {
        IndexFields(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for IndexFields {
    fn from(fields: [&str; N]) -> Self {
        IndexFields(fields.iter().map(|f| f.to_string()).collect())
    }
}

/// Options for hash, skiplist and persistent indexes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: Option<bool>,
    pub sparse: Option<bool>,
    pub deduplicate: Option<bool>,
}

impl IndexOptions {
    /// Index creation body: `{unique: false, ...opts, type, fields}`
    pub fn to_body(&self, index_type: &str, fields: IndexFields) -> Value {
        let mut body = json!({ "unique": self.unique.unwrap_or(false) });
        if let Some(sparse) = self.sparse {
            body["sparse"] = Value::Bool(sparse);
        }
        if let Some(deduplicate) = self.deduplicate {
            body["deduplicate"] = Value::Bool(deduplicate);
        }
        body["type"] = Value::String(index_type.to_string());
        body["fields"] = json!(fields.into_vec());
        body
    }
}

impl From<bool> for IndexOptions {
    fn from(unique: bool) -> Self {
        IndexOptions {
            unique: Some(unique),
            ..Default::default()
        }
    }
}

/// Size limits for a cap constraint; a bare number means `size`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapConstraint {
    pub size: Option<u64>,
    pub byte_size: Option<u64>,
}

impl CapConstraint {
    pub fn to_body(&self) -> Value {
        let mut body = json!({ "type": "cap" });
        if let Some(size) = self.size {
            body["size"] = json!(size);
        }
        if let Some(byte_size) = self.byte_size {
            body["byteSize"] = json!(byte_size);
        }
        body
    }
}

impl From<u64> for CapConstraint {
    fn from(size: u64) -> Self {
        CapConstraint {
            size: Some(size),
            byte_size: None,
        }
    }
}

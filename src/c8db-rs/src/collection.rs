use c8db_core::error::codes;
use c8db_core::{
    CapConstraint, CollectionInfo, CollectionType, CursorBatch, Dialect, DocumentHandle,
    DocumentMeta, ImportOptions, ImportPayload, ImportResult, IndexFields, IndexHandle,
    IndexOptions, ListType, Method, Request, SimpleQueryOptions, WriteOptions,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::debug;

use crate::connection::Connection;
use crate::cursor::ArrayCursor;
use crate::stream::{MessageHandler, StreamClient};
use crate::{ClientError, Result};

/// Merge the fields of `extra` (if it is an object) into `body`
pub(crate) fn merge_options(mut body: Map<String, Value>, extra: Value) -> Map<String, Value> {
    if let Value::Object(fields) = extra {
        for (key, value) in fields {
            body.entry(key).or_insert(value);
        }
    }
    body
}

fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ClientError::InvalidArgument(format!(
            "expected an options object, got {}",
            other
        ))),
    }
}

/// Operations shared by document and edge collections
pub struct BaseCollection {
    connection: Arc<Connection>,
    name: String,
    id_prefix: String,
    kind: CollectionType,
    stream: Option<Arc<dyn StreamClient>>,
}

impl BaseCollection {
    pub(crate) fn new(connection: Arc<Connection>, name: String, kind: CollectionType) -> Self {
        let id_prefix = format!("{}/", name);
        Self {
            connection,
            name,
            id_prefix,
            kind,
            stream: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_prefix(&self) -> &str {
        &self.id_prefix
    }

    pub fn kind(&self) -> CollectionType {
        self.kind
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Attach the stream subsystem used by `on_change`
    pub fn set_stream_client(&mut self, client: Arc<dyn StreamClient>) {
        self.stream = Some(client);
    }

    fn dialect(&self) -> Dialect {
        self.connection.dialect()
    }

    pub(crate) fn document_handle(&self, handle: impl Into<DocumentHandle>) -> Result<String> {
        Ok(handle.into().resolve(&self.id_prefix)?)
    }

    fn index_handle(&self, handle: impl Into<IndexHandle>) -> Result<String> {
        Ok(handle.into().resolve(&self.name)?)
    }

    fn document_path(&self, id: &str) -> String {
        match (self.dialect(), self.kind) {
            (Dialect::Legacy, CollectionType::Edge) => format!("/edge/{}", id),
            _ => format!("/document/{}", id),
        }
    }

    fn collection_path(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("/collection/{}", self.name)
        } else {
            format!("/collection/{}/{}", self.name, suffix)
        }
    }

    /// Operations the 3.x dialect removed
    fn require_legacy(&self, operation: &str) -> Result<()> {
        let version = self.connection.server_major_version();
        if version >= 3 {
            return Err(ClientError::Unsupported {
                operation: operation.to_string(),
                server_major_version: version,
            });
        }
        Ok(())
    }

    fn simple(&self, query: &str, mut body: Map<String, Value>) -> Request {
        body.insert("collection".to_string(), Value::String(self.name.clone()));
        Request::put(format!("/simple/{}", query)).json(Value::Object(body))
    }

    async fn cursor(&self, request: Request) -> Result<ArrayCursor> {
        let connection = Arc::clone(&self.connection);
        self.connection
            .request(request, move |res| {
                let host = res.host;
                let batch: CursorBatch = res.json()?;
                Ok(ArrayCursor::new(connection, batch, host))
            })
            .await
    }

    // Collection administration

    pub async fn get(&self) -> Result<CollectionInfo> {
        self.connection
            .request(Request::get(self.collection_path("")), |res| res.json())
            .await
    }

    /// `false` when the server reports the collection as unknown
    pub async fn exists(&self) -> Result<bool> {
        match self.get().await {
            Ok(_) => Ok(true),
            Err(err) if err.error_num() == Some(codes::COLLECTION_NOT_FOUND) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn create(&self, properties: Value) -> Result<Value> {
        let mut body = merge_options(Map::new(), properties);
        body.insert("name".to_string(), Value::String(self.name.clone()));
        body.insert("type".to_string(), json!(self.kind.code()));
        self.connection
            .request(Request::post("/collection").json(Value::Object(body)), |res| {
                Ok(res.body)
            })
            .await
    }

    pub async fn properties(&self) -> Result<Value> {
        self.get_info("properties").await
    }

    pub async fn count(&self) -> Result<u64> {
        self.connection
            .request(Request::get(self.collection_path("count")), |res| {
                res.field("count")
            })
            .await
    }

    pub async fn figures(&self) -> Result<Value> {
        self.get_info("figures").await
    }

    pub async fn revision(&self) -> Result<Value> {
        self.get_info("revision").await
    }

    pub async fn checksum(&self, opts: Value) -> Result<Value> {
        let request = Request::get(self.collection_path("checksum"))
            .query_map(merge_options(Map::new(), opts));
        self.connection.request(request, |res| Ok(res.body)).await
    }

    async fn get_info(&self, what: &str) -> Result<Value> {
        self.connection
            .request(Request::get(self.collection_path(what)), |res| Ok(res.body))
            .await
    }

    pub async fn load(&self, count: Option<bool>) -> Result<Value> {
        let mut request = Request::put(self.collection_path("load"));
        if let Some(count) = count {
            request = request.json(json!({ "count": count }));
        }
        self.connection.request(request, |res| Ok(res.body)).await
    }

    pub async fn unload(&self) -> Result<Value> {
        self.put_action("unload").await
    }

    pub async fn truncate(&self) -> Result<Value> {
        self.put_action("truncate").await
    }

    pub async fn rotate(&self) -> Result<Value> {
        self.put_action("rotate").await
    }

    async fn put_action(&self, action: &str) -> Result<Value> {
        self.connection
            .request(Request::put(self.collection_path(action)), |res| Ok(res.body))
            .await
    }

    pub async fn set_properties(&self, properties: Value) -> Result<Value> {
        let request = Request::put(self.collection_path("properties")).json(properties);
        self.connection.request(request, |res| Ok(res.body)).await
    }

    /// Rename the collection; on success this handle follows the new name
    pub async fn rename(&mut self, new_name: &str) -> Result<Value> {
        let request = Request::put(self.collection_path("rename")).json(json!({ "name": new_name }));
        let body = self.connection.request(request, |res| Ok(res.body)).await?;
        debug!(from = %self.name, to = %new_name, "Collection renamed");
        self.name = new_name.to_string();
        self.id_prefix = format!("{}/", new_name);
        Ok(body)
    }

    pub async fn drop_collection(&self, is_system: bool) -> Result<Value> {
        let mut request = Request::delete(self.collection_path(""));
        if is_system {
            request = request.query("isSystem", true);
        }
        self.connection.request(request, |res| Ok(res.body)).await
    }

    // Documents

    /// Metadata-only check; a 404 (missing document or collection) is `false`
    pub async fn document_exists(&self, handle: impl Into<DocumentHandle>) -> Result<bool> {
        let id = self.document_handle(handle)?;
        let request = Request::head(self.document_path(&id));
        match self.connection.request(request, |_| Ok(true)).await {
            Ok(found) => Ok(found),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn document(&self, handle: impl Into<DocumentHandle>) -> Result<Value> {
        let id = self.document_handle(handle)?;
        self.connection
            .request(Request::get(self.document_path(&id)), |res| Ok(res.body))
            .await
    }

    /// Like [`document`](Self::document), but a missing document is `None`
    pub async fn document_graceful(
        &self,
        handle: impl Into<DocumentHandle>,
    ) -> Result<Option<Value>> {
        match self.document(handle).await {
            Ok(doc) => Ok(Some(doc)),
            Err(err) if err.error_num() == Some(codes::DOCUMENT_NOT_FOUND) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Insert a document; edge payloads must already carry `_from`/`_to`
    pub(crate) async fn insert(&self, data: Value, opts: WriteOptions) -> Result<DocumentMeta> {
        let wire = opts.to_wire(self.dialect());
        let request = match (self.dialect(), self.kind) {
            (Dialect::Current, _) => Request::post(format!("/document/{}", self.name))
                .query_map(wire.query)
                .json(data),
            (Dialect::Legacy, CollectionType::Document) => Request::post("/document")
                .query_map(wire.query)
                .query("collection", self.name.as_str())
                .json(data),
            (Dialect::Legacy, CollectionType::Edge) => {
                let mut data = data;
                let (from, to) = match data.as_object_mut() {
                    Some(fields) => (fields.remove("_from"), fields.remove("_to")),
                    None => (None, None),
                };
                Request::post("/edge")
                    .query_map(wire.query)
                    .query("collection", self.name.as_str())
                    .query_opt("from", from)
                    .query_opt("to", to)
                    .json(data)
            }
        };
        self.connection.request(request, |res| res.json()).await
    }

    pub async fn replace<T: Serialize>(
        &self,
        handle: impl Into<DocumentHandle>,
        new_value: &T,
        opts: impl Into<WriteOptions>,
    ) -> Result<DocumentMeta> {
        let request = self.write_request(Method::Put, handle, opts.into())?;
        let request = request.json(serde_json::to_value(new_value)?);
        self.connection.request(request, |res| res.json()).await
    }

    pub async fn update<T: Serialize>(
        &self,
        handle: impl Into<DocumentHandle>,
        new_value: &T,
        opts: impl Into<WriteOptions>,
    ) -> Result<DocumentMeta> {
        let request = self.write_request(Method::Patch, handle, opts.into())?;
        let request = request.json(serde_json::to_value(new_value)?);
        self.connection.request(request, |res| res.json()).await
    }

    pub async fn remove(
        &self,
        handle: impl Into<DocumentHandle>,
        opts: impl Into<WriteOptions>,
    ) -> Result<DocumentMeta> {
        let request = self.write_request(Method::Delete, handle, opts.into())?;
        self.connection.request(request, |res| res.json()).await
    }

    fn write_request(
        &self,
        method: Method,
        handle: impl Into<DocumentHandle>,
        opts: WriteOptions,
    ) -> Result<Request> {
        let id = self.document_handle(handle)?;
        let wire = opts.to_wire(self.dialect());
        let mut request = Request::new(method, self.document_path(&id)).query_map(wire.query);
        if let Some(rev) = wire.if_match {
            request = request.header("if-match", rev);
        }
        Ok(request)
    }

    /// Patch many documents at once; each value must carry `_key` or `_id`
    pub async fn bulk_update<T: Serialize>(
        &self,
        new_values: &[T],
        opts: impl Into<WriteOptions>,
    ) -> Result<Vec<Value>> {
        let wire = opts.into().to_wire(self.dialect());
        let request = Request::patch(format!("/document/{}", self.name))
            .query_map(wire.query)
            .json(serde_json::to_value(new_values)?);
        self.connection.request(request, |res| res.json()).await
    }

    pub async fn list(&self, list_type: ListType) -> Result<Vec<String>> {
        match self.dialect() {
            Dialect::Current => {
                let request = Request::put("/simple/all-keys").json(json!({
                    "type": list_type.as_str(),
                    "collection": self.name,
                }));
                self.connection.request(request, |res| res.field("result")).await
            }
            Dialect::Legacy => {
                let path = match self.kind {
                    CollectionType::Edge => "/edge",
                    CollectionType::Document => "/document",
                };
                let request = Request::get(path)
                    .query("type", list_type.as_str())
                    .query("collection", self.name.as_str());
                self.connection
                    .request(request, |res| res.field("documents"))
                    .await
            }
        }
    }

    // Simple queries

    pub async fn all(&self, opts: &SimpleQueryOptions) -> Result<ArrayCursor> {
        self.cursor(self.simple("all", to_map(opts)?)).await
    }

    pub async fn any(&self) -> Result<Value> {
        self.connection
            .request(self.simple("any", Map::new()), |res| res.field("document"))
            .await
    }

    pub async fn first(&self, count: Option<u64>) -> Result<Value> {
        self.require_legacy("first")?;
        self.first_or_last("first", count).await
    }

    pub async fn last(&self, count: Option<u64>) -> Result<Value> {
        self.require_legacy("last")?;
        self.first_or_last("last", count).await
    }

    async fn first_or_last(&self, which: &str, count: Option<u64>) -> Result<Value> {
        let mut body = Map::new();
        if let Some(count) = count {
            body.insert("count".to_string(), json!(count));
        }
        self.connection
            .request(self.simple(which, body), |res| res.field("result"))
            .await
    }

    pub async fn by_example(&self, example: Value, opts: &SimpleQueryOptions) -> Result<ArrayCursor> {
        let mut body = to_map(opts)?;
        body.insert("example".to_string(), example);
        self.cursor(self.simple("by-example", body)).await
    }

    pub async fn first_example(&self, example: Value) -> Result<Value> {
        let mut body = Map::new();
        body.insert("example".to_string(), example);
        self.connection
            .request(self.simple("first-example", body), |res| res.field("document"))
            .await
    }

    pub async fn remove_by_example(&self, example: Value, opts: Value) -> Result<Value> {
        let mut body = Map::new();
        body.insert("example".to_string(), example);
        let body = merge_options(body, opts);
        self.connection
            .request(self.simple("remove-by-example", body), |res| Ok(res.body))
            .await
    }

    pub async fn replace_by_example(
        &self,
        example: Value,
        new_value: Value,
        opts: Value,
    ) -> Result<Value> {
        self.modify_by_example("replace-by-example", example, new_value, opts)
            .await
    }

    pub async fn update_by_example(
        &self,
        example: Value,
        new_value: Value,
        opts: Value,
    ) -> Result<Value> {
        self.modify_by_example("update-by-example", example, new_value, opts)
            .await
    }

    async fn modify_by_example(
        &self,
        query: &str,
        example: Value,
        new_value: Value,
        opts: Value,
    ) -> Result<Value> {
        let mut body = Map::new();
        body.insert("example".to_string(), example);
        body.insert("newValue".to_string(), new_value);
        let body = merge_options(body, opts);
        self.connection
            .request(self.simple(query, body), |res| Ok(res.body))
            .await
    }

    pub async fn lookup_by_keys<S: AsRef<str>>(&self, keys: &[S]) -> Result<Vec<Value>> {
        let mut body = Map::new();
        body.insert("keys".to_string(), json!(keys_of(keys)));
        self.connection
            .request(self.simple("lookup-by-keys", body), |res| res.field("documents"))
            .await
    }

    pub async fn remove_by_keys<S: AsRef<str>>(&self, keys: &[S], opts: Value) -> Result<Value> {
        let mut body = Map::new();
        body.insert("keys".to_string(), json!(keys_of(keys)));
        body.insert("options".to_string(), opts);
        self.connection
            .request(self.simple("remove-by-keys", body), |res| Ok(res.body))
            .await
    }

    pub async fn fulltext(
        &self,
        attribute: &str,
        query: &str,
        opts: &SimpleQueryOptions,
    ) -> Result<ArrayCursor> {
        let mut body = to_map(opts)?;
        body.insert("attribute".to_string(), json!(attribute));
        body.insert("query".to_string(), json!(query));
        self.cursor(self.simple("fulltext", body)).await
    }

    pub async fn near(
        &self,
        latitude: f64,
        longitude: f64,
        opts: &SimpleQueryOptions,
    ) -> Result<ArrayCursor> {
        let mut body = to_map(opts)?;
        body.insert("latitude".to_string(), json!(latitude));
        body.insert("longitude".to_string(), json!(longitude));
        self.cursor(self.simple("near", body)).await
    }

    pub async fn within(
        &self,
        latitude: f64,
        longitude: f64,
        radius: f64,
        opts: &SimpleQueryOptions,
    ) -> Result<ArrayCursor> {
        let mut body = to_map(opts)?;
        body.insert("latitude".to_string(), json!(latitude));
        body.insert("longitude".to_string(), json!(longitude));
        body.insert("radius".to_string(), json!(radius));
        self.cursor(self.simple("within", body)).await
    }

    // Bulk import

    pub async fn import(
        &self,
        payload: impl Into<ImportPayload>,
        opts: &ImportOptions,
    ) -> Result<ImportResult> {
        let bytes = payload.into().into_bytes()?;
        let request = Request::post("/import")
            .query_map(opts.to_query(&self.name))
            .raw(bytes, "text/plain");
        self.connection.request(request, |res| res.json()).await
    }

    // Indexes

    pub async fn indexes(&self) -> Result<Vec<Value>> {
        let request = Request::get("/index").query("collection", self.name.as_str());
        self.connection.request(request, |res| res.field("indexes")).await
    }

    pub async fn index(&self, handle: impl Into<IndexHandle>) -> Result<Value> {
        let id = self.index_handle(handle)?;
        self.connection
            .request(Request::get(format!("/index/{}", id)), |res| Ok(res.body))
            .await
    }

    pub async fn create_index(&self, details: Value) -> Result<Value> {
        let request = Request::post("/index")
            .query("collection", self.name.as_str())
            .json(details);
        self.connection.request(request, |res| Ok(res.body)).await
    }

    pub async fn drop_index(&self, handle: impl Into<IndexHandle>) -> Result<Value> {
        let id = self.index_handle(handle)?;
        self.connection
            .request(Request::delete(format!("/index/{}", id)), |res| Ok(res.body))
            .await
    }

    pub async fn create_hash_index(
        &self,
        fields: impl Into<IndexFields>,
        opts: impl Into<IndexOptions>,
    ) -> Result<Value> {
        self.create_index(opts.into().to_body("hash", fields.into()))
            .await
    }

    pub async fn create_skip_list(
        &self,
        fields: impl Into<IndexFields>,
        opts: impl Into<IndexOptions>,
    ) -> Result<Value> {
        self.create_index(opts.into().to_body("skiplist", fields.into()))
            .await
    }

    pub async fn create_persistent_index(
        &self,
        fields: impl Into<IndexFields>,
        opts: impl Into<IndexOptions>,
    ) -> Result<Value> {
        self.create_index(opts.into().to_body("persistent", fields.into()))
            .await
    }

    pub async fn create_geo_index(
        &self,
        fields: impl Into<IndexFields>,
        geo_json: Option<bool>,
    ) -> Result<Value> {
        let mut details = json!({ "type": "geo", "fields": fields.into().into_vec() });
        if let Some(geo_json) = geo_json {
            details["geoJson"] = json!(geo_json);
        }
        self.create_index(details).await
    }

    pub async fn create_fulltext_index(
        &self,
        fields: impl Into<IndexFields>,
        min_length: Option<u32>,
    ) -> Result<Value> {
        let mut details = json!({ "type": "fulltext", "fields": fields.into().into_vec() });
        if let Some(min_length) = min_length {
            details["minLength"] = json!(min_length);
        }
        self.create_index(details).await
    }

    pub async fn create_cap_constraint(&self, opts: impl Into<CapConstraint>) -> Result<Value> {
        self.require_legacy("create_cap_constraint")?;
        self.create_index(opts.into().to_body()).await
    }

    // Change notifications

    /// Subscribe to this collection's change feed in data center `dc_name`
    pub async fn on_change(
        &self,
        dc_name: &str,
        subscription_name: &str,
        handler: MessageHandler,
    ) -> Result<()> {
        let stream = self.stream_client("on_change")?;
        stream
            .consumer(&self.name, subscription_name, dc_name, handler)
            .await
    }

    pub async fn close_on_change_connection(&self) -> Result<()> {
        self.stream_client("close_on_change_connection")?
            .close_ws_connections()
            .await
    }

    fn stream_client(&self, operation: &str) -> Result<&Arc<dyn StreamClient>> {
        self.stream.as_ref().ok_or_else(|| ClientError::Unsupported {
            operation: format!("{} without a stream client", operation),
            server_major_version: self.connection.server_major_version(),
        })
    }
}

fn keys_of<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    keys.iter().map(|k| k.as_ref().to_string()).collect()
}

/// Collection of plain documents
pub struct DocumentCollection {
    base: BaseCollection,
}

impl DocumentCollection {
    pub fn new(connection: Arc<Connection>, name: impl Into<String>) -> Self {
        Self {
            base: BaseCollection::new(connection, name.into(), CollectionType::Document),
        }
    }

    /// Insert a document; `opts` may be `true` as shorthand for `returnNew`
    pub async fn save<T: Serialize>(
        &self,
        data: &T,
        opts: impl Into<WriteOptions>,
    ) -> Result<DocumentMeta> {
        self.base
            .insert(serde_json::to_value(data)?, opts.into())
            .await
    }
}

impl Deref for DocumentCollection {
    type Target = BaseCollection;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for DocumentCollection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

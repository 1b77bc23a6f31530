use c8db_core::{CollectionType, DocumentHandle, DocumentMeta, EdgeDirection, Request, WriteOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::collection::{merge_options, BaseCollection};
use crate::connection::Connection;
use crate::{ClientError, Result};

/// Collection whose documents connect two vertices via `_from` and `_to`
pub struct EdgeCollection {
    base: BaseCollection,
}

impl EdgeCollection {
    pub fn new(connection: Arc<Connection>, name: impl Into<String>) -> Self {
        Self {
            base: BaseCollection::new(connection, name.into(), CollectionType::Edge),
        }
    }

    pub async fn edge(&self, handle: impl Into<DocumentHandle>) -> Result<Value> {
        self.base.document(handle).await
    }

    pub async fn edge_graceful(&self, handle: impl Into<DocumentHandle>) -> Result<Option<Value>> {
        self.base.document_graceful(handle).await
    }

    /// Insert an edge whose payload already names both endpoints
    pub async fn save<T: Serialize>(
        &self,
        data: &T,
        opts: impl Into<WriteOptions>,
    ) -> Result<DocumentMeta> {
        let data = edge_payload(serde_json::to_value(data)?, None, None)?;
        self.base.insert(data, opts.into()).await
    }

    /// Insert an edge between `from` and `to`, overriding any endpoints in `data`
    pub async fn save_edge<T: Serialize>(
        &self,
        data: &T,
        from: impl Into<DocumentHandle>,
        to: impl Into<DocumentHandle>,
        opts: impl Into<WriteOptions>,
    ) -> Result<DocumentMeta> {
        let from = self.base.document_handle(from)?;
        let to = self.base.document_handle(to)?;
        let data = edge_payload(serde_json::to_value(data)?, Some(from), Some(to))?;
        self.base.insert(data, opts.into()).await
    }

    pub async fn edges(&self, vertex: impl Into<DocumentHandle>) -> Result<Vec<Value>> {
        self.edges_in_direction(vertex, EdgeDirection::Any).await
    }

    pub async fn in_edges(&self, vertex: impl Into<DocumentHandle>) -> Result<Vec<Value>> {
        self.edges_in_direction(vertex, EdgeDirection::In).await
    }

    pub async fn out_edges(&self, vertex: impl Into<DocumentHandle>) -> Result<Vec<Value>> {
        self.edges_in_direction(vertex, EdgeDirection::Out).await
    }

    async fn edges_in_direction(
        &self,
        vertex: impl Into<DocumentHandle>,
        direction: EdgeDirection,
    ) -> Result<Vec<Value>> {
        let vertex = self.base.document_handle(vertex)?;
        let request = Request::get(format!("/edges/{}", self.base.name()))
            .query("vertex", vertex)
            .query_opt("direction", direction.as_query());
        self.base
            .connection()
            .request(request, |res| res.field("edges"))
            .await
    }

    /// Run a server-side traversal over this collection from `start_vertex`
    pub async fn traversal(
        &self,
        start_vertex: impl Into<DocumentHandle>,
        opts: Value,
    ) -> Result<Value> {
        let start = self.base.document_handle(start_vertex)?;
        let mut body = Map::new();
        body.insert("startVertex".to_string(), Value::String(start));
        body.insert(
            "edgeCollection".to_string(),
            Value::String(self.base.name().to_string()),
        );
        let body = merge_options(body, opts);
        self.base
            .connection()
            .request(Request::post("/traversal").json(Value::Object(body)), |res| {
                res.field("result")
            })
            .await
    }
}

impl Deref for EdgeCollection {
    type Target = BaseCollection;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl DerefMut for EdgeCollection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

/// Apply explicit endpoints to `data` and check both are present
fn edge_payload(data: Value, from: Option<String>, to: Option<String>) -> Result<Value> {
    let mut fields = match data {
        Value::Object(fields) => fields,
        other => {
            return Err(ClientError::InvalidArgument(format!(
                "edge data must be an object, got {}",
                other
            )))
        }
    };
    if let Some(from) = from {
        fields.insert("_from".to_string(), Value::String(from));
    }
    if let Some(to) = to {
        fields.insert("_to".to_string(), Value::String(to));
    }
    for endpoint in ["_from", "_to"] {
        match fields.get(endpoint) {
            Some(Value::String(s)) if !s.is_empty() => {}
            _ => {
                return Err(ClientError::InvalidArgument(format!(
                    "edge data is missing {}",
                    endpoint
                )))
            }
        }
    }
    Ok(Value::Object(fields))
}

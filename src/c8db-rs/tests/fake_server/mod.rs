//! In-memory stand-in for a c8db server
//!
//! Implements just enough of the document, import and cursor endpoints to
//! drive the client end to end. Hosts can be taken down to exercise failover.

use async_trait::async_trait;
use c8db_rs::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use reqwest::Url;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

const API_ROOT: &str = "/_fabric/_system/_api";

#[derive(Default)]
struct State {
    collections: HashMap<String, (u32, BTreeMap<String, Value>)>,
    cursors: HashMap<String, Vec<Value>>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeServer {
    state: Mutex<State>,
    down: Mutex<HashSet<String>>,
    hits: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn take_down(&self, host: &str) {
        self.down.lock().unwrap().insert(host.to_string());
    }

    pub fn bring_up(&self, host: &str) {
        self.down.lock().unwrap().remove(host);
    }

    /// Hosts that answered, in order
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn open_cursors(&self) -> usize {
        self.state.lock().unwrap().cursors.len()
    }

    fn handle(&self, request: &HttpRequest) -> (u16, Value) {
        let url = Url::parse(&request.url).unwrap();
        let query: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let path = url.path().strip_prefix(API_ROOT).unwrap_or("").to_string();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let if_match = request
            .headers
            .iter()
            .find(|(k, _)| k == "if-match")
            .map(|(_, v)| v.clone());
        let body = request.body.as_deref().unwrap_or_default();

        let mut state = self.state.lock().unwrap();
        match (request.method, segments.as_slice()) {
            (Method::Post, ["collection"]) => {
                let spec: Value = serde_json::from_slice(body).unwrap();
                let name = spec["name"].as_str().unwrap().to_string();
                if state.collections.contains_key(&name) {
                    return error(409, 1207, "duplicate name");
                }
                let kind = spec["type"].as_u64().unwrap_or(2) as u32;
                state.collections.insert(name.clone(), (kind, BTreeMap::new()));
                (200, json!({"name": name, "type": kind, "isSystem": false, "status": 3}))
            }
            (Method::Get, ["collection", name]) => match state.collections.get(*name) {
                Some((kind, _)) => (200, json!({"id": "1", "name": name, "type": kind, "status": 3})),
                None => error(404, 1203, "collection not found"),
            },
            (Method::Get, ["collection", name, "count"]) => match state.collections.get(*name) {
                Some((_, docs)) => (200, json!({"name": name, "count": docs.len()})),
                None => error(404, 1203, "collection not found"),
            },
            (Method::Delete, ["collection", name]) => match state.collections.remove(*name) {
                Some(_) => (200, json!({"id": "1"})),
                None => error(404, 1203, "collection not found"),
            },
            (Method::Post, ["document", name]) => {
                let doc: Value = serde_json::from_slice(body).unwrap();
                let return_new = query.get("returnNew").map(String::as_str) == Some("true");
                state.insert(name, doc, return_new)
            }
            (method, ["document", name, key]) => {
                let rev = state.bump();
                let Some((_, docs)) = state.collections.get_mut(*name) else {
                    return error(404, 1203, "collection not found");
                };
                let Some(current) = docs.get(*key).cloned() else {
                    return error(404, 1202, "document not found");
                };
                if let Some(expected) = if_match {
                    if current["_rev"].as_str() != Some(expected.as_str()) {
                        return error(412, 1200, "conflict");
                    }
                }
                let id = format!("{}/{}", name, key);
                match method {
                    Method::Get | Method::Head => (200, current),
                    Method::Delete => {
                        docs.remove(*key);
                        (200, json!({"_key": key, "_id": id, "_rev": current["_rev"]}))
                    }
                    Method::Put | Method::Patch => {
                        let patch: Value = serde_json::from_slice(body).unwrap();
                        let mut fields = if method == Method::Patch {
                            current.as_object().cloned().unwrap_or_default()
                        } else {
                            Map::new()
                        };
                        let keep_null = query.get("keepNull").map(String::as_str) != Some("false");
                        for (k, v) in patch.as_object().cloned().unwrap_or_default() {
                            if v.is_null() && !keep_null {
                                fields.remove(&k);
                            } else {
                                fields.insert(k, v);
                            }
                        }
                        fields.insert("_key".into(), json!(key));
                        fields.insert("_id".into(), json!(id));
                        fields.insert("_rev".into(), json!(rev));
                        let stored = Value::Object(fields);
                        docs.insert(key.to_string(), stored.clone());
                        (
                            202,
                            json!({"_key": key, "_id": id, "_rev": rev, "_oldRev": current["_rev"], "new": stored}),
                        )
                    }
                    _ => error(405, 0, "method not allowed"),
                }
            }
            (Method::Post, ["import"]) => {
                let name = query.get("collection").cloned().unwrap_or_default();
                if !state.collections.contains_key(&name) {
                    return error(404, 1203, "collection not found");
                }
                let text = String::from_utf8_lossy(body).to_string();
                let text = text.strip_suffix("\r\n").unwrap_or(&text);
                let (mut created, mut errors, mut empty) = (0, 0, 0);
                for line in text.split("\r\n") {
                    if line.trim().is_empty() {
                        empty += 1;
                        continue;
                    }
                    let status = match serde_json::from_str::<Value>(line) {
                        Ok(doc) => state.insert(&name, doc, false).0,
                        Err(_) => 400,
                    };
                    if status < 400 {
                        created += 1;
                    } else {
                        errors += 1;
                    }
                }
                (
                    201,
                    json!({"error": false, "created": created, "errors": errors, "empty": empty, "updated": 0, "ignored": 0}),
                )
            }
            (Method::Put, ["simple", "all"]) => {
                let spec: Value = serde_json::from_slice(body).unwrap();
                let name = spec["collection"].as_str().unwrap_or_default();
                let batch_size = spec["batchSize"].as_u64().unwrap_or(1000) as usize;
                let Some((_, docs)) = state.collections.get(name) else {
                    return error(404, 1203, "collection not found");
                };
                let mut rest: Vec<Value> = docs.values().cloned().collect();
                let count = rest.len();
                let first: Vec<Value> = rest.drain(..batch_size.min(count)).collect();
                let has_more = !rest.is_empty();
                let id = state.bump();
                if has_more {
                    state.cursors.insert(id.clone(), rest);
                }
                (201, json!({"result": first, "hasMore": has_more, "id": id, "count": count}))
            }
            (Method::Put, ["cursor", id]) => match state.cursors.remove(*id) {
                Some(mut rest) => {
                    let take = rest.len().min(2);
                    let batch: Vec<Value> = rest.drain(..take).collect();
                    let has_more = !rest.is_empty();
                    if has_more {
                        state.cursors.insert(id.to_string(), rest);
                    }
                    (200, json!({"result": batch, "hasMore": has_more, "id": id}))
                }
                None => error(404, 1600, "cursor not found"),
            },
            (Method::Delete, ["cursor", id]) => match state.cursors.remove(*id) {
                Some(_) => (202, json!({"id": id})),
                None => error(404, 1600, "cursor not found"),
            },
            _ => error(404, 404, "unknown path"),
        }
    }
}

impl State {
    fn bump(&mut self) -> String {
        self.next_id += 1;
        format!("_{}", self.next_id)
    }

    fn insert(&mut self, name: &str, doc: Value, return_new: bool) -> (u16, Value) {
        let rev = self.bump();
        let generated = self.next_id.to_string();
        let Some((_, docs)) = self.collections.get_mut(name) else {
            return error(404, 1203, "collection not found");
        };
        let mut fields = doc.as_object().cloned().unwrap_or_default();
        let key = fields
            .get("_key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(generated);
        if docs.contains_key(&key) {
            return error(409, 1210, "unique constraint violated");
        }
        let id = format!("{}/{}", name, key);
        fields.insert("_key".into(), json!(key));
        fields.insert("_id".into(), json!(id));
        fields.insert("_rev".into(), json!(rev));
        let stored = Value::Object(fields);
        docs.insert(key.clone(), stored.clone());

        let mut meta = json!({"_key": key, "_id": id, "_rev": rev});
        if return_new {
            meta["new"] = stored;
        }
        (202, meta)
    }
}

fn error(code: u16, error_num: i64, message: &str) -> (u16, Value) {
    (
        code,
        json!({"error": true, "errorNum": error_num, "errorMessage": message, "code": code}),
    )
}

fn host_of(url: &str) -> String {
    let url = Url::parse(url).unwrap();
    format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default())
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let host = host_of(&request.url);
        if self.down.lock().unwrap().contains(&host) {
            return Err(TransportError::new(format!("connection refused by {}", host)));
        }
        self.hits.lock().unwrap().push(host);

        let (status, body) = self.handle(&request);
        let body = if request.method == Method::Head {
            Vec::new()
        } else {
            serde_json::to_vec(&body).unwrap()
        };
        Ok(HttpResponse {
            status,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body,
        })
    }
}

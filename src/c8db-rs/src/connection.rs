use base64::Engine;
use c8db_core::{Config, Dialect, Request, ServerErrorBody};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::collection::DocumentCollection;
use crate::edge::EdgeCollection;
use crate::host_pool::HostPool;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
use crate::{ClientError, Result};

/// Response is one completed HTTP exchange that the server did not reject
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, `Null` when empty or not JSON
    pub body: Value,
    pub raw: Vec<u8>,
    /// HostPool index of the host that answered
    pub host: usize,
}

impl Response {
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.body)?)
    }

    /// Deserialize one top-level field of the body
    pub fn field<T: DeserializeOwned>(mut self, name: &str) -> Result<T> {
        let value = self
            .body
            .get_mut(name)
            .map(Value::take)
            .ok_or_else(|| ClientError::InvalidResponse(format!("missing `{}` in response", name)))?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Connection dispatches requests to the configured hosts
///
/// Network failures rotate to the next host and retry, at most once per
/// configured host. Server-reported errors are returned as
/// [`ClientError::Server`] and never retried.
pub struct Connection {
    api_root: String,
    hosts: HostPool,
    transport: Arc<dyn Transport>,
    server_major_version: u32,
    headers: RwLock<BTreeMap<String, String>>,
    closed: AtomicBool,
}

impl Connection {
    /// Create a connection using the `reqwest` transport
    pub fn new(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config).map_err(|e| {
            ClientError::InvalidArgument(format!("failed to build HTTP client: {}", e))
        })?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let hosts = HostPool::new(config.urls.clone())?;
        let headers = config
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        Ok(Self {
            api_root: config.api_root(),
            hosts,
            transport,
            server_major_version: config.server_major_version,
            headers: RwLock::new(headers),
            closed: AtomicBool::new(false),
        })
    }

    pub fn server_major_version(&self) -> u32 {
        self.server_major_version
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::for_major(self.server_major_version)
    }

    pub fn hosts(&self) -> &HostPool {
        &self.hosts
    }

    /// Attach a header to every subsequent request
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut headers = self.headers.write().unwrap_or_else(PoisonError::into_inner);
        headers.insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn use_bearer_auth(&self, token: &str) {
        self.set_header("authorization", format!("Bearer {}", token));
    }

    pub fn use_basic_auth(&self, username: &str, password: &str) {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        self.set_header("authorization", format!("Basic {}", credentials));
    }

    /// Terminal: every later request fails with `ConnectionClosed`
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn collection(self: &Arc<Self>, name: impl Into<String>) -> DocumentCollection {
        DocumentCollection::new(Arc::clone(self), name)
    }

    pub fn edge_collection(self: &Arc<Self>, name: impl Into<String>) -> EdgeCollection {
        EdgeCollection::new(Arc::clone(self), name)
    }

    /// Dispatch `request` and project the response into the caller's shape
    pub async fn request<T, F>(&self, request: Request, project: F) -> Result<T>
    where
        F: FnOnce(Response) -> Result<T>,
    {
        let response = self.dispatch(&request).await?;
        project(response)
    }

    async fn dispatch(&self, request: &Request) -> Result<Response> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }
        let body = request.body.encode()?;

        if let Some(host) = request.host {
            if host >= self.hosts.len() {
                return Err(ClientError::InvalidArgument(format!(
                    "request pinned to unknown host {}",
                    host
                )));
            }
            return match self.send_to(host, request, &body, 1).await {
                Ok(raw) => {
                    self.hosts.mark_alive(host);
                    self.classify(host, raw)
                }
                Err(err) => {
                    self.hosts.mark_failed(host);
                    Err(self.transport_error(host, err))
                }
            };
        }

        let attempts = self.hosts.len();
        let mut host = self.hosts.active_index();
        let mut attempt = 1;
        loop {
            match self.send_to(host, request, &body, attempt).await {
                Ok(raw) => {
                    self.hosts.mark_alive(host);
                    return self.classify(host, raw);
                }
                Err(err) => {
                    self.hosts.mark_failed(host);
                    if attempt >= attempts {
                        return Err(self.transport_error(host, err));
                    }
                    let next = self.hosts.rotate_from(host);
                    warn!(
                        host = self.hosts.url(host).unwrap_or_default(),
                        next = self.hosts.url(next).unwrap_or_default(),
                        attempt,
                        error = %err,
                        "Request failed, failing over"
                    );
                    host = next;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_to(
        &self,
        host: usize,
        request: &Request,
        body: &Option<(Vec<u8>, String)>,
        attempt: usize,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let http = self.build_http_request(host, request, body)?;
        debug!(method = %http.method, url = %http.url, attempt, "Dispatching request");
        self.transport.send(http).await
    }

    fn build_http_request(
        &self,
        host: usize,
        request: &Request,
        body: &Option<(Vec<u8>, String)>,
    ) -> std::result::Result<HttpRequest, TransportError> {
        let base = self.hosts.url(host).unwrap_or_default();
        let mut url = Url::parse(&format!("{}{}{}", base, self.api_root, request.path))
            .map_err(|e| TransportError::new(format!("invalid url for {}: {}", base, e)))?;
        let pairs = request.query_pairs();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
        }

        let mut headers: BTreeMap<String, String> = self
            .headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some((_, content_type)) = body {
            headers.insert("content-type".to_string(), content_type.clone());
        }
        headers.extend(request.headers.clone());

        Ok(HttpRequest {
            method: request.method,
            url: url.to_string(),
            headers: headers.into_iter().collect(),
            body: body.as_ref().map(|(bytes, _)| bytes.clone()),
        })
    }

    fn classify(&self, host: usize, raw: HttpResponse) -> Result<Response> {
        let body = if raw.body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw.body).unwrap_or(Value::Null)
        };

        if let Some(err) = ServerErrorBody::detect(&body) {
            return Err(ClientError::Server {
                code: err.code.unwrap_or(raw.status),
                error_num: err.error_num,
                message: err.error_message,
            });
        }
        if raw.status >= 400 {
            let text = String::from_utf8_lossy(&raw.body).trim().to_string();
            let message = if text.is_empty() {
                reason_phrase(raw.status)
            } else {
                text
            };
            return Err(ClientError::Server {
                code: raw.status,
                error_num: 0,
                message,
            });
        }

        Ok(Response {
            status: raw.status,
            headers: raw.headers,
            body,
            raw: raw.body,
            host,
        })
    }

    fn transport_error(&self, host: usize, err: TransportError) -> ClientError {
        ClientError::Transport {
            host: self.hosts.url(host).unwrap_or_default().to_string(),
            message: err.message,
        }
    }
}

/// Canonical reason phrase for `status`, `HTTP {status}` when it has none
fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connection, query_of, path_of, ScriptedTransport};
    use c8db_core::error::codes;
    use serde_json::json;

    #[tokio::test]
    async fn test_request_builds_url_headers_and_body() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({"_key": "a"}));
        let conn = connection(&["http://db1:8529/"], 3, &transport);
        conn.set_header("X-Tenant-Token", "t0k");

        let req = Request::post("/document/users")
            .query("returnNew", true)
            .query("rev", Value::Null)
            .json(json!({"name": "alice"}));
        let body: Value = conn.request(req, |res| res.json()).await.unwrap();
        assert_eq!(body["_key"], "a");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].url,
            "http://db1:8529/_fabric/_system/_api/document/users?returnNew=true"
        );
        let headers: HashMap<_, _> = sent[0].headers.iter().cloned().collect();
        assert_eq!(headers.get("x-tenant-token").map(String::as_str), Some("t0k"));
        assert_eq!(
            headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(sent[0].body.as_deref(), Some(br#"{"name":"alice"}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_server_error_payload_is_typed() {
        let transport = ScriptedTransport::new();
        transport.respond(
            404,
            json!({"error": true, "errorNum": 1202, "errorMessage": "document not found", "code": 404}),
        );
        let conn = connection(&["http://db1"], 3, &transport);

        let err = conn
            .request(Request::get("/document/users/x"), |res| Ok(res.body))
            .await
            .unwrap_err();
        assert_eq!(err.error_num(), Some(codes::DOCUMENT_NOT_FOUND));
        assert_eq!(err.status_code(), Some(404));
        // Server errors are not retried
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_without_payload() {
        let transport = ScriptedTransport::new();
        transport.respond_empty(404);
        let conn = connection(&["http://db1"], 3, &transport);

        let err = conn
            .request(Request::head("/document/users/x"), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.error_num(), Some(0));
        assert!(matches!(err, ClientError::Server { ref message, .. } if message == "Not Found"));
    }

    #[test]
    fn test_reason_phrase_fallback() {
        assert_eq!(reason_phrase(503), "Service Unavailable");
        assert_eq!(reason_phrase(599), "HTTP 599");
    }

    #[tokio::test]
    async fn test_failover_to_second_host() {
        let transport = ScriptedTransport::new();
        transport.fail("connection refused");
        transport.respond(200, json!({"ok": true}));
        let conn = connection(&["http://db1", "http://db2"], 3, &transport);

        let body: Value = conn
            .request(Request::get("/version"), |res| Ok(res.body))
            .await
            .unwrap();
        assert_eq!(body["ok"], true);

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].url.starts_with("http://db1/"));
        assert!(sent[1].url.starts_with("http://db2/"));
        assert_eq!(conn.hosts().active_index(), 1);
        assert!(!conn.hosts().all()[0].alive);
    }

    #[tokio::test]
    async fn test_two_hosts_both_down() {
        let transport = ScriptedTransport::new();
        transport.fail("refused");
        transport.fail("refused");
        let conn = connection(&["http://db1", "http://db2"], 3, &transport);

        let err = conn
            .request(Request::get("/version"), |res| Ok(res.body))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { ref host, .. } if host == "http://db2"));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_single_host_fails_after_one_attempt() {
        let transport = ScriptedTransport::new();
        transport.fail("timed out");
        transport.respond(200, json!({}));
        let conn = connection(&["http://db1"], 3, &transport);

        let err = conn
            .request(Request::get("/version"), |res| Ok(res.body))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_pinned_request_does_not_fail_over() {
        let transport = ScriptedTransport::new();
        transport.fail("reset");
        let conn = connection(&["http://db1", "http://db2"], 3, &transport);

        let err = conn
            .request(Request::put("/cursor/42").pinned(1), |res| Ok(res.body))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { ref host, .. } if host == "http://db2"));
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.starts_with("http://db2/"));
        // Pinned failures leave the active host alone
        assert_eq!(conn.hosts().active_index(), 0);
    }

    #[tokio::test]
    async fn test_closed_connection_fails_fast() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({}));
        let conn = connection(&["http://db1"], 3, &transport);
        conn.close();
        conn.close();

        let err = conn
            .request(Request::get("/version"), |res| Ok(res.body))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_descriptor_headers_override_connection_headers() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({}));
        let conn = connection(&["http://db1"], 3, &transport);
        conn.use_bearer_auth("abc");

        conn.request(
            Request::get("/x").header("Authorization", "Bearer override"),
            |_| Ok(()),
        )
        .await
        .unwrap();
        let headers: HashMap<_, _> = transport.sent()[0].headers.iter().cloned().collect();
        assert_eq!(
            headers.get("authorization").map(String::as_str),
            Some("Bearer override")
        );
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({}));
        let conn = connection(&["http://db1"], 3, &transport);
        conn.use_basic_auth("root", "secret");

        conn.request(Request::get("/x"), |_| Ok(())).await.unwrap();
        let headers: HashMap<_, _> = transport.sent()[0].headers.iter().cloned().collect();
        assert_eq!(
            headers.get("authorization").map(String::as_str),
            Some("Basic cm9vdDpzZWNyZXQ=")
        );
    }

    #[tokio::test]
    async fn test_query_values_are_encoded() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({}));
        let conn = connection(&["http://db1"], 3, &transport);

        conn.request(
            Request::get("/edges/knows").query("vertex", "people/a b"),
            |_| Ok(()),
        )
        .await
        .unwrap();
        let sent = transport.sent();
        assert_eq!(path_of(&sent[0]), "/_fabric/_system/_api/edges/knows");
        assert_eq!(query_of(&sent[0]).get("vertex").map(String::as_str), Some("people/a b"));
    }

    #[test]
    fn test_empty_url_list_rejected() {
        let config = Config {
            urls: vec![],
            ..Config::default()
        };
        let transport = ScriptedTransport::new();
        let result = Connection::with_transport(config, transport);
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[test]
    fn test_response_field_projection() {
        let response = Response {
            status: 200,
            headers: HashMap::new(),
            body: json!({"count": 7}),
            raw: vec![],
            host: 0,
        };
        let count: u64 = response.clone().field("count").unwrap();
        assert_eq!(count, 7);
        assert!(matches!(
            response.field::<u64>("missing"),
            Err(ClientError::InvalidResponse(_))
        ));
    }
}

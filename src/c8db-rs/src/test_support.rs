//! Scripted transport for unit tests
//!
//! Responses and failures are replayed in the order they were queued, and
//! every outgoing request is recorded for assertions.

use async_trait::async_trait;
use c8db_core::Config;
use reqwest::Url;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::connection::Connection;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

enum Scripted {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, status: u16, body: Value) {
        self.push(Scripted::Respond(HttpResponse {
            status,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: serde_json::to_vec(&body).unwrap(),
        }));
    }

    pub(crate) fn respond_empty(&self, status: u16) {
        self.push(Scripted::Respond(HttpResponse {
            status,
            headers: HashMap::new(),
            body: vec![],
        }));
    }

    pub(crate) fn fail(&self, message: &str) {
        self.push(Scripted::Fail(message.to_string()));
    }

    pub(crate) fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> HttpRequest {
        self.sent().pop().expect("no request was sent")
    }

    fn push(&self, item: Scripted) {
        self.script.lock().unwrap().push_back(item);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(TransportError::new(message)),
            None => Err(TransportError::new("no scripted response left")),
        }
    }
}

pub(crate) fn connection(
    urls: &[&str],
    server_major_version: u32,
    transport: &Arc<ScriptedTransport>,
) -> Arc<Connection> {
    let config = Config {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        server_major_version,
        ..Config::default()
    };
    Arc::new(Connection::with_transport(config, transport.clone()).unwrap())
}

pub(crate) fn path_of(request: &HttpRequest) -> String {
    Url::parse(&request.url).unwrap().path().to_string()
}

pub(crate) fn query_of(request: &HttpRequest) -> HashMap<String, String> {
    Url::parse(&request.url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub(crate) fn header_of(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

pub(crate) fn body_of(request: &HttpRequest) -> Value {
    request
        .body
        .as_ref()
        .map(|b| serde_json::from_slice(b).unwrap())
        .unwrap_or(Value::Null)
}

//! c8db Client Library
//!
//! HTTP client for the c8db document/graph REST API, with multi-host
//! failover, version-aware request shaping and lazy query cursors.

mod collection;
mod connection;
mod cursor;
mod edge;
mod host_pool;
mod stream;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use c8db_core::error::codes;
pub use c8db_core::*;
pub use collection::{BaseCollection, DocumentCollection};
pub use connection::{Connection, Response};
pub use cursor::ArrayCursor;
pub use edge::EdgeCollection;
pub use host_pool::{Endpoint, HostPool};
pub use stream::{MessageHandler, StreamClient};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("All hosts failed, last tried {host}: {message}")]
    Transport { host: String, message: String },

    #[error("Server error: {code} ({error_num}) - {message}")]
    Server {
        code: u16,
        error_num: i64,
        message: String,
    },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cursor is exhausted")]
    ExhaustedCursor,

    #[error("{operation} is not supported by server version {server_major_version}")]
    Unsupported {
        operation: String,
        server_major_version: u32,
    },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Server error number, if this is a server error
    pub fn error_num(&self) -> Option<i64> {
        match self {
            ClientError::Server { error_num, .. } => Some(*error_num),
            _ => None,
        }
    }

    /// HTTP status reported with a server error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl From<ArgumentError> for ClientError {
    fn from(err: ArgumentError) -> Self {
        match err {
            ArgumentError::InvalidHandle(msg) => ClientError::InvalidHandle(msg),
            ArgumentError::InvalidArgument(msg) => ClientError::InvalidArgument(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

//! c8db Core Library
//!
//! This crate provides the I/O-free building blocks of the c8db client:
//! - Connection configuration and API dialect selection
//! - Request descriptors and query serialization
//! - Document and index handle resolution
//! - Write/import options normalization
//! - Wire models for server responses

pub mod config;
pub mod error;
pub mod handle;
pub mod import;
pub mod models;
pub mod options;
pub mod request;

// Re-export commonly used types
pub use config::{Config, Dialect};
pub use error::ArgumentError;
pub use handle::{DocumentHandle, IndexHandle};
pub use import::{ImportOptions, ImportPayload, ImportType, OnDuplicate};
pub use models::*;
pub use options::{CapConstraint, IndexFields, IndexOptions, WireOptions, WriteOptions};
pub use request::{Body, Method, Request};

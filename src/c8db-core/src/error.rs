/// Local validation failures, raised before any request is built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("Document handle is not valid: {0}")]
    InvalidHandle(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Server error numbers the client reacts to
pub mod codes {
    pub const DOCUMENT_NOT_FOUND: i64 = 1202;
    pub const COLLECTION_NOT_FOUND: i64 = 1203;
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("WAL error: {0}")]
    Wal(String),

    #[error("Syntax error at offset {offset}: {message}")]
    SyntaxError { offset: usize, message: String },

    #[error("Type mismatch on '{field}': {message}")]
    TypeMismatch { field: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
}

impl DbError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::SyntaxError { offset, message: message.into() }
    }

    pub(crate) fn invalid_cursor(message: impl Into<String>) -> Self {
        Self::InvalidCursor(message.into())
    }

    /// True for errors that only concern one candidate entity during a scan.
    #[must_use]
    pub const fn is_per_entity(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}

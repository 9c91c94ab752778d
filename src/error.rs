//! Error types for leaseq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A precondition on a caller-supplied item was violated (missing id,
    /// missing heartbeat, id already assigned). Raised before any store
    /// call and never retried.
    #[error("invalid item: {0}")]
    InvalidItem(&'static str),

    /// `retrieve` found no eligible item. `peek`/`poll` express the same
    /// situation as `Ok(None)`.
    #[error("no eligible item")]
    ItemNotFound,

    /// The operation is not supported by this engine.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("config error: {0}")]
    Config(String),

    /// A stored status value that does not parse back into [`crate::model::Status`].
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// Store-level failure (connectivity, authorization, serialization).
    /// Propagated unmodified; the engine performs no retry.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

/// Failures from the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {limit} allowed")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("storage write rejected: {0}")]
    Rejected(String),

    #[error("storage read failed: {0}")]
    ReadFailed(String),

    #[error("malformed value under key '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures decoding a cross-context message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message has neither 'action' nor 'type'")]
    Untagged,

    #[error("unknown message kind: {0}")]
    Unknown(String),

    #[error("invalid message payload: {0}")]
    Payload(#[from] serde_json::Error),
}

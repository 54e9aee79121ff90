use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerfsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("hash mismatch: expected {expected}, actual {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PeerfsError {
    /// True for failures of the byte store.
    pub fn is_io(&self) -> bool {
        matches!(self, PeerfsError::Io(_))
    }

    /// True for failures of the metadata store.
    pub fn is_store(&self) -> bool {
        matches!(self, PeerfsError::Store(_))
    }

    /// True when the caller sent something malformed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PeerfsError::InvalidRequest(_) | PeerfsError::InvalidHash(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PeerfsError>;

/// Errors surfaced by the client SDK.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// The lock is currently leased to the named owner.
    #[error("lock '{key}' is held by '{owner}'")]
    LockNotClaimed { key: String, owner: String },

    #[error("invalid token value: {0}")]
    InvalidToken(#[from] tonic::metadata::errors::InvalidMetadataValue),

    #[error("malformed response: missing {0}")]
    MissingField(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

use blockme_sqlx::StoreError;

/// Failures talking to the chain node.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_status() || e.is_body() {
            ChainError::Protocol(e.to_string())
        } else {
            ChainError::Connectivity(e.to_string())
        }
    }
}

/// A raw block that can't be turned into domain records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Missing field `{0}`")]
    MissingField(&'static str),
    #[error("Field `{field}` is not a 0x-prefixed hex quantity: {value:?}")]
    InvalidHex { field: &'static str, value: String },
    #[error("Field `{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Field `{field}` is {found}, expected {expected}")]
    Mismatch {
        field: &'static str,
        expected: String,
        found: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(String),
}

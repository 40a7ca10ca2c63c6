use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transaction error: {0}")]
    Transaction(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("permission denied")]
    Permission,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage io error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid identifier token")]
    Codec,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

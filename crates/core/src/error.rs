use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf extraction error: {0}")]
    Extraction(String),

    #[error("upload root {root} is not usable: {reason}")]
    Placement { root: String, reason: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("summarizer failed: {0}")]
    Summarizer(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record store lock poisoned: {0}")]
    Poisoned(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Search has no input errors: an empty query or an empty corpus is an
/// empty result, not a failure.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("record store read failed: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

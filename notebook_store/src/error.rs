use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Notebook not found")]
    NotebookNotFound,
    #[error("{0}")]
    PageNotFound(String),
    #[error("{0}")]
    InvalidUpload(String),
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

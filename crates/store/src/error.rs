use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

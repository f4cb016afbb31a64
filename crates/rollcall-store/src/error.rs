use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("embedding must have {expected} dimensions, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("vector store unreachable: {0}")]
    Connection(String),
    #[error("vector store request failed: {0}")]
    Backend(String),
}

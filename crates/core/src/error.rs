use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to convert report to JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;

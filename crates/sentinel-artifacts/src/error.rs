//! Error taxonomy for the artifacts sink (C11).

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ArtifactsError>;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactsError {
    #[error("failed to create artifacts directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

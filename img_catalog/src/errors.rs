use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to load manifest {}: {reason}", .path.display())]
    ManifestLoad { path: PathBuf, reason: String },

    #[error("Failed to write manifest {}: {reason}", .path.display())]
    ManifestWrite { path: PathBuf, reason: String },

    #[error("Failed to open image {}: {reason}", .path.display())]
    ImageOpen { path: PathBuf, reason: String },

    #[error("Failed to create {}: {reason}", .path.display())]
    DestinationCreate { path: PathBuf, reason: String },

    #[error("Unsupported target format: {0}")]
    UnsupportedTarget(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("A batch is already running")]
    BatchInProgress,

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

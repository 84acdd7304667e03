//! Error types for the thermoscope viewer

use thiserror::Error;

/// Main error type for the viewer
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("timed out fetching {0}")]
    Timeout(String),

    #[error("malformed manifest {path}: {detail}")]
    MalformedManifest { path: String, detail: String },

    #[error("malformed volume descriptor {path}: {detail}")]
    MalformedVolumeDescriptor { path: String, detail: String },

    #[error("malformed config {path}: {detail}")]
    MalformedConfig { path: String, detail: String },

    #[error("mesh decode error: {0}")]
    MeshDecode(String),

    #[error("isosurface extraction failed: {0}")]
    Extraction(String),
}

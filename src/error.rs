//! Error types for the render-tree exporters.

use thiserror::Error;

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error while writing an output artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON data.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A polymesh batch references a point that does not exist.
    #[error("Invalid polymesh topology: {0}")]
    InvalidTopology(String),

    /// A link refers to a document that was never loaded.
    #[error("Document not found: {0}")]
    MissingDocument(String),

    /// A material could not be resolved against the current document.
    #[error("Material resolution error: {0}")]
    MaterialResolution(String),

    /// Failed to produce an output artifact.
    #[error("Export error: {0}")]
    Export(String),
}

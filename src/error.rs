//! Error types for the canvas engine and the export pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Failed to load asset {source_name}: {reason}")]
    Asset { source_name: String, reason: String },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CanvasError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Invalid export request: {0}")]
    InvalidRequest(String),

    #[error("SVG parse failed: {0}")]
    Svg(#[from] usvg::Error),

    #[error("Failed to allocate a {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Image filter failed: {0}")]
    Filter(String),

    #[error("PDF generation failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;

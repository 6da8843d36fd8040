//! Error types shared across the library.

use thiserror::Error;

/// Geometry precondition violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// A center or distance was requested on a box with no extent.
    #[error("bounding box is empty")]
    EmptyGeometry,
}

/// Failures that abort reading a whole input file.
///
/// Problems confined to a single field or row are recovered during ingest and
/// only show up in [`crate::ingest::IngestReport`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("column '{0}' not found")]
    MissingColumn(&'static str),
}

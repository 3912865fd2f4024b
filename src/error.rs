//! Error types for the fallible (I/O) parts of the crate.

use std::path::PathBuf;

/// Failures surfaced by the voxel mesh exporter.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExportError {
    /// The destination file could not be created.
    #[error("failed to open \"{}\" for writing", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the mesh data failed after the destination was opened.
    #[error("failed to write mesh data")]
    Write(#[from] std::io::Error),
}

/// Convenient Result alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

//! Polygon file formats.

pub mod shapefile;

use crate::errors::MergeError;

/// Errors raised while reading or writing polygon files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("std::io::Error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("Input is malformed: {0}")]
    MalformedInput(String),

    #[error("The path is malformed: {0}")]
    MalformedPath(String),

    #[error("Geometry rejected: {0}")]
    Geometry(#[from] MergeError),
}

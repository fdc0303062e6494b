use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::xyz::XyzError;
use crate::core::models::coordinate::CoordinateError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read input geometry '{path}': {source}")]
    Geometry {
        path: String,
        #[source]
        source: XyzError,
    },

    #[error("Scan point {index}: {source}")]
    Coordinate {
        index: usize,
        #[source]
        source: CoordinateError,
    },

    #[error("Failed to write job files for scan point {index}: {source}")]
    JobFiles {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan state file '{path}' is invalid: {reason}")]
    State { path: String, reason: String },

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write scan summary: {0}")]
    Summary(#[from] csv::Error),
}

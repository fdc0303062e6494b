use crate::core::io::cube::CubeError;
use crate::core::io::dcm::ModelFileError;
use crate::core::models::charge::{ReplicationError, ReplicationLoadError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("Dimension error: {0}")]
    Dimension(String),

    #[error("The fitting session has been released")]
    Released,

    #[error("No {0} has been loaded")]
    NotLoaded(&'static str),

    #[error("Cube file '{path}' has no grid point inside the fitting mask")]
    EmptyMask { path: String },

    #[error("Failed to read or write cube file '{path}': {source}")]
    Cube {
        path: String,
        #[source]
        source: CubeError,
    },

    #[error("Failed to read or write charge model file '{path}': {source}")]
    ModelFile {
        path: String,
        #[source]
        source: ModelFileError,
    },

    #[error("Failed to load replication definition: {0}")]
    ReplicationFile(#[from] ReplicationLoadError),

    #[error("Invalid replication definition: {0}")]
    Replication(#[from] ReplicationError),
}

//! Error types for partplan

use crate::disk::devicegraph::PartitionType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProposalError {
    #[error("No disk space: {0}")]
    NoDiskSpace(String),

    #[error("No more {kind} partition slots on {disk}")]
    NoMorePartitionSlots { disk: String, kind: PartitionType },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Error allocating {volume}. Details: {source}")]
    AllocationFailure {
        volume: String,
        #[source]
        source: Box<ProposalError>,
    },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Inconsistent devicegraph: {0}")]
    InvalidDevicegraph(String),

    #[error("Partition already exists: {0}")]
    PartitionExists(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProposalError {
    /// Wrap a lower-level failure with the volume that was being processed
    pub fn allocation(volume: impl ToString, source: ProposalError) -> Self {
        ProposalError::AllocationFailure {
            volume: volume.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProposalError>;

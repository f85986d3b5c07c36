//! partplan library - partition proposal engine

pub mod config;
pub mod disk;
pub mod proposal;
pub mod utils;

pub use config::{ProposalSettings, Scenario};
pub use disk::Devicegraph;
pub use proposal::{PartitionCreator, PlannedVolume, PlannedVolumesList, TargetSize};
pub use utils::error::ProposalError;

//! Partition proposal: distributes free space among planned volumes and
//! creates the partitions for them

pub mod creator;
pub mod distributor;
pub mod inventory;
pub mod lvm;
pub mod placer;
pub mod planned_volume;
pub mod strategy;

pub use creator::PartitionCreator;
pub use planned_volume::{Allocation, PlannedVolume, PlannedVolumesList, TargetSize};
pub use strategy::PlacementStrategy;

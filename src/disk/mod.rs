//! Disk model: sizes, regions, devicegraph and free space

pub mod devicegraph;
pub mod free_space;
pub mod naming;
pub mod region;
pub mod size;
pub mod summary;

pub use devicegraph::Devicegraph;
pub use free_space::FreeDiskSpace;
pub use region::Region;
pub use size::DiskSize;

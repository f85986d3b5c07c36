//! Slots of unused disk space

use crate::disk::region::Region;
use crate::disk::size::DiskSize;
use serde::Serialize;
use std::fmt;

/// A contiguous region of unused space on one disk
///
/// A snapshot of the devicegraph at the time it was taken: carving a
/// partition out of the graph makes every previously returned slot stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreeDiskSpace {
    /// Disk the slot belongs to (e.g. `/dev/sda`)
    pub disk_name: String,
    pub region: Region,
    /// Whether the slot lies inside the disk's extended partition
    pub inside_extended: bool,
}

impl FreeDiskSpace {
    pub fn new(disk_name: impl Into<String>, region: Region, inside_extended: bool) -> Self {
        FreeDiskSpace {
            disk_name: disk_name.into(),
            region,
            inside_extended,
        }
    }

    pub fn size(&self) -> DiskSize {
        self.region.size()
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}

impl fmt::Display for FreeDiskSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.disk_name, self.region, self.size())
    }
}

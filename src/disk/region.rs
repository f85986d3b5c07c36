//! Block-addressed disk regions

use crate::disk::size::DiskSize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default logical block size in bytes
pub const DEFAULT_BLOCK_SIZE: u64 = 512;

/// A contiguous extent of blocks on a disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// First block of the region
    pub start: u64,
    /// Number of blocks
    pub length: u64,
    /// Block size in bytes
    #[serde(default = "default_block_size")]
    pub block_size: u64,
}

fn default_block_size() -> u64 {
    DEFAULT_BLOCK_SIZE
}

impl Region {
    pub fn new(start: u64, length: u64, block_size: u64) -> Self {
        Region {
            start,
            length,
            block_size,
        }
    }

    /// First block after the region
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn size(&self) -> DiskSize {
        DiskSize::b(self.length.saturating_mul(self.block_size))
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of whole blocks that fit in `size`, rounded down
    pub fn blocks_for(&self, size: DiskSize) -> u64 {
        if self.block_size == 0 {
            return 0;
        }
        size.bytes() / self.block_size
    }

    /// A region starting where this one starts, sized to hold `size`
    ///
    /// The block count is rounded down so the new region never spills past
    /// the space that was asked for.
    pub fn with_size(&self, size: DiskSize) -> Region {
        Region::new(self.start, self.blocks_for(size), self.block_size)
    }

    /// Whether `other` lies completely within this region
    pub fn contains(&self, other: &Region) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Drop the first `blocks` blocks of the region
    pub fn shrink_front(&mut self, blocks: u64) {
        let taken = blocks.min(self.length);
        self.start += taken;
        self.length -= taken;
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {} B]", self.start, self.length, self.block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_size_rounds_block_count_down() {
        let region = Region::new(2048, 1_000_000, 512);
        let sized = region.with_size(DiskSize::b(1025));
        assert_eq!(sized.start, 2048);
        assert_eq!(sized.length, 2);
        assert_eq!(sized.block_size, 512);
    }

    #[test]
    fn size_is_blocks_times_block_size() {
        let region = Region::new(0, 2048, 4096);
        assert_eq!(region.size(), DiskSize::mib(8));
    }

    #[test]
    fn containment_and_overlap() {
        let outer = Region::new(100, 100, 512);
        let inner = Region::new(150, 50, 512);
        let straddling = Region::new(190, 20, 512);
        let adjacent = Region::new(200, 10, 512);

        assert!(outer.contains(&inner));
        assert!(!outer.contains(&straddling));
        assert!(outer.overlaps(&straddling));
        assert!(!outer.overlaps(&adjacent));
    }

    #[test]
    fn shrink_front_never_underflows() {
        let mut region = Region::new(10, 5, 512);
        region.shrink_front(3);
        assert_eq!(region, Region::new(13, 2, 512));
        region.shrink_front(10);
        assert!(region.is_empty());
        assert_eq!(region.start, 15);
    }
}

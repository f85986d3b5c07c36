//! Free space available to the proposal

use crate::config::ProposalSettings;
use crate::disk::devicegraph::Devicegraph;
use crate::disk::free_space::FreeDiskSpace;
use crate::disk::size::DiskSize;

/// Read-only view of the usable free space in a devicegraph
///
/// Only disks listed as candidates are considered, and slots smaller than
/// the configured useful minimum are ignored. Every call re-reads the graph.
pub struct FreeSpaceInventory<'a> {
    graph: &'a Devicegraph,
    settings: &'a ProposalSettings,
}

impl<'a> FreeSpaceInventory<'a> {
    pub fn new(graph: &'a Devicegraph, settings: &'a ProposalSettings) -> Self {
        FreeSpaceInventory { graph, settings }
    }

    /// Qualifying free slots, ordered by disk (graph order) then start block
    pub fn free_spaces(&self) -> Vec<FreeDiskSpace> {
        self.graph
            .disks_named(&self.settings.candidate_devices)
            .flat_map(|disk| disk.free_spaces())
            .filter(|space| space.size() >= self.settings.useful_free_space_min_size)
            .collect()
    }

    /// Sum of the sizes of all qualifying slots
    pub fn total_free_size(&self) -> DiskSize {
        self.free_spaces().iter().map(|s| s.size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::devicegraph::{Disk, PartitionType, PtableType};
    use crate::disk::region::Region;

    fn settings(candidates: &[&str]) -> ProposalSettings {
        ProposalSettings {
            candidate_devices: candidates.iter().map(|s| s.to_string()).collect(),
            useful_free_space_min_size: DiskSize::mib(30),
            use_lvm: false,
        }
    }

    fn graph() -> Devicegraph {
        let mut graph = Devicegraph::new();

        let sda = graph.add_disk(Disk::with_size("/dev/sda", DiskSize::gib(10)));
        let ptable = sda.create_partition_table(PtableType::Msdos);
        // 10 MiB hole between the two partitions
        ptable
            .create_partition(
                "/dev/sda1",
                Region::new(2048, 2048 * 100, 512),
                PartitionType::Primary,
            )
            .unwrap();
        ptable
            .create_partition(
                "/dev/sda2",
                Region::new(2048 * 111, 2048 * 1000, 512),
                PartitionType::Primary,
            )
            .unwrap();

        let sdb = graph.add_disk(Disk::with_size("/dev/sdb", DiskSize::gib(4)));
        sdb.create_partition_table(PtableType::Gpt);
        graph
    }

    #[test]
    fn ignores_non_candidate_disks() {
        let graph = graph();
        let settings = settings(&["/dev/sdb"]);
        let inventory = FreeSpaceInventory::new(&graph, &settings);
        let spaces = inventory.free_spaces();
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].disk_name, "/dev/sdb");
    }

    #[test]
    fn ignores_slots_below_useful_minimum() {
        let graph = graph();
        let settings = settings(&["/dev/sda"]);
        let inventory = FreeSpaceInventory::new(&graph, &settings);
        let spaces = inventory.free_spaces();
        // The 10 MiB hole is dropped, the tail of the disk remains
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].region.start, 2048 * 1111);
    }

    #[test]
    fn total_is_the_sum_of_qualifying_slots() {
        let graph = graph();
        let settings = settings(&["/dev/sda", "/dev/sdb"]);
        let inventory = FreeSpaceInventory::new(&graph, &settings);
        let expected: DiskSize = inventory.free_spaces().iter().map(|s| s.size()).sum();
        assert_eq!(inventory.total_free_size(), expected);
        assert_eq!(inventory.free_spaces().len(), 2);
    }
}

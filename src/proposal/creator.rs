//! Entry point of the partition proposal

use crate::config::ProposalSettings;
use crate::disk::devicegraph::Devicegraph;
use crate::proposal::lvm::LvmStrategy;
use crate::proposal::planned_volume::{PlannedVolumesList, TargetSize};
use crate::proposal::strategy::{NonLvmStrategy, PlacementStrategy};
use crate::utils::error::Result;
use tracing::{debug, info};

/// Creates the partitions needed by a list of planned volumes
///
/// The original devicegraph is never modified: every call works on a fresh
/// copy and returns it. On error the copy is simply dropped, so callers can
/// retry (e.g. with smaller sizes) without any cleanup.
pub struct PartitionCreator<'a> {
    original_graph: &'a Devicegraph,
    pub settings: ProposalSettings,
}

impl<'a> PartitionCreator<'a> {
    pub fn new(original_graph: &'a Devicegraph, settings: ProposalSettings) -> Self {
        PartitionCreator {
            original_graph,
            settings,
        }
    }

    /// Returns a copy of the original devicegraph in which all the needed
    /// partitions have been created
    pub fn create_partitions(
        &self,
        volumes: &PlannedVolumesList,
        target_size: TargetSize,
    ) -> Result<Devicegraph> {
        let devicegraph = self.original_graph.clone();

        let strategy: Box<dyn PlacementStrategy + '_> = if self.settings.use_lvm {
            Box::new(LvmStrategy::new(&self.settings, target_size))
        } else {
            Box::new(NonLvmStrategy::new(&self.settings, target_size))
        };
        info!(
            "Placing {} volumes ({} sizes) using the {} strategy",
            volumes.len(),
            target_size,
            strategy.name()
        );

        let devicegraph = strategy.place(volumes, devicegraph)?;
        debug!("Proposed devicegraph:\n{}", devicegraph);
        Ok(devicegraph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::devicegraph::{Disk, FsType, Partition, PartitionId, PartitionType, PtableType};
    use crate::disk::region::Region;
    use crate::disk::size::DiskSize;
    use crate::proposal::planned_volume::PlannedVolume;
    use crate::utils::error::ProposalError;

    const GRAIN: u64 = 2048;

    fn settings() -> ProposalSettings {
        ProposalSettings {
            candidate_devices: vec!["/dev/sda".to_string()],
            useful_free_space_min_size: DiskSize::mib(30),
            use_lvm: false,
        }
    }

    /// Disk with a single free slot of exactly `free`, after `primaries`
    /// 1 MiB partitions
    fn graph_with_free_slot(free: DiskSize, primaries: u32) -> Devicegraph {
        let head = GRAIN * (primaries as u64 + 1);
        let blocks = head + free.bytes() / 512;
        let mut graph = Devicegraph::new();
        let disk = graph.add_disk(Disk::new("/dev/sda", blocks, 512));
        let ptable = disk.create_partition_table(PtableType::Msdos);
        for n in 1..=primaries {
            ptable
                .create_partition(
                    &format!("/dev/sda{}", n),
                    Region::new(GRAIN * n as u64, GRAIN, 512),
                    PartitionType::Primary,
                )
                .unwrap();
        }
        graph
    }

    fn volume(mount_point: &str, min: DiskSize, max: DiskSize, weight: f64) -> PlannedVolume {
        let fs = if mount_point == "swap" {
            FsType::Swap
        } else {
            FsType::Ext4
        };
        let mut vol = PlannedVolume::new(mount_point, Some(fs));
        vol.min_size = min;
        vol.max_size = max;
        vol.weight = weight;
        vol
    }

    fn mounted_at<'g>(graph: &'g Devicegraph, mount_point: &str) -> &'g Partition {
        graph
            .partitions()
            .find(|p| {
                p.filesystem
                    .as_ref()
                    .is_some_and(|fs| fs.mount_points.iter().any(|m| m == mount_point))
            })
            .unwrap()
    }

    #[test]
    fn root_absorbs_the_space_swap_cannot_take() {
        let original = graph_with_free_slot(DiskSize::gib(20), 0);
        let volumes = PlannedVolumesList::new(vec![
            volume("/", DiskSize::gib(10), DiskSize::gib(20), 100.0),
            volume("swap", DiskSize::gib(2), DiskSize::gib(2), 0.0),
        ]);

        let creator = PartitionCreator::new(&original, settings());
        let result = creator.create_partitions(&volumes, TargetSize::Min).unwrap();

        assert_eq!(mounted_at(&result, "/").size(), DiskSize::gib(18));
        let swap = mounted_at(&result, "swap");
        assert_eq!(swap.size(), DiskSize::gib(2));
        assert_eq!(swap.id, PartitionId::Swap);
        assert!(result.disks[0].free_spaces().is_empty());
    }

    #[test]
    fn equal_weights_share_the_slot() {
        let original = graph_with_free_slot(DiskSize::gib(11), 0);
        let volumes = PlannedVolumesList::new(vec![
            volume("/", DiskSize::gib(1), DiskSize::unlimited(), 50.0),
            volume("/home", DiskSize::gib(1), DiskSize::unlimited(), 50.0),
        ]);

        let result = PartitionCreator::new(&original, settings())
            .create_partitions(&volumes, TargetSize::Min)
            .unwrap();

        assert_eq!(mounted_at(&result, "/").size(), DiskSize::mib(5632));
        assert_eq!(mounted_at(&result, "/home").size(), DiskSize::mib(5632));
    }

    #[test]
    fn reused_volume_creates_nothing() {
        let original = graph_with_free_slot(DiskSize::gib(20), 0);
        let mut swap = volume("swap", DiskSize::gib(2), DiskSize::gib(2), 0.0);
        swap.reuse = Some("/dev/sdaX".to_string());
        let volumes = PlannedVolumesList::new(vec![
            volume("/", DiskSize::gib(10), DiskSize::unlimited(), 1.0),
            swap,
        ]);

        let result = PartitionCreator::new(&original, settings())
            .create_partitions(&volumes, TargetSize::Min)
            .unwrap();

        // The reused volume still counts against the free space
        assert_eq!(result.partitions().count(), 1);
        assert_eq!(mounted_at(&result, "/").size(), DiskSize::gib(18));
        assert!(volumes.iter().any(|v| v.reuse.is_some() && v.min_size == DiskSize::gib(2)));
    }

    #[test]
    fn fragments_below_the_useful_minimum_mean_no_disk_space() {
        let original = graph_with_free_slot(DiskSize::mib(20), 0);
        let volumes = PlannedVolumesList::new(vec![volume(
            "/",
            DiskSize::mib(10),
            DiskSize::unlimited(),
            1.0,
        )]);

        let err = PartitionCreator::new(&original, settings())
            .create_partitions(&volumes, TargetSize::Min)
            .unwrap_err();

        assert!(matches!(err, ProposalError::NoDiskSpace(_)));
        assert_eq!(original.partitions().count(), 0);
    }

    #[test]
    fn fourth_partition_goes_into_a_new_extended() {
        let original = graph_with_free_slot(DiskSize::gib(10), 3);
        let volumes = PlannedVolumesList::new(vec![volume(
            "/",
            DiskSize::gib(5),
            DiskSize::unlimited(),
            1.0,
        )]);

        let result = PartitionCreator::new(&original, settings())
            .create_partitions(&volumes, TargetSize::Min)
            .unwrap();

        let extended = result.find_partition("/dev/sda4").unwrap();
        assert_eq!(extended.kind, PartitionType::Extended);
        let root = result.find_partition("/dev/sda5").unwrap();
        assert_eq!(root.kind, PartitionType::Logical);
        assert_eq!(root.region, extended.region);
    }

    #[test]
    fn original_graph_is_left_untouched() {
        let original = graph_with_free_slot(DiskSize::gib(20), 0);
        let snapshot = original.clone();
        let volumes = PlannedVolumesList::new(vec![volume(
            "/",
            DiskSize::gib(10),
            DiskSize::unlimited(),
            1.0,
        )]);

        let creator = PartitionCreator::new(&original, settings());
        let first = creator.create_partitions(&volumes, TargetSize::Min).unwrap();
        let second = creator.create_partitions(&volumes, TargetSize::Min).unwrap();

        assert_eq!(original, snapshot);
        assert_eq!(first, second);
    }

    #[test]
    fn desired_target_starts_from_desired_sizes() {
        let original = graph_with_free_slot(DiskSize::gib(20), 0);
        let mut root = volume("/", DiskSize::gib(5), DiskSize::gib(30), 0.0);
        root.desired_size = Some(DiskSize::gib(12));
        let volumes = PlannedVolumesList::new(vec![root]);

        let result = PartitionCreator::new(&original, settings())
            .create_partitions(&volumes, TargetSize::Desired)
            .unwrap();
        assert_eq!(mounted_at(&result, "/").size(), DiskSize::gib(12));

        let result = PartitionCreator::new(&original, settings())
            .create_partitions(&volumes, TargetSize::Min)
            .unwrap();
        assert_eq!(mounted_at(&result, "/").size(), DiskSize::gib(5));
    }

    #[test]
    fn lvm_setting_selects_the_lvm_strategy() {
        let original = graph_with_free_slot(DiskSize::gib(20), 0);
        let mut home = volume("/home", DiskSize::gib(5), DiskSize::unlimited(), 1.0);
        home.can_live_on_logical_volume = true;
        let volumes = PlannedVolumesList::new(vec![home]);

        let mut settings = settings();
        settings.use_lvm = true;
        let err = PartitionCreator::new(&original, settings)
            .create_partitions(&volumes, TargetSize::Min)
            .unwrap_err();
        assert!(matches!(err, ProposalError::NotImplemented(_)));
    }
}

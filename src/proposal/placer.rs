//! Creation of partitions and filesystems for sized volumes

use crate::disk::devicegraph::{Devicegraph, Partition, PartitionId, PartitionTable, PartitionType};
use crate::disk::free_space::FreeDiskSpace;
use crate::disk::naming::{partition_path, FIRST_LOGICAL_PARTITION_NUMBER};
use crate::proposal::planned_volume::{placement_order, Allocation, PlannedVolume};
use crate::utils::error::{ProposalError, Result};
use std::collections::HashSet;
use tracing::{debug, info};

/// Materializes allocations as partitions inside a devicegraph
///
/// Partitions are carved one after another from the front of a single free
/// region. The region is tracked here and shrunk after every partition, so
/// a stale slot is never handed out twice.
pub struct PartitionPlacer<'a> {
    graph: &'a mut Devicegraph,
}

impl<'a> PartitionPlacer<'a> {
    pub fn new(graph: &'a mut Devicegraph) -> Self {
        PartitionPlacer { graph }
    }

    /// Create a partition (and filesystem) for every non-reused allocation.
    ///
    /// Volumes are processed by disk and max start offset. The offset is a
    /// hint only: nothing fails if it cannot be honored.
    pub fn place(&mut self, allocations: &[Allocation], free_space: FreeDiskSpace) -> Result<()> {
        let mut free_space = free_space;

        for alloc in placement_order(allocations) {
            let vol = &alloc.volume;
            if vol.is_reused() {
                info!("Skipping creation of {}", vol);
                continue;
            }

            free_space_for(vol, &free_space)?;
            let blocks = self.create_volume_partition(alloc, &free_space)?;
            free_space.region.shrink_front(blocks);
            debug!("Remaining free space: {}", free_space);
        }

        Ok(())
    }

    /// Create the partition and filesystem for one allocation, then verify
    /// the graph. Returns the number of blocks taken from `free_slot`.
    fn create_volume_partition(
        &mut self,
        alloc: &Allocation,
        free_slot: &FreeDiskSpace,
    ) -> Result<u64> {
        let vol = &alloc.volume;
        info!(
            "Creating partition for {} with {}",
            vol.mount_label(),
            alloc.size
        );

        let disk = self
            .graph
            .disk_mut(&free_slot.disk_name)
            .map_err(|e| ProposalError::allocation(vol, e))?;
        let disk_name = disk.name.clone();
        let ptable = disk.partition_table.as_mut().ok_or_else(|| {
            ProposalError::allocation(
                vol,
                ProposalError::InvalidDevicegraph(format!("{} has no partition table", disk_name)),
            )
        })?;

        let partition_type = if logical_partition_preferred(ptable) {
            if !ptable.has_extended() {
                create_extended_partition(&disk_name, ptable, free_slot)
                    .map_err(|e| wrap_graph_error(vol, e))?;
            }
            PartitionType::Logical
        } else {
            PartitionType::Primary
        };
        let dev_name = match partition_type {
            PartitionType::Logical => next_free_logical_partition_name(&disk_name, ptable)?,
            _ => next_free_primary_partition_name(&disk_name, ptable, partition_type)?,
        };

        let region = free_slot.region.with_size(alloc.size);
        let partition = ptable
            .create_partition(&dev_name, region, partition_type)
            .map_err(|e| ProposalError::allocation(vol, e))?;
        partition.id = vol.resolved_partition_id();
        partition.boot = vol.bootable;
        make_filesystem(partition, vol);

        info!(
            "Created {} partition {} {} (id: {})",
            partition_type, dev_name, region, partition.id
        );

        self.graph
            .check()
            .map_err(|e| ProposalError::allocation(vol, e))?;

        Ok(region.length)
    }
}

/// Check that `free_space` can host the start of `volume`
fn free_space_for(volume: &PlannedVolume, free_space: &FreeDiskSpace) -> Result<()> {
    if free_space.is_empty() {
        return Err(ProposalError::NoDiskSpace(format!(
            "No space to allocate {}",
            volume
        )));
    }
    if let Some(disk) = &volume.disk {
        if *disk != free_space.disk_name {
            return Err(ProposalError::NoDiskSpace(format!(
                "Not possible to allocate {}. All the free space is in {}",
                volume, free_space.disk_name
            )));
        }
    }
    Ok(())
}

/// Whether the next partition should be a logical one
fn logical_partition_preferred(ptable: &PartitionTable) -> bool {
    ptable.extended_possible() && ptable.num_primary() >= ptable.max_primary().saturating_sub(1)
}

/// Create an extended partition covering the whole free slot
fn create_extended_partition(
    disk_name: &str,
    ptable: &mut PartitionTable,
    free_slot: &FreeDiskSpace,
) -> Result<()> {
    let dev_name = next_free_primary_partition_name(disk_name, ptable, PartitionType::Extended)?;
    info!("Creating extended partition {} {}", dev_name, free_slot.region);
    let extended = ptable.create_partition(&dev_name, free_slot.region, PartitionType::Extended)?;
    extended.id = PartitionId::Extended;
    Ok(())
}

/// Naming failures pass through untouched; anything else is reported as an
/// allocation failure of `vol`
fn wrap_graph_error(vol: &PlannedVolume, error: ProposalError) -> ProposalError {
    match error {
        ProposalError::NoMorePartitionSlots { .. } => error,
        other => ProposalError::allocation(vol, other),
    }
}

/// First unused primary name: `/dev/sdx1`, `/dev/sdx2`, ...
fn next_free_primary_partition_name(
    disk_name: &str,
    ptable: &PartitionTable,
    kind: PartitionType,
) -> Result<String> {
    next_free_partition_name(disk_name, ptable, 1, ptable.max_primary(), kind)
}

/// First unused logical name. The first one is always `/dev/sdx5`.
fn next_free_logical_partition_name(disk_name: &str, ptable: &PartitionTable) -> Result<String> {
    next_free_partition_name(
        disk_name,
        ptable,
        FIRST_LOGICAL_PARTITION_NUMBER,
        ptable.max_logical(),
        PartitionType::Logical,
    )
}

fn next_free_partition_name(
    disk_name: &str,
    ptable: &PartitionTable,
    first: u32,
    last: u32,
    kind: PartitionType,
) -> Result<String> {
    let used: HashSet<&str> = ptable.partition_names().collect();
    (first..=last)
        .map(|i| partition_path(disk_name, i))
        .find(|name| !used.contains(name.as_str()))
        .ok_or_else(|| ProposalError::NoMorePartitionSlots {
            disk: disk_name.to_string(),
            kind,
        })
}

/// Create the volume's filesystem on `partition`, if it has one configured
fn make_filesystem(partition: &mut Partition, vol: &PlannedVolume) {
    let Some(fs_type) = vol.filesystem_type else {
        return;
    };
    let filesystem = partition.create_filesystem(fs_type);
    if !vol.mount_point.is_empty() {
        filesystem.add_mount_point(&vol.mount_point);
    }
    if let Some(label) = &vol.label {
        filesystem.label = Some(label.clone());
    }
    if let Some(uuid) = vol.uuid {
        filesystem.uuid = Some(uuid);
    }
}

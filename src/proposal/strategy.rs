//! Placement strategies
//!
//! A strategy turns a list of planned volumes into partitions inside a
//! devicegraph. Only the single-slot, non-LVM case is implemented; the other
//! strategies are explicit extension points that fail with `NotImplemented`.

use crate::config::ProposalSettings;
use crate::disk::devicegraph::Devicegraph;
use crate::proposal::distributor::distribute_extra_space;
use crate::proposal::inventory::FreeSpaceInventory;
use crate::proposal::placer::PartitionPlacer;
use crate::proposal::planned_volume::{total_size, PlannedVolumesList, TargetSize};
use crate::utils::error::{ProposalError, Result};
use tracing::{info, warn};

/// A way of placing volumes into a devicegraph
pub trait PlacementStrategy {
    fn name(&self) -> &'static str;

    /// Place `volumes` into `graph`, returning the modified graph
    fn place(&self, volumes: &PlannedVolumesList, graph: Devicegraph) -> Result<Devicegraph>;
}

/// Plain partitions, picking the single- or multi-slot strategy depending
/// on how many usable free slots the candidate disks have
pub struct NonLvmStrategy<'a> {
    settings: &'a ProposalSettings,
    target: TargetSize,
}

impl<'a> NonLvmStrategy<'a> {
    pub fn new(settings: &'a ProposalSettings, target: TargetSize) -> Self {
        NonLvmStrategy { settings, target }
    }
}

impl PlacementStrategy for NonLvmStrategy<'_> {
    fn name(&self) -> &'static str {
        "non-lvm"
    }

    fn place(&self, volumes: &PlannedVolumesList, graph: Devicegraph) -> Result<Devicegraph> {
        if volumes.iter().all(|v| v.is_reused()) {
            info!("No new partitions needed");
            return Ok(graph);
        }

        let slots = FreeSpaceInventory::new(&graph, self.settings).free_spaces();
        match slots.len() {
            0 => Err(ProposalError::NoDiskSpace(format!(
                "No free space of at least {} on {}",
                self.settings.useful_free_space_min_size,
                self.settings.candidate_devices.join(", ")
            ))),
            1 => SingleSlotStrategy::new(self.settings, self.target).place(volumes, graph),
            n => {
                info!("{} free space slots available", n);
                MultiSlotStrategy.place(volumes, graph)
            }
        }
    }
}

/// All the free space is in one slot, so volumes are simply carved from it
/// one after another without worrying about how they fit.
pub struct SingleSlotStrategy<'a> {
    settings: &'a ProposalSettings,
    target: TargetSize,
}

impl<'a> SingleSlotStrategy<'a> {
    pub fn new(settings: &'a ProposalSettings, target: TargetSize) -> Self {
        SingleSlotStrategy { settings, target }
    }
}

impl PlacementStrategy for SingleSlotStrategy<'_> {
    fn name(&self) -> &'static str {
        "single-slot"
    }

    fn place(&self, volumes: &PlannedVolumesList, graph: Devicegraph) -> Result<Devicegraph> {
        let mut graph = graph;

        for vol in volumes {
            info!(
                "vol {}\tmin: {} max: {} desired: {} weight: {}",
                vol.mount_point,
                vol.min_size,
                vol.max_size,
                vol.desired_size
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                vol.weight
            );
        }

        let inventory = FreeSpaceInventory::new(&graph, self.settings);
        let mut slots = inventory.free_spaces();
        let slot = match slots.len() {
            0 => {
                return Err(ProposalError::NoDiskSpace(
                    "No free space slot for the volumes".to_string(),
                ))
            }
            1 => slots.remove(0),
            n => {
                return Err(ProposalError::NotImplemented(format!(
                    "placing volumes in one of {} free space slots",
                    n
                )))
            }
        };
        let total_free = inventory.total_free_size();

        let min_required = volumes.total_min_size();
        if min_required > total_free {
            warn!(
                "Volumes need at least {} but only {} is free in {}",
                min_required, total_free, slot
            );
        }

        let mut allocations = volumes.allocations(self.target);
        let required = total_size(&allocations);
        distribute_extra_space(&mut allocations, total_free - required);

        PartitionPlacer::new(&mut graph).place(&allocations, slot)?;
        Ok(graph)
    }
}

/// Free space spread over several slots: volumes would have to be fitted
/// into them as well as possible.
pub struct MultiSlotStrategy;

impl PlacementStrategy for MultiSlotStrategy {
    fn name(&self) -> &'static str {
        "multi-slot"
    }

    fn place(&self, _volumes: &PlannedVolumesList, _graph: Devicegraph) -> Result<Devicegraph> {
        Err(ProposalError::NotImplemented(
            "placing volumes across several free space slots".to_string(),
        ))
    }
}

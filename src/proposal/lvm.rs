//! LVM placement
//!
//! Volumes that cannot live on a logical volume are created as plain
//! partitions first, so LVM does not consume all the available free space.
//! The remaining volumes would then go to logical volumes in the system
//! volume group. Creating volume groups, physical volumes and logical
//! volumes in the devicegraph is not supported yet.

use crate::config::ProposalSettings;
use crate::disk::devicegraph::Devicegraph;
use crate::proposal::planned_volume::{PlannedVolume, PlannedVolumesList, TargetSize};
use crate::proposal::strategy::{NonLvmStrategy, PlacementStrategy};
use crate::utils::error::{ProposalError, Result};
use tracing::info;

/// Name of the volume group holding the system logical volumes
pub const VOLUME_GROUP_SYSTEM: &str = "system";

/// LVM volume group definition
#[derive(Debug, Clone)]
pub struct VolumeGroup {
    pub name: String,
}

/// Get the device path for a logical volume
pub fn lv_path(vg_name: &str, lv_name: &str) -> String {
    format!("/dev/{}/{}", vg_name, lv_name)
}

pub struct LvmStrategy<'a> {
    settings: &'a ProposalSettings,
    target: TargetSize,
}

impl<'a> LvmStrategy<'a> {
    pub fn new(settings: &'a ProposalSettings, target: TargetSize) -> Self {
        LvmStrategy { settings, target }
    }
}

impl PlacementStrategy for LvmStrategy<'_> {
    fn name(&self) -> &'static str {
        "lvm"
    }

    fn place(&self, volumes: &PlannedVolumesList, graph: Devicegraph) -> Result<Devicegraph> {
        let (lvm_volumes, partition_volumes) = volumes.split_by(|v| v.can_live_on_logical_volume);
        info!(
            "{} volumes on LVM, {} on plain partitions",
            lvm_volumes.len(),
            partition_volumes.len()
        );

        let mut graph =
            NonLvmStrategy::new(self.settings, self.target).place(&partition_volumes, graph)?;
        if lvm_volumes.is_empty() {
            return Ok(graph);
        }

        let volume_group = create_volume_group(&mut graph, VOLUME_GROUP_SYSTEM)?;
        create_physical_volumes(&mut graph, &volume_group)?;
        for vol in &lvm_volumes {
            create_logical_volume(&mut graph, &volume_group, vol, self.target)?;
        }
        Ok(graph)
    }
}

fn create_volume_group(_graph: &mut Devicegraph, name: &str) -> Result<VolumeGroup> {
    info!("Creating LVM volume group {}", name);
    Err(ProposalError::NotImplemented(format!(
        "creating LVM volume group {}",
        name
    )))
}

/// Would turn the rest of the free space into physical volumes of `vg`
fn create_physical_volumes(_graph: &mut Devicegraph, vg: &VolumeGroup) -> Result<()> {
    info!("Creating LVM physical volumes for {}", vg.name);
    Err(ProposalError::NotImplemented(format!(
        "creating LVM physical volumes for {}",
        vg.name
    )))
}

fn create_logical_volume(
    _graph: &mut Devicegraph,
    vg: &VolumeGroup,
    vol: &PlannedVolume,
    target: TargetSize,
) -> Result<()> {
    let lv_name = vol.logical_volume_name.as_deref().unwrap_or("-");
    info!(
        "Creating LVM logical volume {} at {} with strategy \"{}\"",
        lv_path(&vg.name, lv_name),
        vg.name,
        target
    );
    Err(ProposalError::NotImplemented(format!(
        "creating LVM logical volume {} for {}",
        lv_name, vol
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::devicegraph::{Disk, FsType, PtableType};
    use crate::disk::size::DiskSize;

    fn settings() -> ProposalSettings {
        ProposalSettings {
            candidate_devices: vec!["/dev/sda".to_string()],
            useful_free_space_min_size: DiskSize::mib(30),
            use_lvm: true,
        }
    }

    fn graph() -> Devicegraph {
        let mut graph = Devicegraph::new();
        graph
            .add_disk(Disk::with_size("/dev/sda", DiskSize::gib(20)))
            .create_partition_table(PtableType::Gpt);
        graph
    }

    fn volume(mount_point: &str, on_lvm: bool) -> PlannedVolume {
        let mut vol = PlannedVolume::new(mount_point, Some(FsType::Ext4));
        vol.min_size = DiskSize::gib(1);
        vol.max_size = DiskSize::gib(2);
        vol.can_live_on_logical_volume = on_lvm;
        vol.logical_volume_name = on_lvm.then(|| mount_point.trim_start_matches('/').to_string());
        vol
    }

    #[test]
    fn plain_volumes_only_are_created_as_partitions() {
        let settings = settings();
        let volumes = PlannedVolumesList::new(vec![volume("/boot", false)]);
        let result = LvmStrategy::new(&settings, TargetSize::Min)
            .place(&volumes, graph())
            .unwrap();
        assert_eq!(result.partitions().count(), 1);
    }

    #[test]
    fn logical_volumes_are_not_implemented() {
        let settings = settings();
        let volumes = PlannedVolumesList::new(vec![volume("/boot", false), volume("/home", true)]);
        let err = LvmStrategy::new(&settings, TargetSize::Min)
            .place(&volumes, graph())
            .unwrap_err();
        assert!(matches!(err, ProposalError::NotImplemented(_)));
    }

    #[test]
    fn logical_volume_paths() {
        assert_eq!(lv_path(VOLUME_GROUP_SYSTEM, "root"), "/dev/system/root");
    }
}

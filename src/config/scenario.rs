//! Proposal scenarios: everything needed for one run of the proposal
//!
//! A scenario bundles the current devicegraph, the planned volumes and the
//! settings into a single TOML document, so a proposal can be reproduced
//! from a file.

use crate::config::settings::ProposalSettings;
use crate::disk::devicegraph::{Devicegraph, Disk, FsType, PartitionId, PartitionType, PtableType};
use crate::disk::region::Region;
use crate::disk::size::DiskSize;
use crate::proposal::planned_volume::{PlannedVolume, PlannedVolumesList, TargetSize};
use crate::utils::error::{ProposalError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub settings: ProposalSettings,
    #[serde(default)]
    pub target_size: TargetSize,
    pub devicegraph: Devicegraph,
    #[serde(default)]
    pub volumes: PlannedVolumesList,
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let scenario: Scenario = toml::from_str(&content)?;
        Ok(scenario)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate a sample scenario: a 64 GiB disk holding a Windows partition
    /// and free space for a Linux installation
    pub fn sample() -> Self {
        let mut devicegraph = Devicegraph::new();
        let disk = devicegraph.add_disk(Disk::with_size("/dev/sda", DiskSize::gib(64)));
        let ptable = disk.create_partition_table(PtableType::Msdos);
        if let Ok(windows) = ptable.create_partition(
            "/dev/sda1",
            Region::new(2048, DiskSize::gib(24).bytes() / 512, 512),
            PartitionType::Primary,
        ) {
            windows.id = PartitionId::Ntfs;
            windows.boot = true;
            windows.create_filesystem(FsType::Ntfs).label = Some("windows".to_string());
        }

        let mut root = PlannedVolume::new("/", Some(FsType::Btrfs));
        root.min_size = DiskSize::gib(10);
        root.max_size = DiskSize::gib(30);
        root.desired_size = Some(DiskSize::gib(20));
        root.weight = 60.0;

        let mut home = PlannedVolume::new("/home", Some(FsType::Xfs));
        home.min_size = DiskSize::gib(5);
        home.max_size = DiskSize::unlimited();
        home.desired_size = Some(DiskSize::gib(10));
        home.weight = 40.0;

        let mut swap = PlannedVolume::new("swap", Some(FsType::Swap));
        swap.min_size = DiskSize::gib(2);
        swap.max_size = DiskSize::gib(2);
        swap.desired_size = Some(DiskSize::gib(2));

        Scenario {
            settings: ProposalSettings::sample(),
            target_size: TargetSize::Desired,
            devicegraph,
            volumes: PlannedVolumesList::new(vec![root, home, swap]),
        }
    }

    /// Validate the scenario
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.devicegraph.check()?;

        for device in &self.settings.candidate_devices {
            self.devicegraph.disk(device)?;
        }

        for vol in &self.volumes {
            if vol.min_size > vol.max_size {
                return Err(ProposalError::ValidationError(format!(
                    "{}: min size is larger than max size",
                    vol
                )));
            }
            if vol.weight.is_nan() || vol.weight < 0.0 {
                return Err(ProposalError::ValidationError(format!(
                    "{}: weight must be a non-negative number",
                    vol
                )));
            }
            if let Some(reuse) = &vol.reuse {
                if self.devicegraph.find_partition(reuse).is_none() {
                    return Err(ProposalError::ValidationError(format!(
                        "{}: partition to reuse does not exist",
                        vol
                    )));
                }
            }
        }

        Ok(())
    }
}

//! Planned volumes: abstract storage requirements waiting to be placed

use crate::disk::devicegraph::{FsType, PartitionId};
use crate::disk::size::DiskSize;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Which bound of a volume's size range is used as its starting size
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetSize {
    #[default]
    Desired,
    Min,
}

impl std::fmt::Display for TargetSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desired => write!(f, "desired"),
            Self::Min => write!(f, "min"),
        }
    }
}

/// A requirement to be satisfied by one partition, or by reusing an
/// existing one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedVolume {
    /// Mount point; empty for volumes that are never mounted
    #[serde(default)]
    pub mount_point: String,
    #[serde(default)]
    pub min_size: DiskSize,
    #[serde(default = "DiskSize::unlimited")]
    pub max_size: DiskSize,
    /// Preferred size; unset means "same as the minimum"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_size: Option<DiskSize>,
    /// Share of the extra space this volume receives, relative to the others
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem_type: Option<FsType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub bootable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<PartitionId>,
    /// Disk the volume must be placed on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
    /// Preferred upper bound for the partition's start (best effort)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_start_offset: Option<DiskSize>,
    /// Existing partition to reuse instead of creating a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse: Option<String>,
    #[serde(default)]
    pub can_live_on_logical_volume: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_volume_name: Option<String>,
}

impl PlannedVolume {
    pub fn new(mount_point: impl Into<String>, filesystem_type: Option<FsType>) -> Self {
        PlannedVolume {
            mount_point: mount_point.into(),
            min_size: DiskSize::ZERO,
            max_size: DiskSize::unlimited(),
            desired_size: None,
            weight: 0.0,
            filesystem_type,
            label: None,
            uuid: None,
            bootable: false,
            partition_id: None,
            disk: None,
            max_start_offset: None,
            reuse: None,
            can_live_on_logical_volume: false,
            logical_volume_name: None,
        }
    }

    /// Starting size for the given target, always within `[min, max]`
    pub fn min_valid_size(&self, target: TargetSize) -> DiskSize {
        let size = match target {
            TargetSize::Min => self.min_size,
            TargetSize::Desired => match self.desired_size {
                Some(desired) if !desired.is_unlimited() => desired,
                _ => self.min_size,
            },
        };
        size.max(self.min_size).min(self.max_size)
    }

    /// Partition id for the volume: the explicit one, or a default derived
    /// from the mount point
    pub fn resolved_partition_id(&self) -> PartitionId {
        match self.partition_id {
            Some(id) => id,
            None if self.mount_point == "swap" => PartitionId::Swap,
            None => PartitionId::Linux,
        }
    }

    pub fn is_reused(&self) -> bool {
        self.reuse.is_some()
    }

    /// Mount point for messages, `(unmounted)` when there is none
    pub fn mount_label(&self) -> &str {
        if self.mount_point.is_empty() {
            "(unmounted)"
        } else {
            &self.mount_point
        }
    }
}

impl fmt::Display for PlannedVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "volume {} (min: {}, max: {}, weight: {})",
            self.mount_label(),
            self.min_size,
            self.max_size,
            self.weight
        )?;
        if let Some(reuse) = &self.reuse {
            write!(f, " reusing {}", reuse)?;
        }
        Ok(())
    }
}

/// An ordered collection of planned volumes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PlannedVolumesList {
    volumes: Vec<PlannedVolume>,
}

impl PlannedVolumesList {
    pub fn new(volumes: Vec<PlannedVolume>) -> Self {
        PlannedVolumesList { volumes }
    }

    pub fn push(&mut self, volume: PlannedVolume) {
        self.volumes.push(volume);
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedVolume> {
        self.volumes.iter()
    }

    pub fn total_min_size(&self) -> DiskSize {
        self.volumes.iter().map(|v| v.min_size).sum()
    }

    pub fn total_weight(&self) -> f64 {
        self.volumes.iter().map(|v| v.weight).sum()
    }

    /// Split into (matching, non-matching), keeping the original order
    pub fn split_by<F>(&self, predicate: F) -> (PlannedVolumesList, PlannedVolumesList)
    where
        F: Fn(&PlannedVolume) -> bool,
    {
        let (yes, no): (Vec<_>, Vec<_>) = self.volumes.iter().cloned().partition(|v| predicate(v));
        (PlannedVolumesList::new(yes), PlannedVolumesList::new(no))
    }

    /// Allocation state for each volume, starting at its minimum valid size
    /// for `target`. The list itself is left untouched.
    pub fn allocations(&self, target: TargetSize) -> Vec<Allocation> {
        self.volumes
            .iter()
            .map(|v| Allocation::new(v.clone(), v.min_valid_size(target)))
            .collect()
    }
}

impl FromIterator<PlannedVolume> for PlannedVolumesList {
    fn from_iter<I: IntoIterator<Item = PlannedVolume>>(iter: I) -> Self {
        PlannedVolumesList::new(iter.into_iter().collect())
    }
}

impl IntoIterator for PlannedVolumesList {
    type Item = PlannedVolume;
    type IntoIter = std::vec::IntoIter<PlannedVolume>;

    fn into_iter(self) -> Self::IntoIter {
        self.volumes.into_iter()
    }
}

impl<'a> IntoIterator for &'a PlannedVolumesList {
    type Item = &'a PlannedVolume;
    type IntoIter = std::slice::Iter<'a, PlannedVolume>;

    fn into_iter(self) -> Self::IntoIter {
        self.volumes.iter()
    }
}

/// A volume together with the size it has been allotted so far
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub volume: PlannedVolume,
    pub size: DiskSize,
}

impl Allocation {
    pub fn new(volume: PlannedVolume, size: DiskSize) -> Self {
        Allocation { volume, size }
    }

    /// Whether the volume may still grow during extra space distribution
    pub fn can_grow(&self) -> bool {
        !self.volume.is_reused() && self.size < self.volume.max_size
    }
}

/// Sum of the allotted sizes
pub fn total_size(allocations: &[Allocation]) -> DiskSize {
    allocations.iter().map(|a| a.size).sum()
}

/// Placement order: by disk, then by max start offset. Volumes without a
/// value for a key sort after those with one; ties keep their input order.
pub fn placement_order(allocations: &[Allocation]) -> Vec<&Allocation> {
    let mut ordered: Vec<&Allocation> = allocations.iter().collect();
    ordered.sort_by(|a, b| {
        none_last(&a.volume.disk, &b.volume.disk)
            .then_with(|| none_last(&a.volume.max_start_offset, &b.volume.max_start_offset))
    });
    ordered
}

fn none_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

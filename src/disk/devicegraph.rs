//! In-memory model of disks, partition tables, partitions and filesystems
//!
//! A [`Devicegraph`] describes a target layout; nothing here touches real
//! block devices. Cloning a graph yields an independent working copy.

use crate::disk::free_space::FreeDiskSpace;
use crate::disk::naming::{partition_number, partition_prefix, FIRST_LOGICAL_PARTITION_NUMBER};
use crate::disk::region::{Region, DEFAULT_BLOCK_SIZE};
use crate::disk::size::DiskSize;
use crate::utils::error::{ProposalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Partitions and free slots are aligned to this boundary (2048 sectors of
/// 512 bytes)
const ALIGNMENT_BYTES: u64 = 1024 * 1024;

/// Blocks at the end of a GPT disk reserved for the backup header
const GPT_BACKUP_BLOCKS: u64 = 33;

/// Blocks at the start of a GPT disk (protective MBR + header + entries)
const GPT_PRIMARY_BLOCKS: u64 = 34;

/// Partition table type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PtableType {
    #[default]
    Msdos,
    Gpt,
}

impl std::fmt::Display for PtableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Msdos => write!(f, "msdos"),
            Self::Gpt => write!(f, "gpt"),
        }
    }
}

impl PtableType {
    /// Highest number a primary (or extended) partition can have
    pub fn max_primary(&self) -> u32 {
        match self {
            Self::Msdos => 4,
            Self::Gpt => 128,
        }
    }

    /// Highest number a logical partition can have
    pub fn max_logical(&self) -> u32 {
        match self {
            Self::Msdos => 256,
            Self::Gpt => 0,
        }
    }

    pub fn extended_possible(&self) -> bool {
        matches!(self, Self::Msdos)
    }
}

/// Kind of partition in a partition table
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PartitionType {
    #[default]
    Primary,
    Extended,
    Logical,
}

impl std::fmt::Display for PartitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Extended => write!(f, "extended"),
            Self::Logical => write!(f, "logical"),
        }
    }
}

/// Partition id (system type)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartitionId {
    #[default]
    Linux,
    Swap,
    Lvm,
    Raid,
    Esp,
    BiosBoot,
    Prep,
    Ntfs,
    Dos32,
    Extended,
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "Linux"),
            Self::Swap => write!(f, "Linux swap"),
            Self::Lvm => write!(f, "Linux LVM"),
            Self::Raid => write!(f, "Linux RAID"),
            Self::Esp => write!(f, "EFI System"),
            Self::BiosBoot => write!(f, "BIOS boot"),
            Self::Prep => write!(f, "PReP boot"),
            Self::Ntfs => write!(f, "NTFS"),
            Self::Dos32 => write!(f, "FAT32"),
            Self::Extended => write!(f, "Extended"),
        }
    }
}

impl PartitionId {
    /// Numeric id as used in MS-DOS partition tables. Ids without an MBR
    /// equivalent get a value above 255.
    pub fn code(&self) -> u32 {
        match self {
            Self::Linux => 0x83,
            Self::Swap => 0x82,
            Self::Lvm => 0x8e,
            Self::Raid => 0xfd,
            Self::Esp => 0xef,
            Self::BiosBoot => 0x101,
            Self::Prep => 0x41,
            Self::Ntfs => 0x07,
            Self::Dos32 => 0x0c,
            Self::Extended => 0x05,
        }
    }
}

/// Filesystem type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    Btrfs,
    Ext2,
    Ext3,
    Ext4,
    Xfs,
    Vfat,
    Ntfs,
    F2fs,
    Swap,
}

impl std::fmt::Display for FsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Btrfs => write!(f, "btrfs"),
            Self::Ext2 => write!(f, "ext2"),
            Self::Ext3 => write!(f, "ext3"),
            Self::Ext4 => write!(f, "ext4"),
            Self::Xfs => write!(f, "xfs"),
            Self::Vfat => write!(f, "vfat"),
            Self::Ntfs => write!(f, "ntfs"),
            Self::F2fs => write!(f, "f2fs"),
            Self::Swap => write!(f, "swap"),
        }
    }
}

/// A filesystem living on a partition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filesystem {
    #[serde(rename = "type")]
    pub fs_type: FsType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl Filesystem {
    pub fn new(fs_type: FsType) -> Self {
        Filesystem {
            fs_type,
            mount_points: Vec::new(),
            label: None,
            uuid: None,
        }
    }

    pub fn add_mount_point(&mut self, mount_point: &str) {
        if !self.mount_points.iter().any(|mp| mp == mount_point) {
            self.mount_points.push(mount_point.to_string());
        }
    }
}

/// A partition in a partition table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Partition {
    /// Device name (e.g. `/dev/sda1`)
    pub name: String,
    pub region: Region,
    #[serde(rename = "type", default)]
    pub kind: PartitionType,
    #[serde(default)]
    pub id: PartitionId,
    #[serde(default)]
    pub boot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Filesystem>,
}

impl Partition {
    pub fn size(&self) -> DiskSize {
        self.region.size()
    }

    /// Put a new filesystem on the partition, replacing any previous one
    pub fn create_filesystem(&mut self, fs_type: FsType) -> &mut Filesystem {
        self.filesystem.insert(Filesystem::new(fs_type))
    }
}

/// A partition table and the partitions it holds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PartitionTable {
    #[serde(rename = "type", default)]
    pub kind: PtableType,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

impl PartitionTable {
    pub fn new(kind: PtableType) -> Self {
        PartitionTable {
            kind,
            partitions: Vec::new(),
        }
    }

    pub fn max_primary(&self) -> u32 {
        self.kind.max_primary()
    }

    pub fn max_logical(&self) -> u32 {
        self.kind.max_logical()
    }

    pub fn extended_possible(&self) -> bool {
        self.kind.extended_possible()
    }

    /// Number of primary partitions (the extended partition is not counted)
    pub fn num_primary(&self) -> u32 {
        self.partitions
            .iter()
            .filter(|p| p.kind == PartitionType::Primary)
            .count() as u32
    }

    pub fn has_extended(&self) -> bool {
        self.extended().is_some()
    }

    pub fn extended(&self) -> Option<&Partition> {
        self.partitions
            .iter()
            .find(|p| p.kind == PartitionType::Extended)
    }

    pub fn partition_names(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().map(|p| p.name.as_str())
    }

    /// Blocks of `disk_region` a partition may occupy
    pub fn usable_region(&self, disk_region: &Region) -> Region {
        let (head, tail) = match self.kind {
            PtableType::Msdos => (1, 0),
            PtableType::Gpt => (GPT_PRIMARY_BLOCKS, GPT_BACKUP_BLOCKS),
        };
        let start = disk_region.start + head;
        let length = disk_region.length.saturating_sub(head + tail);
        Region::new(start, length, disk_region.block_size)
    }

    /// Add a partition. Fails if a partition with the same name exists.
    pub fn create_partition(
        &mut self,
        name: &str,
        region: Region,
        kind: PartitionType,
    ) -> Result<&mut Partition> {
        if self.partition_names().any(|n| n == name) {
            return Err(ProposalError::PartitionExists(name.to_string()));
        }

        let id = match kind {
            PartitionType::Extended => PartitionId::Extended,
            _ => PartitionId::Linux,
        };
        let index = self.partitions.len();
        self.partitions.push(Partition {
            name: name.to_string(),
            region,
            kind,
            id,
            boot: false,
            filesystem: None,
        });
        Ok(&mut self.partitions[index])
    }

    /// Unused, aligned regions of the table, in ascending start order
    ///
    /// Returns gaps between primary/extended partitions plus gaps inside the
    /// extended partition that no logical partition covers.
    pub fn unused_slots(&self, disk_region: &Region) -> Vec<(Region, bool)> {
        let grain = alignment_grain(disk_region.block_size);
        let usable = self.usable_region(disk_region);

        let top_level: Vec<Region> = self
            .partitions
            .iter()
            .filter(|p| p.kind != PartitionType::Logical)
            .map(|p| p.region)
            .collect();
        let mut slots: Vec<(Region, bool)> = gaps(&usable, top_level, grain)
            .into_iter()
            .map(|r| (r, false))
            .collect();

        if let Some(extended) = self.extended() {
            let logical: Vec<Region> = self
                .partitions
                .iter()
                .filter(|p| p.kind == PartitionType::Logical)
                .map(|p| p.region)
                .collect();
            slots.extend(
                gaps(&extended.region, logical, grain)
                    .into_iter()
                    .map(|r| (r, true)),
            );
        }

        slots.sort_by_key(|(r, _)| r.start);
        slots
    }
}

/// Alignment expressed in blocks of `block_size`
fn alignment_grain(block_size: u64) -> u64 {
    if block_size == 0 {
        return 1;
    }
    (ALIGNMENT_BYTES / block_size).max(1)
}

/// Regions of `container` not covered by `occupied`, with each gap's start
/// rounded up to `grain`
fn gaps(container: &Region, mut occupied: Vec<Region>, grain: u64) -> Vec<Region> {
    occupied.sort_by_key(|r| r.start);

    let mut raw = Vec::new();
    let mut cursor = container.start;
    for region in occupied {
        let start = region.start.max(container.start).min(container.end());
        if start > cursor {
            raw.push((cursor, start));
        }
        cursor = cursor.max(region.end().min(container.end()));
    }
    if cursor < container.end() {
        raw.push((cursor, container.end()));
    }

    raw.into_iter()
        .filter_map(|(start, end)| {
            let aligned = start.div_ceil(grain) * grain;
            (aligned < end).then(|| Region::new(aligned, end - aligned, container.block_size))
        })
        .collect()
}

/// A disk and its (optional) partition table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disk {
    /// Device path (e.g. `/dev/sda`)
    pub name: String,
    /// The whole disk, starting at block 0
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_table: Option<PartitionTable>,
}

impl Disk {
    pub fn new(name: impl Into<String>, blocks: u64, block_size: u64) -> Self {
        Disk {
            name: name.into(),
            region: Region::new(0, blocks, block_size),
            partition_table: None,
        }
    }

    /// A disk of `size` with 512 byte blocks
    pub fn with_size(name: impl Into<String>, size: DiskSize) -> Self {
        Disk::new(name, size.bytes() / DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_SIZE)
    }

    pub fn size(&self) -> DiskSize {
        self.region.size()
    }

    /// Create an empty partition table, dropping any existing one
    pub fn create_partition_table(&mut self, kind: PtableType) -> &mut PartitionTable {
        self.partition_table.insert(PartitionTable::new(kind))
    }

    /// Unused slots on the disk. A disk without a partition table has none.
    pub fn free_spaces(&self) -> Vec<FreeDiskSpace> {
        match &self.partition_table {
            Some(ptable) => ptable
                .unused_slots(&self.region)
                .into_iter()
                .map(|(region, inside_extended)| {
                    FreeDiskSpace::new(self.name.clone(), region, inside_extended)
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn check(&self, names: &mut HashSet<String>) -> Result<()> {
        if self.region.block_size == 0 {
            return Err(invalid(format!("{} has a block size of 0", self.name)));
        }

        let Some(ptable) = &self.partition_table else {
            return Ok(());
        };

        let usable = ptable.usable_region(&self.region);
        let mut top_level: Vec<&Partition> = Vec::new();
        let mut logical: Vec<&Partition> = Vec::new();
        let mut extended: Option<&Partition> = None;

        for part in &ptable.partitions {
            if !names.insert(part.name.clone()) {
                return Err(invalid(format!("duplicate partition name {}", part.name)));
            }
            if part.region.is_empty() {
                return Err(invalid(format!("{} is empty", part.name)));
            }
            if part.region.block_size != self.region.block_size {
                return Err(invalid(format!(
                    "{} uses block size {} on a disk with block size {}",
                    part.name, part.region.block_size, self.region.block_size
                )));
            }

            let number = partition_number(&self.name, &part.name).ok_or_else(|| {
                invalid(format!(
                    "{} is not named after {}",
                    part.name,
                    partition_prefix(&self.name)
                ))
            })?;

            match part.kind {
                PartitionType::Primary | PartitionType::Extended => {
                    if number == 0 || number > ptable.max_primary() {
                        return Err(invalid(format!(
                            "{} has number {} outside 1..={}",
                            part.name,
                            number,
                            ptable.max_primary()
                        )));
                    }
                    if !usable.contains(&part.region) {
                        return Err(invalid(format!(
                            "{} {} lies outside the usable area {} of {}",
                            part.name, part.region, usable, self.name
                        )));
                    }
                    if part.kind == PartitionType::Extended {
                        if !ptable.extended_possible() {
                            return Err(invalid(format!(
                                "{} is extended on a {} partition table",
                                part.name, ptable.kind
                            )));
                        }
                        if extended.replace(part).is_some() {
                            return Err(invalid(format!(
                                "{} has more than one extended partition",
                                self.name
                            )));
                        }
                        if part.filesystem.is_some() {
                            return Err(invalid(format!(
                                "{} is extended and cannot hold a filesystem",
                                part.name
                            )));
                        }
                    }
                    top_level.push(part);
                }
                PartitionType::Logical => {
                    if number < FIRST_LOGICAL_PARTITION_NUMBER || number > ptable.max_logical() {
                        return Err(invalid(format!(
                            "{} has logical number {} outside {}..={}",
                            part.name,
                            number,
                            FIRST_LOGICAL_PARTITION_NUMBER,
                            ptable.max_logical()
                        )));
                    }
                    logical.push(part);
                }
            }
        }

        if top_level.len() as u32 > ptable.max_primary() {
            return Err(invalid(format!(
                "{} has {} primary/extended partitions, at most {} allowed",
                self.name,
                top_level.len(),
                ptable.max_primary()
            )));
        }
        check_no_overlap(&top_level)?;

        if !logical.is_empty() {
            let extended = extended.ok_or_else(|| {
                invalid(format!(
                    "{} has logical partitions but no extended partition",
                    self.name
                ))
            })?;
            for part in &logical {
                if !extended.region.contains(&part.region) {
                    return Err(invalid(format!(
                        "logical {} {} lies outside extended {} {}",
                        part.name, part.region, extended.name, extended.region
                    )));
                }
            }
            check_no_overlap(&logical)?;
        }

        Ok(())
    }
}

fn check_no_overlap(parts: &[&Partition]) -> Result<()> {
    for (i, a) in parts.iter().enumerate() {
        if let Some(b) = parts[i + 1..].iter().find(|b| a.region.overlaps(&b.region)) {
            return Err(invalid(format!(
                "{} {} overlaps {} {}",
                a.name, a.region, b.name, b.region
            )));
        }
    }
    Ok(())
}

fn invalid(message: String) -> ProposalError {
    ProposalError::InvalidDevicegraph(message)
}

/// The set of disks making up a (target) system layout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Devicegraph {
    #[serde(default)]
    pub disks: Vec<Disk>,
}

impl Devicegraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_disk(&mut self, disk: Disk) -> &mut Disk {
        self.disks.push(disk);
        let index = self.disks.len() - 1;
        &mut self.disks[index]
    }

    pub fn find_disk(&self, name: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.name == name)
    }

    pub fn disk(&self, name: &str) -> Result<&Disk> {
        self.find_disk(name)
            .ok_or_else(|| ProposalError::DeviceNotFound(name.to_string()))
    }

    pub fn disk_mut(&mut self, name: &str) -> Result<&mut Disk> {
        self.disks
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| ProposalError::DeviceNotFound(name.to_string()))
    }

    /// Disks whose names appear in `names`, in graph order
    pub fn disks_named<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = &'a Disk> + 'a {
        self.disks
            .iter()
            .filter(move |d| names.iter().any(|n| *n == d.name))
    }

    /// All partitions of all disks
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.disks
            .iter()
            .filter_map(|d| d.partition_table.as_ref())
            .flat_map(|pt| pt.partitions.iter())
    }

    pub fn find_partition(&self, name: &str) -> Option<&Partition> {
        self.partitions().find(|p| p.name == name)
    }

    /// Verify the structural consistency of the whole graph
    pub fn check(&self) -> Result<()> {
        let mut disk_names = HashSet::new();
        let mut partition_names = HashSet::new();
        for disk in &self.disks {
            if !disk_names.insert(disk.name.as_str()) {
                return Err(invalid(format!("duplicate disk {}", disk.name)));
            }
            disk.check(&mut partition_names)?;
        }
        Ok(())
    }
}

impl fmt::Display for Devicegraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for disk in &self.disks {
            writeln!(f, "{} {}", disk.name, disk.size())?;
            if let Some(ptable) = &disk.partition_table {
                for part in &ptable.partitions {
                    writeln!(f, "  {} {} {} {}", part.name, part.kind, part.region, part.size())?;
                }
            }
        }
        Ok(())
    }
}

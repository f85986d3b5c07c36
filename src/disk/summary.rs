//! Human-readable rendering of a devicegraph

use crate::disk::devicegraph::{Devicegraph, Disk, PartitionId};

/// Render the partition layout of one disk as a table
pub fn layout_summary(disk: &Disk) -> String {
    let mut out = String::new();
    let table = disk
        .partition_table
        .as_ref()
        .map(|pt| pt.kind.to_string())
        .unwrap_or_else(|| "none".to_string());

    out.push_str(&format!(
        "\n{} (total: {}, partition table: {}):\n",
        disk.name,
        disk.size(),
        table
    ));
    out.push_str(&format!(
        "{:<16} {:<9} {:>12} {:<14} {:<6} {:<20}\n",
        "DEVICE", "TYPE", "SIZE", "ID", "FS", "MOUNT"
    ));
    out.push_str(&format!("{}\n", "-".repeat(81)));

    let Some(ptable) = &disk.partition_table else {
        return out;
    };

    let mut partitions: Vec<_> = ptable.partitions.iter().collect();
    partitions.sort_by_key(|p| p.region.start);

    for part in partitions {
        let (fs, mount) = match &part.filesystem {
            Some(fs) => (
                fs.fs_type.to_string(),
                if fs.mount_points.is_empty() {
                    "-".to_string()
                } else {
                    fs.mount_points.join(",")
                },
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        let name = if part.boot {
            format!("{}*", part.name)
        } else {
            part.name.clone()
        };

        out.push_str(&format!(
            "{:<16} {:<9} {:>12} {:<14} {:<6} {:<20}\n",
            name,
            part.kind.to_string(),
            part.size().to_string(),
            id_column(part.id),
            fs,
            mount
        ));
    }

    for slot in disk.free_spaces() {
        out.push_str(&format!(
            "{:<16} {:<9} {:>12}\n",
            "(free)",
            if slot.inside_extended { "logical" } else { "" },
            slot.size().to_string()
        ));
    }

    out
}

/// MBR code and name of a partition id, e.g. `83 Linux`
fn id_column(id: PartitionId) -> String {
    match id.code() {
        code @ 0..=0xff => format!("{:02x} {}", code, id),
        _ => id.to_string(),
    }
}

/// Print layout summary for every disk in the graph
pub fn print_layout_summary(graph: &Devicegraph) {
    for disk in &graph.disks {
        print!("{}", layout_summary(disk));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::devicegraph::{FsType, PartitionType, PtableType};
    use crate::disk::region::Region;
    use crate::disk::size::DiskSize;

    #[test]
    fn summary_lists_partitions_and_mount_points() {
        let mut disk = Disk::with_size("/dev/sda", DiskSize::gib(1));
        let ptable = disk.create_partition_table(PtableType::Msdos);
        let part = ptable
            .create_partition("/dev/sda1", Region::new(2048, 204800, 512), PartitionType::Primary)
            .unwrap();
        part.boot = true;
        part.create_filesystem(FsType::Ext4).add_mount_point("/");

        let summary = layout_summary(&disk);
        assert!(summary.contains("/dev/sda1*"));
        assert!(summary.contains("100.00 MiB"));
        assert!(summary.contains("ext4"));
        assert!(summary.contains("83 Linux"));
        assert!(summary.contains("(free)"));
    }

    #[test]
    fn id_column_shows_mbr_code_when_there_is_one() {
        assert_eq!(id_column(PartitionId::Swap), "82 Linux swap");
        assert_eq!(id_column(PartitionId::Ntfs), "07 NTFS");
        assert_eq!(id_column(PartitionId::BiosBoot), "BIOS boot");
    }
}

//! Partition device naming

/// Number of the first logical partition (`/dev/sdx5`)
pub const FIRST_LOGICAL_PARTITION_NUMBER: u32 = 5;

/// Get the partition naming prefix for a device
/// e.g., /dev/sda -> /dev/sda, /dev/nvme0n1 -> /dev/nvme0n1p
pub fn partition_prefix(device: &str) -> String {
    if device.contains("nvme") || device.contains("mmcblk") || device.contains("loop") {
        format!("{}p", device)
    } else {
        device.to_string()
    }
}

/// Get partition path for a device and partition number
pub fn partition_path(device: &str, partition_num: u32) -> String {
    format!("{}{}", partition_prefix(device), partition_num)
}

/// Extract the partition number from a partition device name on `device`
pub fn partition_number(device: &str, partition_name: &str) -> Option<u32> {
    partition_name
        .strip_prefix(&partition_prefix(device))?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sata_disks_have_no_separator() {
        assert_eq!(partition_path("/dev/sda", 1), "/dev/sda1");
        assert_eq!(partition_path("/dev/vdb", 5), "/dev/vdb5");
    }

    #[test]
    fn nvme_and_mmc_disks_use_p_separator() {
        assert_eq!(partition_path("/dev/nvme0n1", 2), "/dev/nvme0n1p2");
        assert_eq!(partition_path("/dev/mmcblk0", 1), "/dev/mmcblk0p1");
    }

    #[test]
    fn number_round_trips_through_name() {
        assert_eq!(partition_number("/dev/sda", "/dev/sda12"), Some(12));
        assert_eq!(partition_number("/dev/nvme0n1", "/dev/nvme0n1p3"), Some(3));
        assert_eq!(partition_number("/dev/sda", "/dev/sdb1"), None);
    }
}

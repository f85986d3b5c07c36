//! Proposal settings

use crate::disk::size::DiskSize;
use crate::utils::error::{ProposalError, Result};
use serde::{Deserialize, Serialize};

/// Settings controlling where and how partitions are proposed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposalSettings {
    /// Disks the proposal may use (e.g., ["/dev/sda"])
    pub candidate_devices: Vec<String>,
    /// Free space slots smaller than this are ignored
    #[serde(default = "default_useful_free_space_min_size")]
    pub useful_free_space_min_size: DiskSize,
    /// Place volumes that can live on LVM into logical volumes
    #[serde(default)]
    pub use_lvm: bool,
}

// Default value functions

fn default_useful_free_space_min_size() -> DiskSize {
    DiskSize::mib(30)
}

impl Default for ProposalSettings {
    fn default() -> Self {
        ProposalSettings {
            candidate_devices: Vec::new(),
            useful_free_space_min_size: default_useful_free_space_min_size(),
            use_lvm: false,
        }
    }
}

impl ProposalSettings {
    /// Load settings from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: ProposalSettings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Generate sample settings
    pub fn sample() -> Self {
        ProposalSettings {
            candidate_devices: vec!["/dev/sda".to_string()],
            ..Default::default()
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.candidate_devices.is_empty() {
            return Err(ProposalError::ValidationError(
                "At least one candidate device is required".to_string(),
            ));
        }
        if self.candidate_devices.iter().any(|d| d.trim().is_empty()) {
            return Err(ProposalError::ValidationError(
                "Candidate device names cannot be empty".to_string(),
            ));
        }
        if self.useful_free_space_min_size.is_unlimited() {
            return Err(ProposalError::ValidationError(
                "Useful free space minimum cannot be unlimited".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let settings: ProposalSettings =
            toml::from_str(r#"candidate_devices = ["/dev/sda", "/dev/sdb"]"#).unwrap();
        assert_eq!(settings.candidate_devices.len(), 2);
        assert_eq!(settings.useful_free_space_min_size, DiskSize::mib(30));
        assert!(!settings.use_lvm);
    }

    #[test]
    fn human_sizes_are_accepted() {
        let settings: ProposalSettings = toml::from_str(
            r#"
            candidate_devices = ["/dev/vda"]
            useful_free_space_min_size = "1 GiB"
            use_lvm = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.useful_free_space_min_size, DiskSize::gib(1));
        assert!(settings.use_lvm);
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("partplan-{}.toml", uuid::Uuid::new_v4()));
        let content = r#"
            candidate_devices = ["/dev/nvme0n1"]
            use_lvm = true
        "#;
        std::fs::write(&path, content).unwrap();

        let settings = ProposalSettings::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.candidate_devices, vec!["/dev/nvme0n1".to_string()]);
        assert!(settings.use_lvm);
        assert_eq!(settings.useful_free_space_min_size, DiskSize::mib(30));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ProposalSettings::from_file("/nonexistent/partplan/settings.toml").unwrap_err();
        assert!(matches!(err, ProposalError::Io(_)));
    }

    #[test]
    fn sample_is_valid() {
        assert!(ProposalSettings::sample().validate().is_ok());
    }

    #[test]
    fn empty_candidate_list_is_rejected() {
        let settings = ProposalSettings::default();
        assert!(matches!(
            settings.validate(),
            Err(ProposalError::ValidationError(_))
        ));

        let settings = ProposalSettings {
            candidate_devices: vec![" ".to_string()],
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}

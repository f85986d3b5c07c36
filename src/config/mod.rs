//! Configuration: proposal settings and scenario files

pub mod scenario;
pub mod settings;

pub use scenario::Scenario;
pub use settings::ProposalSettings;

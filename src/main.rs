//! partplan - Partition proposal tool
//!
//! Computes a partition layout for a set of planned volumes from the free
//! space described in a scenario file.

use anyhow::Result;
use clap::{Parser, Subcommand};
use partplan::disk::summary::print_layout_summary;
use partplan::{PartitionCreator, ProposalSettings, Scenario, TargetSize};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "partplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose partitions for the volumes of a scenario
    Plan {
        /// Path to scenario file
        scenario: String,

        /// Override the scenario's target size
        #[arg(short, long, value_enum)]
        target: Option<TargetSize>,

        /// Override the scenario's settings with a settings file
        #[arg(short, long)]
        settings: Option<String>,

        /// Print the resulting devicegraph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a scenario file
    Validate {
        /// Path to scenario file
        scenario: String,
    },

    /// Generate a sample scenario file
    GenerateScenario {
        /// Output path for scenario file
        #[arg(short, long, default_value = "partplan.toml")]
        output: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Plan {
            scenario,
            target,
            settings,
            json,
        } => {
            cmd_plan(&scenario, target, settings.as_deref(), json)?;
        }
        Commands::Validate { scenario } => {
            cmd_validate(&scenario)?;
        }
        Commands::GenerateScenario { output } => {
            cmd_generate_scenario(&output)?;
        }
    }

    Ok(())
}

fn cmd_plan(
    path: &str,
    target: Option<TargetSize>,
    settings: Option<&str>,
    json: bool,
) -> Result<()> {
    info!("Loading scenario from {}", path);
    let mut scenario = Scenario::from_file(path)?;
    if let Some(settings_path) = settings {
        info!("Loading settings from {}", settings_path);
        scenario.settings = ProposalSettings::from_file(settings_path)?;
    }
    scenario.validate()?;

    let target = target.unwrap_or(scenario.target_size);
    let creator = PartitionCreator::new(&scenario.devicegraph, scenario.settings.clone());
    let devicegraph = creator.create_partitions(&scenario.volumes, target)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devicegraph)?);
    } else {
        print_layout_summary(&devicegraph);
    }

    Ok(())
}

fn cmd_validate(path: &str) -> Result<()> {
    let scenario = Scenario::from_file(path)?;
    scenario.validate()?;
    println!("✓ Scenario is valid");
    Ok(())
}

fn cmd_generate_scenario(output: &str) -> Result<()> {
    let sample = Scenario::sample();
    std::fs::write(output, sample.to_toml()?)?;
    println!("✓ Sample scenario written to {}", output);
    Ok(())
}

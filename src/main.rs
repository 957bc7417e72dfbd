//! Command-line entry point: reads a CA configuration and issues the
//! hierarchy it describes.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use keyweaver::config::{CaConfig, DEFAULT_CONFIG_PATH};
use keyweaver::hierarchy::create_cas;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keyweaver", version)]
#[command(about = "Bootstrap root and intermediate certificate authorities", long_about = None)]
struct Cli {
    /// Log every step and written file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Certificate authority operations
    #[command(arg_required_else_help = true)]
    Ca {
        #[command(subcommand)]
        command: CaCommands,
    },
}

#[derive(Subcommand)]
enum CaCommands {
    /// Create every CA described in the configuration file
    Init {
        /// Configuration file (YAML, JSON or TOML)
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ca {
            command: CaCommands::Init { config },
        } => init(config),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn init(config_path: PathBuf) -> anyhow::Result<()> {
    let config = CaConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(
        config = %config_path.display(),
        output_dir = %config.output_dir.display(),
        roots = config.cas.len(),
        "creating CA hierarchy"
    );

    let report = create_cas(&config)?;
    for failure in &report.failures {
        error!("{failure}");
    }
    if !report.is_success() {
        bail!(
            "{} of {} root CA(s) failed",
            report.failures.len(),
            config.cas.len()
        );
    }

    info!(issued = report.issued.len(), "CA hierarchy created");
    Ok(())
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "MDCM Developers",
    version,
    about = "MDCM CLI - Run potential energy surface scans and fit minimal distributed charge models to their electrostatic potentials.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run (or resume) a potential energy surface scan with a QM program.
    Scan(ScanArgs),
    /// Fit a distributed charge model to reference ESP cube files.
    Fit(FitArgs),
    /// Print every scan configuration option with its description.
    Doc,
}

/// Arguments for the `scan` subcommand.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Path to the scan configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Write the QM input files of every scan point and stop.
    #[arg(long)]
    pub prepare_only: bool,

    /// Recompute points that already finished, overriding the config file.
    #[arg(long)]
    pub overwrite: bool,

    /// Override the maximum number of concurrently running QM jobs.
    #[arg(short = 'n', long, value_name = "INT")]
    pub parallel_tasks: Option<usize>,

    /// Override the working directory for job files and scan state.
    #[arg(short, long, value_name = "PATH")]
    pub working_directory: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S cpus-per-task=8
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `fit` subcommand.
#[derive(Args, Debug)]
pub struct FitArgs {
    /// Path to a fit configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Reference ESP cube files, one per geometry.
    #[arg(long = "esp", value_name = "PATH", num_args(1..))]
    pub esp_files: Vec<PathBuf>,

    /// Reference density cube files, paired with the ESP files by position.
    #[arg(long = "dens", value_name = "PATH", num_args(1..))]
    pub density_files: Vec<PathBuf>,

    /// Take the cube pairs from the finished points of a scan.
    /// Expects the configuration file persisted in the scan working directory.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["esp_files", "density_files"])]
    pub scan_config: Option<PathBuf>,

    /// Local charge model file (.dcm).
    #[arg(short, long = "local", value_name = "PATH")]
    pub local_model: Option<PathBuf>,

    /// Replication model file (.toml) mapping local sites onto the molecule.
    #[arg(short, long = "replication", value_name = "PATH")]
    pub replication_model: Option<PathBuf>,

    /// Total charge the fitted model must carry.
    #[arg(short, long, value_name = "FLOAT", allow_hyphen_values = true)]
    pub total_charge: Option<f64>,

    /// Per-file weights for the reported weighted RMSE.
    #[arg(long, value_name = "FLOAT", num_args(1..), value_delimiter = ',')]
    pub weights: Vec<f64>,

    /// Override the optimizer convergence tolerance.
    #[arg(long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Override the maximum number of optimizer iterations.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Write the fitted local model to this path.
    #[arg(long, value_name = "PATH")]
    pub output_local: Option<PathBuf>,

    /// Write the fitted model, instantiated at the reference geometry, to this path.
    #[arg(long, value_name = "PATH")]
    pub output_global: Option<PathBuf>,

    /// Write the model ESP next to every reference cube file.
    #[arg(long)]
    pub write_cubes: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimizer.tolerance=1e-6
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

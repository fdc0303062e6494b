use crate::cli::FitArgs;
use crate::config::build_fit_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use mdcm::engine::config::ScanConfig;
use mdcm::engine::error::EngineError;
use mdcm::engine::progress::ProgressReporter;
use mdcm::workflows::{fit, scan::Scan};
use std::path::{Path, PathBuf};
use tracing::info;

pub async fn run(args: FitArgs) -> Result<()> {
    info!("Merging fit configuration...");
    let mut app_config = build_fit_config(&args)?;

    if let Some(scan_config) = &app_config.scan_config {
        let (esp_files, density_files) =
            tokio::task::block_in_place(|| cubes_from_scan(scan_config))?;
        println!(
            "Using {} cube pair(s) from scan {}",
            esp_files.len(),
            scan_config.display()
        );
        app_config.core_config.esp_files = esp_files;
        app_config.core_config.density_files = density_files;
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Fitting charge model to {} reference cube(s)...",
        app_config.core_config.esp_files.len()
    );
    let report =
        tokio::task::block_in_place(|| fit::run(&app_config.core_config, &reporter))?;

    println!("Initial RMSE: {:.6} kcal/(mol e)", report.initial_rmse);
    println!("Final RMSE:   {:.6} kcal/(mol e)", report.final_rmse);
    if let Some(weighted) = report.weighted_rmse {
        println!("Weighted RMSE: {:.6} kcal/(mol e)", weighted);
    }
    for (path, rmse) in app_config
        .core_config
        .esp_files
        .iter()
        .zip(&report.final_rmse_each)
    {
        println!("  {:<50} {:.6}", path.display(), rmse);
    }
    println!(
        "Optimizer: {} after {} iteration(s), {} evaluation(s)",
        report.optimization.message,
        report.optimization.iterations,
        report.optimization.evaluations
    );
    if let Some(path) = &app_config.core_config.output_local {
        println!("✓ Local model written to: {}", path.display());
    }
    if let Some(path) = &app_config.core_config.output_global {
        println!("✓ Global model written to: {}", path.display());
    }
    for path in &report.fitted_cubes {
        println!("  Model ESP written to: {}", path.display());
    }

    Ok(())
}

/// Cube pairs of every finished point of the scan persisted at `path`.
fn cubes_from_scan(path: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut config = ScanConfig::from_file(path).map_err(EngineError::from)?;
    config.overwrite = false;
    let mut scan = Scan::initialize(config)?;
    let pairs = scan.evaluate()?.cube_pairs();
    if pairs.is_empty() {
        return Err(CliError::Config(format!(
            "Scan {} has no finished points with cube files",
            path.display()
        )));
    }
    Ok(pairs.into_iter().unzip())
}

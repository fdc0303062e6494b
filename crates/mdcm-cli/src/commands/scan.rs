use crate::cli::ScanArgs;
use crate::config::build_scan_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use mdcm::engine::progress::ProgressReporter;
use mdcm::workflows::scan::Scan;
use tracing::{info, warn};

pub async fn run(args: ScanArgs) -> Result<()> {
    info!("Merging scan configuration from {:?} and CLI arguments...", &args.config);
    let app_config = build_scan_config(&args)?;

    let mut scan = tokio::task::block_in_place(|| Scan::initialize(app_config.core_config))?;
    println!(
        "Scan '{}': {} point(s) over {} coordinate(s), working directory {}",
        scan.config().label,
        scan.store().len(),
        scan.config().dofs.len(),
        scan.config().working_directory.display()
    );

    if app_config.prepare_only {
        let files = scan.prepare_files()?;
        println!("Wrote {} QM input file(s).", files.len());
        return Ok(());
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the scan workflow...");
    let summary = tokio::task::block_in_place(|| scan.execute(&reporter))?;
    info!(
        submitted = summary.submitted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Scan workflow finished."
    );

    let energies = scan.energies();
    println!("{:>6}  {:<40}  {:>20}", "step", "coordinates", "energy (Hartree)");
    for (point, energy) in scan.store().points().iter().zip(&energies) {
        let values = point
            .dof_values
            .iter()
            .map(|v| format!("{:.4}", v))
            .collect::<Vec<_>>()
            .join(", ");
        let energy = energy
            .map(|e| format!("{:.8}", e))
            .unwrap_or_else(|| "failed".to_string());
        println!("{:>6}  {:<40}  {:>20}", point.index, values, energy);
    }

    match scan.lowest_energy_index() {
        Some(index) => println!("✓ Lowest energy at step {}.", index),
        None => {
            warn!("No scan point finished successfully.");
            println!("Warning: no scan point finished successfully.");
        }
    }
    let failed = progress_handler.failed_points();
    if !failed.is_empty() {
        println!(
            "{} point(s) failed in this run ({:?}); run the scan again to retry them.",
            failed.len(),
            failed
        );
    }
    println!("Energies written to: {}", scan.summary_path().display());

    Ok(())
}

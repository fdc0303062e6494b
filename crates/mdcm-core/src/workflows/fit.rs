use crate::engine::progress::{Progress, ProgressReporter};
use crate::fitting::dataset::MaskConfig;
use crate::fitting::error::FitError;
use crate::fitting::optimizer::{ConstrainedOptimizer, OptimizationResult, OptimizerConfig};
use crate::fitting::session::FittingSession;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Inputs and outputs of one charge-model fit.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub esp_files: Vec<PathBuf>,
    pub density_files: Vec<PathBuf>,
    pub local_model: PathBuf,
    pub replication_model: PathBuf,
    pub total_charge: f64,
    /// Optional per-file weights for the reported weighted RMSE.
    pub weights: Option<Vec<f64>>,
    pub mask: MaskConfig,
    pub optimizer: OptimizerConfig,
    pub output_local: Option<PathBuf>,
    pub output_global: Option<PathBuf>,
    pub write_cubes: bool,
}

#[derive(Debug, Clone)]
pub struct FitReport {
    pub initial_rmse: f64,
    pub final_rmse: f64,
    pub final_rmse_each: Vec<f64>,
    pub weighted_rmse: Option<f64>,
    pub optimization: OptimizationResult,
    pub fitted_cubes: Vec<PathBuf>,
}

#[instrument(skip_all, name = "fit_workflow")]
pub fn run(config: &FitConfig, reporter: &ProgressReporter) -> Result<FitReport, FitError> {
    reporter.report(Progress::PhaseStart { name: "Loading" });
    info!("Loading reference cubes and charge model.");
    let mut session = FittingSession::with_mask(config.mask);
    session.load_cube_files(&config.esp_files, &config.density_files)?;
    session.load_local_model(&config.local_model)?;
    session.load_replication_model(&config.replication_model)?;
    if let Some(weights) = &config.weights {
        if weights.len() != config.esp_files.len() {
            return Err(FitError::Dimension(format!(
                "{} weights for {} cube files",
                weights.len(),
                config.esp_files.len()
            )));
        }
    }
    let initial_rmse = session.rmse()?;
    info!(rmse = initial_rmse, "Initial RMSE in kcal/(mol e).");
    reporter.report(Progress::PhaseFinish);

    let optimizer = ConstrainedOptimizer::new(config.optimizer.clone(), config.total_charge);
    let optimization = session.optimize(&optimizer, reporter)?;
    if !optimization.converged {
        reporter.message(format!("Optimizer did not converge: {}", optimization.message));
    }

    reporter.report(Progress::PhaseStart { name: "Output" });
    let final_rmse = session.rmse()?;
    let final_rmse_each = session.rmse_each()?;
    let weighted_rmse = config
        .weights
        .as_ref()
        .map(|w| session.rmse_weighted(w))
        .transpose()?;
    if let Some(path) = &config.output_local {
        session.write_local_model(path)?;
        info!("Wrote fitted local model to {}.", path.display());
    }
    if let Some(path) = &config.output_global {
        session.write_global_model(path)?;
        info!("Wrote fitted global model to {}.", path.display());
    }
    let fitted_cubes = if config.write_cubes {
        session.write_fitted_cube_files()?
    } else {
        Vec::new()
    };
    session.release_all_resources();
    reporter.report(Progress::PhaseFinish);

    info!(
        initial = initial_rmse,
        final_rmse,
        converged = optimization.converged,
        "Charge model fit finished."
    );
    Ok(FitReport {
        initial_rmse,
        final_rmse,
        final_rmse_each,
        weighted_rmse,
        optimization,
        fitted_cubes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::dcm::LocalModelFile;
    use crate::core::io::traits::FormatFile;
    use crate::core::models::charge::{ChargeSite, FrameDefinition, ReplicationDefinition};
    use crate::fitting::dataset::tests::write_pair;
    use tempfile::tempdir;

    fn fit_config(dir: &std::path::Path) -> FitConfig {
        let (esp, dens) = write_pair(
            dir,
            "gaussian_0_scn",
            (0..64).map(|i| -0.02 + 4e-4 * i as f64).collect(),
        );
        let local = dir.join("local.dcm");
        LocalModelFile::write_to_path(
            &vec![
                ChargeSite::new(0.0, 0.0, 0.1, -0.7),
                ChargeSite::new(0.0, 0.1, 0.0, -0.3),
            ],
            &vec![],
            &local,
        )
        .unwrap();
        let replication = dir.join("replication.toml");
        ReplicationDefinition::identity(FrameDefinition { atoms: [0, 1, 2] }, 2)
            .save(&replication)
            .unwrap();
        FitConfig {
            esp_files: vec![esp],
            density_files: vec![dens],
            local_model: local,
            replication_model: replication,
            total_charge: -1.0,
            weights: Some(vec![1.0]),
            mask: MaskConfig::default(),
            optimizer: OptimizerConfig {
                max_iterations: Some(40),
                ..OptimizerConfig::default()
            },
            output_local: Some(dir.join("fitted.dcm")),
            output_global: Some(dir.join("fitted.xyz")),
            write_cubes: true,
        }
    }

    #[test]
    fn fit_writes_outputs_and_reports_residuals() {
        let dir = tempdir().unwrap();
        let config = fit_config(dir.path());
        let report = run(&config, &ProgressReporter::new()).unwrap();
        assert_eq!(report.final_rmse_each.len(), 1);
        assert_eq!(report.weighted_rmse, Some(report.final_rmse));
        assert!(report.final_rmse <= report.initial_rmse);
        assert!(dir.path().join("fitted.dcm").is_file());
        assert!(dir.path().join("fitted.xyz").is_file());
        assert_eq!(report.fitted_cubes.len(), 1);
    }

    #[test]
    fn mismatched_weights_fail_before_optimizing() {
        let dir = tempdir().unwrap();
        let mut config = fit_config(dir.path());
        config.weights = Some(vec![1.0, 2.0]);
        assert!(matches!(
            run(&config, &ProgressReporter::new()),
            Err(FitError::Dimension(_))
        ));
    }
}

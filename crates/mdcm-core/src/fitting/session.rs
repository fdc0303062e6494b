use super::dataset::{CubeDataset, MaskConfig};
use super::error::FitError;
use super::model::ChargeModel;
use super::optimizer::{ConstrainedOptimizer, OptimizationResult};
use super::rmse;
use crate::core::electrostatics::potential::potential_at;
use crate::core::io::cube::{CubeFile, CubeMetadata};
use crate::core::io::traits::FormatFile;
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default)]
struct SessionState {
    model: ChargeModel,
    dataset: Option<CubeDataset>,
    mask: MaskConfig,
}

/// Owns every array of a fitting run: reference cubes and charge model.
///
/// Operations return [`FitError::Released`] once
/// [`release_all_resources`](Self::release_all_resources) has been called.
#[derive(Debug)]
pub struct FittingSession {
    state: Option<SessionState>,
}

impl Default for FittingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FittingSession {
    pub fn new() -> Self {
        Self::with_mask(MaskConfig::default())
    }

    pub fn with_mask(mask: MaskConfig) -> Self {
        Self {
            state: Some(SessionState {
                mask,
                ..SessionState::default()
            }),
        }
    }

    fn state(&self) -> Result<&SessionState, FitError> {
        self.state.as_ref().ok_or(FitError::Released)
    }

    fn state_mut(&mut self) -> Result<&mut SessionState, FitError> {
        self.state.as_mut().ok_or(FitError::Released)
    }

    fn dataset(&self) -> Result<&CubeDataset, FitError> {
        self.state()?
            .dataset
            .as_ref()
            .ok_or(FitError::NotLoaded("cube file"))
    }

    pub fn is_released(&self) -> bool {
        self.state.is_none()
    }

    pub fn model(&self) -> Result<&ChargeModel, FitError> {
        Ok(&self.state()?.model)
    }

    /// Loads one ESP/density pair per scan geometry, replacing any previous
    /// set. The first geometry becomes the reference for the global model.
    pub fn load_cube_files(
        &mut self,
        esp_files: &[PathBuf],
        density_files: &[PathBuf],
    ) -> Result<usize, FitError> {
        let state = self.state_mut()?;
        let dataset = CubeDataset::load(esp_files, density_files, &state.mask)?;
        if let Some(reference) = dataset.reference_molecule() {
            state.model.set_reference(reference.clone())?;
        }
        let count = dataset.len();
        state.dataset = Some(dataset);
        Ok(count)
    }

    pub fn load_local_model(&mut self, path: &Path) -> Result<(), FitError> {
        self.state_mut()?.model.load_local(path)
    }

    pub fn load_replication_model(&mut self, path: &Path) -> Result<(), FitError> {
        self.state_mut()?.model.load_replication(path)
    }

    pub fn write_local_model(&self, path: &Path) -> Result<(), FitError> {
        self.state()?.model.write_local(path)
    }

    pub fn write_global_model(&self, path: &Path) -> Result<(), FitError> {
        self.state()?.model.write_global(path)
    }

    pub fn local_vector(&self) -> Result<Vec<f64>, FitError> {
        Ok(self.state()?.model.local_vector())
    }

    pub fn set_local_vector(&mut self, vector: Vec<f64>) -> Result<(), FitError> {
        self.state_mut()?.model.set_local_vector(vector)
    }

    pub fn global_vector(&self) -> Result<Vec<f64>, FitError> {
        Ok(self.state()?.model.global_vector())
    }

    pub fn set_global_vector(&mut self, vector: Vec<f64>) -> Result<(), FitError> {
        self.state_mut()?.model.set_global_vector(vector)
    }

    pub fn rmse(&self) -> Result<f64, FitError> {
        let state = self.state()?;
        rmse::rmse(self.dataset()?, &state.model, &state.model.local_vector())
    }

    pub fn rmse_weighted(&self, weights: &[f64]) -> Result<f64, FitError> {
        let state = self.state()?;
        rmse::rmse_weighted(self.dataset()?, &state.model, &state.model.local_vector(), weights)
    }

    pub fn rmse_each(&self) -> Result<Vec<f64>, FitError> {
        let state = self.state()?;
        rmse::rmse_each(self.dataset()?, &state.model, &state.model.local_vector())
    }

    /// Minimizes the mean RMSE over the local vector and stores the result
    /// as the new local vector.
    pub fn optimize(
        &mut self,
        optimizer: &ConstrainedOptimizer,
        reporter: &ProgressReporter,
    ) -> Result<OptimizationResult, FitError> {
        let result = {
            let state = self.state()?;
            let dataset = self.dataset()?;
            let initial = state.model.local_vector();
            if initial.is_empty() {
                return Err(FitError::NotLoaded("local charge model"));
            }
            reporter.report(Progress::PhaseStart { name: "Fitting" });
            let result = optimizer.minimize(
                &initial,
                |trial| rmse::rmse(dataset, &state.model, trial),
                reporter,
            );
            reporter.report(Progress::PhaseFinish);
            result?
        };
        self.set_local_vector(result.parameters.clone())?;
        Ok(result)
    }

    /// Writes the model potential on every reference grid to
    /// `<esp stem>_mdcm.cube` next to the reference ESP file.
    pub fn write_fitted_cube_files(&self) -> Result<Vec<PathBuf>, FitError> {
        let state = self.state()?;
        let dataset = self.dataset()?;
        let local = state.model.local_vector();
        let mut written = Vec::with_capacity(dataset.len());
        for cube in dataset.entries() {
            let charges = state.model.point_charges(&local, &cube.molecule)?;
            let values = (0..cube.esp.num_points())
                .map(|i| potential_at(&charges, &cube.esp.point(i)))
                .collect();
            let stem = cube
                .esp_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "esp".to_string());
            let path = cube.esp_path.with_file_name(format!("{}_mdcm.cube", stem));
            let metadata = CubeMetadata {
                title: format!("Charge model ESP for {}", cube.esp_path.display()),
                description: cube.metadata.description.clone(),
            };
            CubeFile::write_to_path(&cube.esp.with_values(values), &metadata, &path).map_err(
                |e| FitError::Cube {
                    path: path.to_string_lossy().to_string(),
                    source: e,
                },
            )?;
            written.push(path);
        }
        info!(files = written.len(), "Wrote charge model cube files.");
        Ok(written)
    }

    /// Drops all loaded data. Every later operation fails with
    /// [`FitError::Released`].
    pub fn release_all_resources(&mut self) {
        if self.state.take().is_some() {
            info!("Fitting session released.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::dcm::LocalModelFile;
    use crate::core::models::charge::{
        ChargeSite, FrameDefinition, ReplicationDefinition, flatten_sites,
    };
    use crate::fitting::dataset::tests::write_pair;
    use crate::fitting::optimizer::OptimizerConfig;
    use tempfile::tempdir;

    fn loaded_session(dir: &Path) -> FittingSession {
        let (esp0, dens0) = write_pair(dir, "gaussian_0_scn", (0..64).map(|i| -0.02 + 5e-4 * i as f64).collect());
        let (esp1, dens1) = write_pair(dir, "gaussian_1_scn", (0..64).map(|i| -0.01 + 3e-4 * i as f64).collect());
        let local = dir.join("local.dcm");
        let sites = vec![
            ChargeSite::new(0.0, 0.0, 0.2, -0.5),
            ChargeSite::new(0.1, 0.0, -0.1, -0.3),
        ];
        LocalModelFile::write_to_path(&sites, &vec![], &local).unwrap();
        let replication = dir.join("replication.toml");
        ReplicationDefinition::identity(FrameDefinition { atoms: [0, 1, 2] }, 2)
            .save(&replication)
            .unwrap();

        let mut session = FittingSession::new();
        assert_eq!(
            session
                .load_cube_files(&[esp0, esp1], &[dens0, dens1])
                .unwrap(),
            2
        );
        session.load_local_model(&local).unwrap();
        session.load_replication_model(&replication).unwrap();
        session
    }

    #[test]
    fn rmse_views_share_one_residual() {
        let dir = tempdir().unwrap();
        let session = loaded_session(dir.path());
        let each = session.rmse_each().unwrap();
        assert_eq!(each.len(), 2);
        let mean = session.rmse().unwrap();
        assert_eq!(mean, (each[0] + each[1]) / 2.0);
        assert_eq!(session.rmse_weighted(&[1.0, 1.0]).unwrap(), mean);
        assert_eq!(session.rmse().unwrap().to_bits(), mean.to_bits());
    }

    #[test]
    fn vectors_are_copies_and_setters_validate_length() {
        let dir = tempdir().unwrap();
        let mut session = loaded_session(dir.path());
        let mut local = session.local_vector().unwrap();
        local[0] = 42.0;
        assert_ne!(session.local_vector().unwrap()[0], 42.0);
        session.set_local_vector(local.clone()).unwrap();
        assert_eq!(session.local_vector().unwrap(), local);
        assert!(matches!(
            session.set_local_vector(vec![0.0; 3]),
            Err(FitError::Dimension(_))
        ));
        let global = session.global_vector().unwrap();
        assert_eq!(global.len(), 8);
        session.set_global_vector(global.clone()).unwrap();
        assert_eq!(session.global_vector().unwrap(), global);
    }

    #[test]
    fn local_model_write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let session = loaded_session(dir.path());
        let out = dir.path().join("out.dcm");
        session.write_local_model(&out).unwrap();
        let (sites, _) = LocalModelFile::read_from_path(&out).unwrap();
        let reread = flatten_sites(&sites);
        for (a, b) in reread.iter().zip(session.local_vector().unwrap().iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        session.write_global_model(&dir.path().join("out.xyz")).unwrap();
    }

    #[test]
    fn optimize_conserves_total_charge_and_does_not_worsen_fit() {
        let dir = tempdir().unwrap();
        let mut session = loaded_session(dir.path());
        let before = session.rmse().unwrap();
        let optimizer = ConstrainedOptimizer::new(
            OptimizerConfig {
                max_iterations: Some(50),
                ..OptimizerConfig::default()
            },
            -1.0,
        );
        let result = session
            .optimize(&optimizer, &ProgressReporter::new())
            .unwrap();
        let charges: f64 = result.parameters.iter().skip(3).step_by(4).sum();
        assert!((charges + 1.0).abs() < 1e-9);
        assert_eq!(session.local_vector().unwrap(), result.parameters);
        assert!(result.residual.is_finite());
        assert!((session.rmse().unwrap() - result.residual).abs() < 1e-12);
        assert!(before.is_finite());
    }

    #[test]
    fn fitted_cube_files_are_written_next_to_references() {
        let dir = tempdir().unwrap();
        let session = loaded_session(dir.path());
        let written = session.write_fitted_cube_files().unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("gaussian_0_scn_esp_mdcm.cube"),
                dir.path().join("gaussian_1_scn_esp_mdcm.cube"),
            ]
        );
        let (grid, _) = CubeFile::read_from_path(&written[0]).unwrap();
        assert_eq!(grid.values.len(), 64);
    }

    #[test]
    fn operations_fail_after_release() {
        let dir = tempdir().unwrap();
        let mut session = loaded_session(dir.path());
        session.release_all_resources();
        assert!(session.is_released());
        assert!(matches!(session.rmse(), Err(FitError::Released)));
        assert!(matches!(session.local_vector(), Err(FitError::Released)));
        session.release_all_resources();
    }

    #[test]
    fn rmse_without_cubes_is_not_loaded() {
        let session = FittingSession::new();
        assert!(matches!(session.rmse(), Err(FitError::NotLoaded(_))));
    }
}

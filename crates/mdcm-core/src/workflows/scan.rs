use crate::core::io::traits::FormatFile;
use crate::core::io::xyz::XyzFile;
use crate::engine::backend::{ProcessBackend, QmBackend};
use crate::engine::config::{GeometryFormat, ScanConfig, documentation};
use crate::engine::error::EngineError;
use crate::engine::evaluator::{self, ScanEvaluation};
use crate::engine::grid;
use crate::engine::job::{self, JobDescriptor};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::scheduler::{ExecutionSummary, TaskScheduler};
use crate::engine::store::ScanResultStore;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// A PES scan: enumerated points, their job files and their results.
///
/// Initialization validates the configuration, reads the input geometry,
/// enumerates the scan points and persists the configuration. A state file
/// left by an earlier run over the same scan is picked up unless the scan
/// is configured to overwrite.
pub struct Scan<B: QmBackend = ProcessBackend> {
    config: ScanConfig,
    store: ScanResultStore,
    backend: B,
}

impl Scan<ProcessBackend> {
    pub fn initialize(config: ScanConfig) -> Result<Self, EngineError> {
        Self::with_backend(config, ProcessBackend::new())
    }

    pub fn from_config_file(path: &Path) -> Result<Self, EngineError> {
        Self::initialize(ScanConfig::from_file(path)?)
    }

    /// Prints every configuration option with its description.
    pub fn print_documentation() {
        print!("{}", documentation());
    }
}

impl<B: QmBackend> Scan<B> {
    #[instrument(skip_all, name = "scan_initialize")]
    pub fn with_backend(config: ScanConfig, backend: B) -> Result<Self, EngineError> {
        config.validate()?;
        let molecule = match config.geometry_format {
            GeometryFormat::Xyz => {
                XyzFile::read_from_path(&config.geometry_file)
                    .map_err(|e| EngineError::Geometry {
                        path: config.geometry_file.to_string_lossy().to_string(),
                        source: e,
                    })?
                    .0
            }
        };
        let points = grid::enumerate(&config, &molecule)?;
        info!(
            label = %config.label,
            atoms = molecule.len(),
            points = points.len(),
            "Scan initialized."
        );

        let workdir = &config.working_directory;
        std::fs::create_dir_all(workdir).map_err(|e| EngineError::Io {
            path: workdir.to_string_lossy().to_string(),
            source: e,
        })?;
        config.to_file(&workdir.join(config.persisted_file_name()))?;

        let mut scan = Self {
            store: ScanResultStore::new(points),
            config,
            backend,
        };
        let state_path = scan.state_path();
        if state_path.is_file() && !scan.config.overwrite {
            scan.store.restore(&state_path)?;
        }
        Ok(scan)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn store(&self) -> &ScanResultStore {
        &self.store
    }

    pub fn state_path(&self) -> PathBuf {
        self.config
            .working_directory
            .join(format!("{}_scan_state.toml", self.config.label))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.config
            .working_directory
            .join(format!("{}_scan_energies.csv", self.config.label))
    }

    /// Writes the input files of every point without running anything.
    pub fn prepare_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        let mut written = Vec::with_capacity(self.store.len());
        for job in job::build_all(self.store.points(), &self.config) {
            job.write_files().map_err(|e| EngineError::JobFiles {
                index: job.index,
                source: e,
            })?;
            written.push(job.input_path());
        }
        info!(files = written.len(), "Prepared job input files.");
        Ok(written)
    }

    /// Runs every point that still needs a result, then evaluates the scan.
    ///
    /// Individual job failures are recorded on their points and never
    /// returned as errors.
    #[instrument(skip_all, name = "scan_execute")]
    pub fn execute(&mut self, reporter: &ProgressReporter) -> Result<ExecutionSummary, EngineError> {
        reporter.report(Progress::PhaseStart {
            name: "Preparation",
        });
        self.prepare_files()?;
        let queue = self.store.schedule(self.config.overwrite);
        let jobs: Vec<JobDescriptor> = job::build_all(
            queue.iter().filter_map(|&index| self.store.get(index)),
            &self.config,
        );
        info!(
            scheduled = jobs.len(),
            skipped = self.store.len() - jobs.len(),
            "Scheduled scan points."
        );
        reporter.report(Progress::PhaseFinish);

        reporter.report(Progress::PhaseStart { name: "QM Jobs" });
        let state_path = self.state_path();
        let summary = TaskScheduler::from_config(&mut self.backend, &self.config).run(
            jobs,
            &mut self.store,
            &state_path,
            reporter,
        )?;
        reporter.report(Progress::PhaseFinish);

        self.evaluate()?;
        Ok(summary)
    }

    /// Checks artifacts, persists the state and writes the CSV summary.
    pub fn evaluate(&mut self) -> Result<ScanEvaluation, EngineError> {
        let evaluation = evaluator::evaluate(&mut self.store);
        self.store.save(&self.state_path())?;
        evaluator::write_summary(&self.store, &self.config.dofs, &self.summary_path())?;
        Ok(evaluation)
    }

    pub fn energies(&self) -> Vec<Option<f64>> {
        evaluator::collect(&self.store).energies
    }

    pub fn esp_cube_paths(&self) -> Vec<Option<PathBuf>> {
        evaluator::collect(&self.store).esp_cubes
    }

    pub fn density_cube_paths(&self) -> Vec<Option<PathBuf>> {
        evaluator::collect(&self.store).density_cubes
    }

    pub fn lowest_energy_index(&self) -> Option<usize> {
        evaluator::lowest_energy_index(&self.energies())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::{BackendError, JobStatus};
    use crate::engine::config::tests::scn_builder;
    use crate::engine::store::{JobArtifacts, PointStatus};
    use std::collections::HashSet;
    use tempfile::{TempDir, tempdir};

    /// Finishes every job on its first poll and writes its cube files.
    #[derive(Default)]
    struct InstantBackend {
        failing: HashSet<usize>,
        submitted: Vec<usize>,
    }

    impl QmBackend for InstantBackend {
        type Handle = usize;

        fn submit(&mut self, job: &JobDescriptor) -> Result<usize, BackendError> {
            self.submitted.push(job.index);
            Ok(job.index)
        }

        fn poll(&mut self, handle: &mut usize) -> JobStatus {
            if self.failing.contains(handle) {
                JobStatus::Failed("error termination".into())
            } else {
                JobStatus::Finished
            }
        }

        fn fetch_artifacts(
            &mut self,
            job: &JobDescriptor,
            handle: &usize,
        ) -> Result<JobArtifacts, BackendError> {
            std::fs::write(job.esp_cube_path(), "").unwrap();
            std::fs::write(job.density_cube_path(), "").unwrap();
            Ok(JobArtifacts {
                energy: -490.0 + 0.1 * (*handle as f64 - 2.0).abs(),
                esp_cube: job.esp_cube_path(),
                density_cube: job.density_cube_path(),
            })
        }
    }

    fn scn_config(dir: &TempDir, steps: Vec<f64>) -> ScanConfig {
        let geometry = dir.path().join("scn.xyz");
        std::fs::write(
            &geometry,
            "3\nthiocyanate\nS 0.0 0.0 0.0\nC 1.68 0.0 0.0\nN 2.85 0.02 0.0\n",
        )
        .unwrap();
        scn_builder()
            .geometry_file(geometry)
            .steps(vec![steps])
            .polling_interval(0)
            .working_directory(dir.path().join("work"))
            .build()
            .unwrap()
    }

    fn backend(failing: &[usize]) -> InstantBackend {
        InstantBackend {
            failing: failing.iter().copied().collect(),
            ..InstantBackend::default()
        }
    }

    #[test]
    fn initialize_persists_a_reloadable_configuration() {
        let dir = tempdir().unwrap();
        let config = scn_config(&dir, vec![179.0, 175.0, 171.0]);
        let scan = Scan::with_backend(config.clone(), backend(&[])).unwrap();
        assert_eq!(scan.store().len(), 3);
        let persisted = dir.path().join("work").join("config_scan_scn.toml");
        assert_eq!(ScanConfig::from_file(&persisted).unwrap(), config);
        let reloaded = Scan::from_config_file(&persisted).unwrap();
        assert_eq!(reloaded.store().len(), 3);
    }

    #[test]
    fn prepare_files_writes_one_input_per_point() {
        let dir = tempdir().unwrap();
        let scan = Scan::with_backend(scn_config(&dir, vec![179.0, 175.0]), backend(&[])).unwrap();
        let files = scan.prepare_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_file()));
        assert_eq!(scan.prepare_files().unwrap(), files);
    }

    #[test]
    fn execute_evaluates_and_reports_undefined_energy_for_failures() {
        let dir = tempdir().unwrap();
        let config = scn_config(&dir, vec![179.0, 175.0, 171.0, 167.0]);
        let mut scan = Scan::with_backend(config, backend(&[1])).unwrap();
        let summary = scan.execute(&ProgressReporter::new()).unwrap();
        assert_eq!(summary.failed, 1);
        let energies = scan.energies();
        assert_eq!(energies.len(), 4);
        assert!(energies[1].is_none());
        assert!(energies.iter().enumerate().all(|(i, e)| i == 1 || e.is_some()));
        assert_eq!(scan.lowest_energy_index(), Some(2));
        assert!(scan.esp_cube_paths()[1].is_none());
        assert!(scan.density_cube_paths()[0].is_some());
        assert!(scan.summary_path().is_file());
    }

    #[test]
    fn second_execute_resubmits_only_failed_points() {
        let dir = tempdir().unwrap();
        let config = scn_config(&dir, vec![179.0, 175.0, 171.0]);
        let mut scan = Scan::with_backend(config.clone(), backend(&[1])).unwrap();
        scan.execute(&ProgressReporter::new()).unwrap();
        assert_eq!(scan.backend.submitted, vec![0, 1, 2]);

        scan.backend.failing.clear();
        scan.backend.submitted.clear();
        scan.execute(&ProgressReporter::new()).unwrap();
        assert_eq!(scan.backend.submitted, vec![1]);
        assert_eq!(scan.store().count(PointStatus::Done), 3);
    }

    #[test]
    fn restart_resumes_from_state_file() {
        let dir = tempdir().unwrap();
        let config = scn_config(&dir, vec![179.0, 175.0, 171.0]);
        let mut first = Scan::with_backend(config.clone(), backend(&[2])).unwrap();
        first.execute(&ProgressReporter::new()).unwrap();

        let mut second = Scan::with_backend(config, backend(&[])).unwrap();
        assert_eq!(second.store().count(PointStatus::Done), 2);
        second.execute(&ProgressReporter::new()).unwrap();
        assert_eq!(second.backend.submitted, vec![2]);
    }

    #[test]
    fn overwrite_resubmits_everything() {
        let dir = tempdir().unwrap();
        let config = scn_config(&dir, vec![179.0, 175.0]);
        Scan::with_backend(config.clone(), backend(&[]))
            .unwrap()
            .execute(&ProgressReporter::new())
            .unwrap();
        let mut again = config;
        again.overwrite = true;
        let mut scan = Scan::with_backend(again, backend(&[])).unwrap();
        scan.execute(&ProgressReporter::new()).unwrap();
        assert_eq!(scan.backend.submitted, vec![0, 1]);
    }

    #[test]
    fn missing_geometry_fails_initialization() {
        let dir = tempdir().unwrap();
        let mut config = scn_config(&dir, vec![179.0]);
        config.geometry_file = dir.path().join("absent.xyz");
        assert!(matches!(
            Scan::with_backend(config, backend(&[])),
            Err(EngineError::Geometry { .. })
        ));
    }
}

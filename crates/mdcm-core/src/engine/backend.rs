use super::job::JobDescriptor;
use super::store::JobArtifacts;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to start job '{job}': {source}")]
    Spawn {
        job: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read job log '{path}': {source}")]
    Log {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No final energy found in '{path}'")]
    EnergyNotFound { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Running,
    Finished,
    Failed(String),
}

/// Submission and monitoring of external QM jobs.
///
/// `poll` must never block for the duration of a job; the scheduler calls it
/// for every outstanding handle once per polling interval.
pub trait QmBackend {
    type Handle;

    fn submit(&mut self, job: &JobDescriptor) -> Result<Self::Handle, BackendError>;

    fn poll(&mut self, handle: &mut Self::Handle) -> JobStatus;

    fn fetch_artifacts(
        &mut self,
        job: &JobDescriptor,
        handle: &Self::Handle,
    ) -> Result<JobArtifacts, BackendError>;
}

pub struct ProcessHandle {
    child: Child,
}

/// Runs each job's shell script as a local child process.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    shell: PathBuf,
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("sh"),
        }
    }
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl QmBackend for ProcessBackend {
    type Handle = ProcessHandle;

    fn submit(&mut self, job: &JobDescriptor) -> Result<ProcessHandle, BackendError> {
        let child = Command::new(&self.shell)
            .arg(job.script_path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackendError::Spawn {
                job: job.stem.clone(),
                source: e,
            })?;
        debug!(job = %job.stem, pid = child.id(), "Job started.");
        Ok(ProcessHandle { child })
    }

    fn poll(&mut self, handle: &mut ProcessHandle) -> JobStatus {
        match handle.child.try_wait() {
            Ok(None) => JobStatus::Running,
            Ok(Some(status)) if status.success() => JobStatus::Finished,
            Ok(Some(status)) => JobStatus::Failed(format!("job script exited with {}", status)),
            Err(e) => JobStatus::Failed(format!("failed to query job process: {}", e)),
        }
    }

    fn fetch_artifacts(
        &mut self,
        job: &JobDescriptor,
        _handle: &ProcessHandle,
    ) -> Result<JobArtifacts, BackendError> {
        let energy = read_final_energy(&job.log_path())?;
        Ok(JobArtifacts {
            energy,
            esp_cube: job.esp_cube_path(),
            density_cube: job.density_cube_path(),
        })
    }
}

fn parse_fortran_float(token: &str) -> Option<f64> {
    token.replace(['D', 'd'], "E").parse().ok()
}

/// Extracts the last reported total energy (Hartree) from a Gaussian log.
///
/// Both `EUMP2 = ...` (MP2) and `SCF Done:  E(...) = ...` lines count; the
/// latest one in the file wins.
pub fn parse_final_energy(log: &str) -> Option<f64> {
    let mut energy = None;
    for line in log.lines() {
        if let Some((_, rest)) = line.split_once("EUMP2 =") {
            if let Some(value) = rest.split_whitespace().next().and_then(parse_fortran_float) {
                energy = Some(value);
            }
        } else if line.trim_start().starts_with("SCF Done:") {
            if let Some((_, rest)) = line.split_once('=') {
                if let Some(value) = rest.split_whitespace().next().and_then(parse_fortran_float) {
                    energy = Some(value);
                }
            }
        }
    }
    energy
}

fn read_final_energy(path: &Path) -> Result<f64, BackendError> {
    let content = std::fs::read_to_string(path).map_err(|e| BackendError::Log {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    parse_final_energy(&content).ok_or_else(|| BackendError::EnergyNotFound {
        path: path.to_string_lossy().to_string(),
    })
}

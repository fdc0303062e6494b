use super::error::EngineError;
use crate::core::models::molecule::Molecule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl PointStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PointStatus::Done | PointStatus::Failed)
    }
}

/// Energy and field files produced by a successful QM job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobArtifacts {
    pub energy: f64,
    pub esp_cube: PathBuf,
    pub density_cube: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPoint {
    pub index: usize,
    pub dof_values: Vec<f64>,
    pub geometry: Molecule,
    pub status: PointStatus,
    pub energy: Option<f64>,
    pub esp_cube: Option<PathBuf>,
    pub density_cube: Option<PathBuf>,
    pub message: Option<String>,
}

impl ScanPoint {
    pub fn new(index: usize, dof_values: Vec<f64>, geometry: Molecule) -> Self {
        Self {
            index,
            dof_values,
            geometry,
            status: PointStatus::Pending,
            energy: None,
            esp_cube: None,
            density_cube: None,
            message: None,
        }
    }

    fn reset(&mut self) {
        self.status = PointStatus::Pending;
        self.energy = None;
        self.esp_cube = None;
        self.density_cube = None;
        self.message = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PointRecord {
    index: usize,
    dof_values: Vec<f64>,
    status: PointStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    esp_cube: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    density_cube: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    points: Vec<PointRecord>,
}

/// Index-stable record of every scan point.
///
/// The store only allows the transitions `Pending -> Running -> {Done, Failed}`
/// plus the explicit reset performed by [`ScanResultStore::schedule`].
#[derive(Debug, Clone, Default)]
pub struct ScanResultStore {
    points: Vec<ScanPoint>,
}

impl ScanResultStore {
    pub fn new(points: Vec<ScanPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ScanPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&ScanPoint> {
        self.points.get(index)
    }

    pub fn count(&self, status: PointStatus) -> usize {
        self.points.iter().filter(|p| p.status == status).count()
    }

    /// Returns, in scan order, the points the next execution must run.
    ///
    /// Failed and pending points are always scheduled. Finished points are
    /// reset and scheduled only when `overwrite` is set.
    pub fn schedule(&mut self, overwrite: bool) -> Vec<usize> {
        let mut scheduled = Vec::new();
        for point in &mut self.points {
            let rerun = match point.status {
                PointStatus::Done => overwrite,
                PointStatus::Failed | PointStatus::Pending | PointStatus::Running => true,
            };
            if rerun {
                point.reset();
                scheduled.push(point.index);
            }
        }
        scheduled
    }

    pub fn mark_running(&mut self, index: usize) -> bool {
        match self.points.get_mut(index) {
            Some(point) if point.status == PointStatus::Pending => {
                point.status = PointStatus::Running;
                true
            }
            _ => false,
        }
    }

    pub fn mark_done(&mut self, index: usize, artifacts: JobArtifacts) -> bool {
        match self.points.get_mut(index) {
            Some(point) if point.status == PointStatus::Running => {
                point.status = PointStatus::Done;
                point.energy = Some(artifacts.energy);
                point.esp_cube = Some(artifacts.esp_cube);
                point.density_cube = Some(artifacts.density_cube);
                point.message = None;
                true
            }
            _ => false,
        }
    }

    pub fn mark_failed(&mut self, index: usize, message: String) -> bool {
        match self.points.get_mut(index) {
            Some(point) if point.status == PointStatus::Running => {
                point.status = PointStatus::Failed;
                point.energy = None;
                point.message = Some(message);
                true
            }
            _ => false,
        }
    }

    /// Downgrades a finished point whose artifacts turned out to be unusable.
    pub fn invalidate(&mut self, index: usize, message: String) -> bool {
        match self.points.get_mut(index) {
            Some(point) if point.status == PointStatus::Done => {
                point.status = PointStatus::Failed;
                point.energy = None;
                point.message = Some(message);
                true
            }
            _ => false,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let state = StateFile {
            points: self
                .points
                .iter()
                .map(|p| PointRecord {
                    index: p.index,
                    dof_values: p.dof_values.clone(),
                    status: p.status,
                    energy: p.energy,
                    esp_cube: p.esp_cube.clone(),
                    density_cube: p.density_cube.clone(),
                    message: p.message.clone(),
                })
                .collect(),
        };
        let content = toml::to_string(&state).map_err(|e| EngineError::State {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| EngineError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        debug!(path = %path.display(), "Scan state saved.");
        Ok(())
    }

    /// Merges a previously saved state into freshly enumerated points.
    ///
    /// The saved state must describe the same scan (same number of points and
    /// the same coordinate values per point). Points saved as running belonged
    /// to a process that no longer exists and come back as pending.
    pub fn restore(&mut self, path: &Path) -> Result<(), EngineError> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let state: StateFile = toml::from_str(&content).map_err(|e| EngineError::State {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
        if state.points.len() != self.points.len() {
            return Err(EngineError::State {
                path: path.to_string_lossy().to_string(),
                reason: format!(
                    "it describes {} points but the scan has {}",
                    state.points.len(),
                    self.points.len()
                ),
            });
        }
        for (point, record) in self.points.iter().zip(&state.points) {
            let same_values = record.dof_values.len() == point.dof_values.len()
                && record
                    .dof_values
                    .iter()
                    .zip(&point.dof_values)
                    .all(|(a, b)| (a - b).abs() < 1e-9);
            if record.index != point.index || !same_values {
                return Err(EngineError::State {
                    path: path.to_string_lossy().to_string(),
                    reason: format!("point {} does not match the scan definition", point.index),
                });
            }
        }
        for (point, record) in self.points.iter_mut().zip(state.points) {
            point.status = match record.status {
                PointStatus::Running => PointStatus::Pending,
                status => status,
            };
            if point.status.is_terminal() {
                point.energy = record.energy;
                point.esp_cube = record.esp_cube;
                point.density_cube = record.density_cube;
                point.message = record.message;
            }
        }
        info!(
            done = self.count(PointStatus::Done),
            failed = self.count(PointStatus::Failed),
            "Restored scan state from {}.",
            path.display()
        );
        Ok(())
    }
}

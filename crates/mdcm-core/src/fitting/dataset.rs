use super::error::FitError;
use crate::core::io::cube::{CubeFile, CubeGrid, CubeMetadata};
use crate::core::io::traits::FormatFile;
use crate::core::models::molecule::Molecule;
use nalgebra::Point3;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Density window (e/bohr^3) selecting the grid points used for fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskConfig {
    pub density_lower: f64,
    pub density_upper: f64,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            density_lower: 1.0e-4,
            density_upper: 1.0e-3,
        }
    }
}

impl MaskConfig {
    #[inline]
    pub fn contains(&self, density: f64) -> bool {
        density >= self.density_lower && density <= self.density_upper
    }
}

/// One reference ESP grid with the points selected by its density mask.
#[derive(Debug, Clone)]
pub struct ReferenceCube {
    pub esp_path: PathBuf,
    pub density_path: PathBuf,
    pub esp: CubeGrid,
    pub metadata: CubeMetadata,
    pub molecule: Molecule,
    /// Masked grid point positions in bohr.
    pub points: Vec<Point3<f64>>,
    /// Reference potential at `points`, in Hartree/e.
    pub values: Vec<f64>,
}

impl ReferenceCube {
    pub fn load(esp_path: &Path, density_path: &Path, mask: &MaskConfig) -> Result<Self, FitError> {
        let (esp, metadata) = read_cube(esp_path)?;
        let (density, _) = read_cube(density_path)?;
        if !esp.same_lattice(&density) {
            return Err(FitError::Dimension(format!(
                "grids of '{}' ({:?}) and '{}' ({:?}) differ",
                esp_path.display(),
                esp.shape,
                density_path.display(),
                density.shape
            )));
        }

        let (points, values): (Vec<_>, Vec<_>) = density
            .values
            .iter()
            .enumerate()
            .filter(|(_, rho)| mask.contains(**rho))
            .map(|(i, _)| (esp.point(i), esp.values[i]))
            .unzip();
        if points.is_empty() {
            return Err(FitError::EmptyMask {
                path: density_path.to_string_lossy().to_string(),
            });
        }
        debug!(
            esp = %esp_path.display(),
            selected = points.len(),
            total = esp.num_points(),
            "Applied density mask."
        );

        Ok(Self {
            esp_path: esp_path.to_path_buf(),
            density_path: density_path.to_path_buf(),
            molecule: esp.molecule(),
            esp,
            metadata,
            points,
            values,
        })
    }
}

fn read_cube(path: &Path) -> Result<(CubeGrid, CubeMetadata), FitError> {
    CubeFile::read_from_path(path).map_err(|e| FitError::Cube {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

/// Reference ESP data for every scanned geometry, in scan order.
#[derive(Debug, Clone, Default)]
pub struct CubeDataset {
    entries: Vec<ReferenceCube>,
}

impl CubeDataset {
    pub fn load(
        esp_files: &[PathBuf],
        density_files: &[PathBuf],
        mask: &MaskConfig,
    ) -> Result<Self, FitError> {
        if esp_files.len() != density_files.len() {
            return Err(FitError::Dimension(format!(
                "{} ESP cube files but {} density cube files",
                esp_files.len(),
                density_files.len()
            )));
        }
        if esp_files.is_empty() {
            return Err(FitError::NotLoaded("cube file"));
        }
        let entries = esp_files
            .iter()
            .zip(density_files)
            .map(|(esp, dens)| ReferenceCube::load(esp, dens, mask))
            .collect::<Result<Vec<_>, _>>()?;
        info!(files = entries.len(), "Loaded reference cube files.");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ReferenceCube] {
        &self.entries
    }

    /// Geometry of the first file, used as the reference for the global model.
    pub fn reference_molecule(&self) -> Option<&Molecule> {
        self.entries.first().map(|e| &e.molecule)
    }
}

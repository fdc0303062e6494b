use crate::error::{CliError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A scan configuration file in which every key may be omitted.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileScanConfig {
    pub label: Option<String>,
    pub geometry_file: Option<PathBuf>,
    pub geometry_format: Option<String>,
    pub total_charge: Option<i32>,
    pub spin_multiplicity: Option<u32>,
    pub dofs: Option<Vec<Vec<usize>>>,
    pub steps: Option<Vec<Vec<f64>>>,
    pub qm_program: Option<String>,
    pub qm_method: Option<String>,
    pub qm_basis_set: Option<String>,
    pub constrained_optimization: Option<bool>,
    pub parallel_tasks: Option<usize>,
    pub cpus_per_task: Option<usize>,
    pub memory_per_task: Option<usize>,
    pub overwrite: Option<bool>,
    pub polling_interval: Option<u64>,
    pub working_directory: Option<PathBuf>,
    pub qm_executable: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileMaskConfig {
    pub density_lower: Option<f64>,
    pub density_upper: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBoundsConfig {
    pub position: Option<[f64; 2]>,
    pub charge: Option<[f64; 2]>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileOptimizerConfig {
    pub tolerance: Option<f64>,
    pub max_iterations: Option<usize>,
    pub max_evaluations: Option<usize>,
    pub relative_step: Option<f64>,
    pub zero_step: Option<f64>,
    pub bounds: Option<FileBoundsConfig>,
}

/// A fit configuration file. Relative paths are taken as given.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileFitConfig {
    pub esp_files: Option<Vec<PathBuf>>,
    pub density_files: Option<Vec<PathBuf>>,
    pub scan_config: Option<PathBuf>,
    pub local_model: Option<PathBuf>,
    pub replication_model: Option<PathBuf>,
    pub total_charge: Option<f64>,
    pub weights: Option<Vec<f64>>,
    pub output_local: Option<PathBuf>,
    pub output_global: Option<PathBuf>,
    pub write_cubes: Option<bool>,
    pub mask: Option<FileMaskConfig>,
    pub optimizer: Option<FileOptimizerConfig>,
}

/// Reads a TOML file into `T`, attaching the path to any failure.
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading configuration file {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    toml::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

impl FileScanConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        read_toml(path)
    }
}

impl FileFitConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        read_toml(path)
    }
}

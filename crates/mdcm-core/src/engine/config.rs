use crate::core::models::coordinate::InternalCoordinate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },

    #[error("{dofs} scan coordinate(s) but {steps} step sequence(s); they must correspond one to one")]
    DofStepMismatch { dofs: usize, steps: usize },

    #[error("Step sequence {index} has {found} values but the first has {expected}")]
    UnequalStepLengths {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported {kind}: '{value}'")]
    Unsupported { kind: &'static str, value: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QmProgram {
    #[serde(alias = "Gaussian")]
    Gaussian,
}

impl QmProgram {
    pub fn default_executable(&self) -> &'static str {
        match self {
            QmProgram::Gaussian => "g16",
        }
    }
}

impl FromStr for QmProgram {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" => Ok(QmProgram::Gaussian),
            _ => Err(ConfigError::Unsupported {
                kind: "QM program",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for QmProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QmProgram::Gaussian => write!(f, "gaussian"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFormat {
    Xyz,
}

impl FromStr for GeometryFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xyz" => Ok(GeometryFormat::Xyz),
            _ => Err(ConfigError::Unsupported {
                kind: "geometry format",
                value: s.to_string(),
            }),
        }
    }
}

/// The complete, validated description of a PES scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScanConfig {
    pub label: String,
    pub geometry_file: PathBuf,
    pub geometry_format: GeometryFormat,
    pub total_charge: i32,
    pub spin_multiplicity: u32,
    pub dofs: Vec<InternalCoordinate>,
    pub steps: Vec<Vec<f64>>,
    pub qm_program: QmProgram,
    pub qm_method: String,
    pub qm_basis_set: String,
    pub constrained_optimization: bool,
    pub parallel_tasks: usize,
    pub cpus_per_task: usize,
    /// Memory reserved per QM job, in MB.
    pub memory_per_task: usize,
    pub overwrite: bool,
    /// Seconds between two polls of the outstanding jobs.
    pub polling_interval: u64,
    pub working_directory: PathBuf,
    pub qm_executable: String,
}

/// Every option of [`ScanConfig`] with a one-line description, in file order.
pub const OPTION_DOCS: &[(&str, &str)] = &[
    ("label", "System label used to name job, state and summary files."),
    ("geometry-file", "Path to the input geometry, read once when the scan is initialized."),
    ("geometry-format", "Format tag of the input geometry file ('xyz')."),
    ("total-charge", "Total molecular charge in units of e."),
    ("spin-multiplicity", "Spin multiplicity 2S+1 of the electronic state."),
    ("dofs", "Scanned coordinates, each a list of 2 (bond), 3 (angle) or 4 (dihedral) zero-based atom indices."),
    ("steps", "One list of target values per coordinate (Angstrom or degrees); step i uses the i-th value of every list."),
    ("qm-program", "Quantum chemistry program ('gaussian')."),
    ("qm-method", "Electronic structure method, e.g. 'MP2'."),
    ("qm-basis-set", "Basis set, e.g. 'aug-cc-pVTZ'."),
    ("constrained-optimization", "Relax all other coordinates with the scanned ones frozen (true) or run single points (false)."),
    ("parallel-tasks", "Maximum number of QM jobs running at the same time."),
    ("cpus-per-task", "CPU cores reserved for each QM job."),
    ("memory-per-task", "Memory in MB reserved for each QM job."),
    ("overwrite", "Recompute points that already finished successfully."),
    ("polling-interval", "Seconds between two checks of the running jobs."),
    ("working-directory", "Directory for job inputs, outputs, cube files and the scan state."),
    ("qm-executable", "Executable used to run the QM program (defaults per program, e.g. 'g16')."),
];

/// Renders [`OPTION_DOCS`] as an aligned two-column table.
pub fn documentation() -> String {
    let width = OPTION_DOCS.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::from("Scan configuration options:\n");
    for (key, doc) in OPTION_DOCS {
        out.push_str(&format!("  {:<width$}  {}\n", key, doc, width = width));
    }
    out
}

impl ScanConfig {
    pub fn num_points(&self) -> usize {
        self.steps.first().map_or(0, |s| s.len())
    }

    /// Checks the invariants that do not depend on the input geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "label",
                reason: "must not be empty".into(),
            });
        }
        if self.label.contains(['/', '\\', ' ']) {
            return Err(ConfigError::InvalidValue {
                parameter: "label",
                reason: "must not contain path separators or spaces".into(),
            });
        }
        if self.dofs.is_empty() {
            return Err(ConfigError::MissingParameter("dofs"));
        }
        if self.dofs.len() != self.steps.len() {
            return Err(ConfigError::DofStepMismatch {
                dofs: self.dofs.len(),
                steps: self.steps.len(),
            });
        }
        let expected = self.num_points();
        if let Some((index, seq)) = self
            .steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.len() != expected)
        {
            return Err(ConfigError::UnequalStepLengths {
                index,
                expected,
                found: seq.len(),
            });
        }
        if expected == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "steps",
                reason: "at least one step value is required".into(),
            });
        }
        if self.spin_multiplicity == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "spin-multiplicity",
                reason: "must be at least 1".into(),
            });
        }
        for (parameter, value) in [
            ("parallel-tasks", self.parallel_tasks),
            ("cpus-per-task", self.cpus_per_task),
            ("memory-per-task", self.memory_per_task),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    parameter,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: ScanConfig = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// File name under which an initialized scan persists its configuration.
    pub fn persisted_file_name(&self) -> String {
        format!("config_scan_{}.toml", self.label)
    }
}

#[derive(Default)]
pub struct ScanConfigBuilder {
    label: Option<String>,
    geometry_file: Option<PathBuf>,
    geometry_format: Option<GeometryFormat>,
    total_charge: Option<i32>,
    spin_multiplicity: Option<u32>,
    dofs: Option<Vec<InternalCoordinate>>,
    steps: Option<Vec<Vec<f64>>>,
    qm_program: Option<QmProgram>,
    qm_method: Option<String>,
    qm_basis_set: Option<String>,
    constrained_optimization: Option<bool>,
    parallel_tasks: Option<usize>,
    cpus_per_task: Option<usize>,
    memory_per_task: Option<usize>,
    overwrite: Option<bool>,
    polling_interval: Option<u64>,
    working_directory: Option<PathBuf>,
    qm_executable: Option<String>,
}

impl ScanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
    pub fn geometry_file(mut self, path: PathBuf) -> Self {
        self.geometry_file = Some(path);
        self
    }
    pub fn geometry_format(mut self, format: GeometryFormat) -> Self {
        self.geometry_format = Some(format);
        self
    }
    pub fn total_charge(mut self, charge: i32) -> Self {
        self.total_charge = Some(charge);
        self
    }
    pub fn spin_multiplicity(mut self, multiplicity: u32) -> Self {
        self.spin_multiplicity = Some(multiplicity);
        self
    }
    pub fn dofs(mut self, dofs: Vec<InternalCoordinate>) -> Self {
        self.dofs = Some(dofs);
        self
    }
    pub fn steps(mut self, steps: Vec<Vec<f64>>) -> Self {
        self.steps = Some(steps);
        self
    }
    pub fn qm_program(mut self, program: QmProgram) -> Self {
        self.qm_program = Some(program);
        self
    }
    pub fn qm_method(mut self, method: &str) -> Self {
        self.qm_method = Some(method.to_string());
        self
    }
    pub fn qm_basis_set(mut self, basis: &str) -> Self {
        self.qm_basis_set = Some(basis.to_string());
        self
    }
    pub fn constrained_optimization(mut self, enabled: bool) -> Self {
        self.constrained_optimization = Some(enabled);
        self
    }
    pub fn parallel_tasks(mut self, n: usize) -> Self {
        self.parallel_tasks = Some(n);
        self
    }
    pub fn cpus_per_task(mut self, n: usize) -> Self {
        self.cpus_per_task = Some(n);
        self
    }
    pub fn memory_per_task(mut self, megabytes: usize) -> Self {
        self.memory_per_task = Some(megabytes);
        self
    }
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }
    pub fn polling_interval(mut self, seconds: u64) -> Self {
        self.polling_interval = Some(seconds);
        self
    }
    pub fn working_directory(mut self, path: PathBuf) -> Self {
        self.working_directory = Some(path);
        self
    }
    pub fn qm_executable(mut self, executable: &str) -> Self {
        self.qm_executable = Some(executable.to_string());
        self
    }

    pub fn build(self) -> Result<ScanConfig, ConfigError> {
        let qm_program = self
            .qm_program
            .ok_or(ConfigError::MissingParameter("qm_program"))?;
        let config = ScanConfig {
            label: self.label.ok_or(ConfigError::MissingParameter("label"))?,
            geometry_file: self
                .geometry_file
                .ok_or(ConfigError::MissingParameter("geometry_file"))?,
            geometry_format: self.geometry_format.unwrap_or(GeometryFormat::Xyz),
            total_charge: self
                .total_charge
                .ok_or(ConfigError::MissingParameter("total_charge"))?,
            spin_multiplicity: self
                .spin_multiplicity
                .ok_or(ConfigError::MissingParameter("spin_multiplicity"))?,
            dofs: self.dofs.ok_or(ConfigError::MissingParameter("dofs"))?,
            steps: self.steps.ok_or(ConfigError::MissingParameter("steps"))?,
            qm_program,
            qm_method: self
                .qm_method
                .ok_or(ConfigError::MissingParameter("qm_method"))?,
            qm_basis_set: self
                .qm_basis_set
                .ok_or(ConfigError::MissingParameter("qm_basis_set"))?,
            constrained_optimization: self
                .constrained_optimization
                .ok_or(ConfigError::MissingParameter("constrained_optimization"))?,
            parallel_tasks: self
                .parallel_tasks
                .ok_or(ConfigError::MissingParameter("parallel_tasks"))?,
            cpus_per_task: self
                .cpus_per_task
                .ok_or(ConfigError::MissingParameter("cpus_per_task"))?,
            memory_per_task: self
                .memory_per_task
                .ok_or(ConfigError::MissingParameter("memory_per_task"))?,
            overwrite: self.overwrite.unwrap_or(false),
            polling_interval: self
                .polling_interval
                .ok_or(ConfigError::MissingParameter("polling_interval"))?,
            working_directory: self.working_directory.unwrap_or_else(|| PathBuf::from(".")),
            qm_executable: self
                .qm_executable
                .unwrap_or_else(|| qm_program.default_executable().to_string()),
        };
        config.validate()?;
        Ok(config)
    }
}

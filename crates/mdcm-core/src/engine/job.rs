use super::config::{QmProgram, ScanConfig};
use super::store::ScanPoint;
use crate::core::models::coordinate::InternalCoordinate;
use std::fmt::Write as _;
use std::path::PathBuf;

/// A fully specified QM job for one scan point.
///
/// Jobs refer to their point by index only. All paths live in the configured
/// working directory and are derived from the point index and the scan label.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub index: usize,
    pub stem: String,
    pub working_directory: PathBuf,
    pub input: String,
    pub script: String,
    pub cpus: usize,
    pub memory_mb: usize,
}

impl JobDescriptor {
    pub fn build(point: &ScanPoint, config: &ScanConfig) -> Self {
        let stem = match config.qm_program {
            QmProgram::Gaussian => format!("gaussian_{}_{}", point.index, config.label),
        };
        let input = gaussian_input(&stem, point, config);
        let script = gaussian_script(&stem, &config.qm_executable);
        Self {
            index: point.index,
            working_directory: config.working_directory.clone(),
            stem,
            input,
            script,
            cpus: config.cpus_per_task,
            memory_mb: config.memory_per_task,
        }
    }

    fn path_with(&self, suffix: &str) -> PathBuf {
        self.working_directory.join(format!("{}{}", self.stem, suffix))
    }

    pub fn input_path(&self) -> PathBuf {
        self.path_with(".com")
    }

    pub fn script_path(&self) -> PathBuf {
        self.path_with(".sh")
    }

    pub fn log_path(&self) -> PathBuf {
        self.path_with(".log")
    }

    pub fn esp_cube_path(&self) -> PathBuf {
        self.path_with("_esp.cube")
    }

    pub fn density_cube_path(&self) -> PathBuf {
        self.path_with("_dens.cube")
    }

    /// Writes the input file and the run script. Rewriting produces identical
    /// files, so calling this repeatedly is harmless.
    pub fn write_files(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.working_directory)?;
        std::fs::write(self.input_path(), &self.input)?;
        std::fs::write(self.script_path(), &self.script)?;
        Ok(())
    }

    pub fn files_exist(&self) -> bool {
        self.input_path().is_file() && self.script_path().is_file()
    }
}

fn frozen_line(dof: &InternalCoordinate) -> String {
    let prefix = match dof {
        InternalCoordinate::Bond(..) => "B",
        InternalCoordinate::Angle(..) => "A",
        InternalCoordinate::Dihedral(..) => "D",
    };
    let atoms: Vec<String> = dof.atoms().iter().map(|a| (a + 1).to_string()).collect();
    format!("{} {} F", prefix, atoms.join(" "))
}

fn gaussian_input(stem: &str, point: &ScanPoint, config: &ScanConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "%nproc={}", config.cpus_per_task);
    let _ = writeln!(out, "%mem={}MB", config.memory_per_task);
    let _ = writeln!(out, "%chk={}.chk", stem);
    if config.constrained_optimization {
        let _ = writeln!(
            out,
            "#P {}/{} Opt=ModRedundant Density=Current",
            config.qm_method, config.qm_basis_set
        );
    } else {
        let _ = writeln!(
            out,
            "#P {}/{} SCF=Tight Density=Current",
            config.qm_method, config.qm_basis_set
        );
    }
    out.push('\n');
    let values: Vec<String> = config
        .dofs
        .iter()
        .zip(&point.dof_values)
        .map(|(dof, value)| format!("{} {}", dof, value))
        .collect();
    let _ = writeln!(out, "{} scan step {}: {}", config.label, point.index, values.join(", "));
    out.push('\n');
    let _ = writeln!(out, "{} {}", config.total_charge, config.spin_multiplicity);
    for atom in point.geometry.atoms() {
        let _ = writeln!(
            out,
            "{:<3}{:>16.8}{:>16.8}{:>16.8}",
            atom.element, atom.position.x, atom.position.y, atom.position.z
        );
    }
    out.push('\n');
    if config.constrained_optimization {
        for dof in &config.dofs {
            let _ = writeln!(out, "{}", frozen_line(dof));
        }
        out.push('\n');
    }
    out
}

fn gaussian_script(stem: &str, executable: &str) -> String {
    let mut out = String::from("#!/bin/sh\n");
    out.push_str("cd \"$(dirname \"$0\")\" || exit 1\n");
    let _ = writeln!(out, "{} < {stem}.com > {stem}.log || exit 1", executable);
    let _ = writeln!(out, "formchk {stem}.chk {stem}.fchk || exit 1");
    let _ = writeln!(
        out,
        "cubegen 0 density=scf {stem}.fchk {stem}_dens.cube 0 h || exit 1"
    );
    let _ = writeln!(
        out,
        "cubegen 0 potential=scf {stem}.fchk {stem}_esp.cube -5 h {stem}_dens.cube || exit 1"
    );
    out
}

/// Builds the descriptors of the given points, in the order given.
pub fn build_all<'a>(
    points: impl IntoIterator<Item = &'a ScanPoint>,
    config: &ScanConfig,
) -> Vec<JobDescriptor> {
    points
        .into_iter()
        .map(|p| JobDescriptor::build(p, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::{Atom, Molecule};
    use crate::engine::config::tests::scn_builder;
    use nalgebra::Point3;
    use tempfile::tempdir;

    fn point(index: usize) -> ScanPoint {
        let geometry = Molecule::new(vec![
            Atom::new("S", 16, Point3::new(0.0, 0.0, 0.0)),
            Atom::new("C", 6, Point3::new(1.68, 0.0, 0.0)),
            Atom::new("N", 7, Point3::new(2.85, 0.02, 0.0)),
        ]);
        ScanPoint::new(index, vec![175.0], geometry)
    }

    #[test]
    fn descriptor_paths_follow_the_naming_scheme() {
        let dir = tempdir().unwrap();
        let config = scn_builder()
            .working_directory(dir.path().to_path_buf())
            .build()
            .unwrap();
        let job = JobDescriptor::build(&point(1), &config);
        assert_eq!(job.stem, "gaussian_1_scn");
        assert_eq!(job.input_path(), dir.path().join("gaussian_1_scn.com"));
        assert_eq!(job.esp_cube_path(), dir.path().join("gaussian_1_scn_esp.cube"));
        assert_eq!(
            job.density_cube_path(),
            dir.path().join("gaussian_1_scn_dens.cube")
        );
    }

    #[test]
    fn constrained_input_reserves_resources_and_freezes_dofs() {
        let config = scn_builder().build().unwrap();
        let job = JobDescriptor::build(&point(0), &config);
        assert!(job.input.starts_with("%nproc=4\n%mem=1600MB\n%chk=gaussian_0_scn.chk\n"));
        assert!(job.input.contains("#P MP2/aug-cc-pVTZ Opt=ModRedundant"));
        assert!(job.input.contains("\n-1 1\n"));
        assert!(job.input.contains("A 1 2 3 F\n"));
        assert_eq!(job.cpus, 4);
        assert_eq!(job.memory_mb, 1600);
    }

    #[test]
    fn single_point_input_has_no_frozen_section() {
        let config = scn_builder().constrained_optimization(false).build().unwrap();
        let job = JobDescriptor::build(&point(0), &config);
        assert!(!job.input.contains("ModRedundant"));
        assert!(!job.input.contains(" F\n"));
    }

    #[test]
    fn script_runs_program_and_generates_both_cubes() {
        let config = scn_builder().build().unwrap();
        let job = JobDescriptor::build(&point(2), &config);
        assert!(job.script.contains("g16 < gaussian_2_scn.com > gaussian_2_scn.log"));
        assert!(job.script.contains("gaussian_2_scn_dens.cube"));
        assert!(job.script.contains("gaussian_2_scn_esp.cube"));
    }

    #[test]
    fn write_files_is_deterministic_and_idempotent() {
        let dir = tempdir().unwrap();
        let config = scn_builder()
            .working_directory(dir.path().to_path_buf())
            .build()
            .unwrap();
        let job = JobDescriptor::build(&point(0), &config);
        job.write_files().unwrap();
        let first = std::fs::read_to_string(job.input_path()).unwrap();
        JobDescriptor::build(&point(0), &config).write_files().unwrap();
        let second = std::fs::read_to_string(job.input_path()).unwrap();
        assert_eq!(first, second);
        assert!(job.files_exist());
    }
}

use super::error::FitError;
use crate::core::electrostatics::potential::PointCharge;
use crate::core::electrostatics::units::ANGSTROM_TO_BOHR;
use crate::core::io::dcm::{GlobalModelFile, LocalModelFile};
use crate::core::io::traits::FormatFile;
use crate::core::models::charge::{
    ChargeSite, ReplicationDefinition, ReplicationError, SITE_STRIDE, flatten_sites,
    unflatten_sites,
};
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::local_frame;
use nalgebra::{Point3, Vector3};
use std::path::Path;
use tracing::{debug, info};

/// Local charge sites, their replication onto the molecule, and the global
/// charge set instantiated at a reference geometry.
///
/// Vector values are never range-checked; only lengths are validated.
#[derive(Debug, Clone, Default)]
pub struct ChargeModel {
    local: Vec<f64>,
    replication: Option<ReplicationDefinition>,
    reference: Option<Molecule>,
    global: Vec<f64>,
}

impl ChargeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_local_sites(&self) -> usize {
        self.local.len() / SITE_STRIDE
    }

    pub fn has_local(&self) -> bool {
        !self.local.is_empty()
    }

    pub fn replication(&self) -> Option<&ReplicationDefinition> {
        self.replication.as_ref()
    }

    pub fn load_local(&mut self, path: &Path) -> Result<(), FitError> {
        let (sites, _) = LocalModelFile::read_from_path(path).map_err(|e| FitError::ModelFile {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        if let Some(replication) = &self.replication {
            replication.validate(sites.len())?;
        }
        let local = flatten_sites(&sites);
        self.global = global_for(&local, self.replication.as_ref(), self.reference.as_ref())?;
        self.local = local;
        info!(sites = sites.len(), "Loaded local charge model from {}.", path.display());
        Ok(())
    }

    pub fn load_replication(&mut self, path: &Path) -> Result<(), FitError> {
        let replication = ReplicationDefinition::load(path)?;
        self.set_replication(replication)
    }

    pub fn set_replication(&mut self, replication: ReplicationDefinition) -> Result<(), FitError> {
        if self.has_local() {
            replication.validate(self.num_local_sites())?;
        }
        if let Some(reference) = &self.reference {
            replication.validate_atoms(reference.len())?;
        }
        self.global = global_for(&self.local, Some(&replication), self.reference.as_ref())?;
        debug!(
            frames = replication.frames.len(),
            replicas = replication.replicas.len(),
            "Replication definition set."
        );
        self.replication = Some(replication);
        Ok(())
    }

    /// Sets the geometry at which the global vector is instantiated.
    pub fn set_reference(&mut self, molecule: Molecule) -> Result<(), FitError> {
        if let Some(replication) = &self.replication {
            replication.validate_atoms(molecule.len())?;
        }
        self.global = global_for(&self.local, self.replication.as_ref(), Some(&molecule))?;
        self.reference = Some(molecule);
        Ok(())
    }

    pub fn local_vector(&self) -> Vec<f64> {
        self.local.clone()
    }

    /// Replaces the local vector. The global vector is re-instantiated.
    pub fn set_local_vector(&mut self, vector: Vec<f64>) -> Result<(), FitError> {
        if !self.has_local() {
            return Err(FitError::NotLoaded("local charge model"));
        }
        if vector.len() != self.local.len() {
            return Err(FitError::Dimension(format!(
                "local vector has {} entries, expected {}",
                vector.len(),
                self.local.len()
            )));
        }
        self.global = global_for(&vector, self.replication.as_ref(), self.reference.as_ref())?;
        self.local = vector;
        Ok(())
    }

    pub fn global_vector(&self) -> Vec<f64> {
        self.global.clone()
    }

    /// Overrides the instantiated global vector until the next local update.
    pub fn set_global_vector(&mut self, vector: Vec<f64>) -> Result<(), FitError> {
        if self.global.is_empty() {
            return Err(FitError::NotLoaded("global charge model"));
        }
        if vector.len() != self.global.len() {
            return Err(FitError::Dimension(format!(
                "global vector has {} entries, expected {}",
                vector.len(),
                self.global.len()
            )));
        }
        self.global = vector;
        Ok(())
    }

    pub fn write_local(&self, path: &Path) -> Result<(), FitError> {
        let sites = unflatten_sites(&self.local).ok_or(FitError::NotLoaded("local charge model"))?;
        if sites.is_empty() {
            return Err(FitError::NotLoaded("local charge model"));
        }
        let comments = vec![format!("{} local charge sites (x y z [Angstrom], q [e])", sites.len())];
        LocalModelFile::write_to_path(&sites, &comments, path).map_err(|e| FitError::ModelFile {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn write_global(&self, path: &Path) -> Result<(), FitError> {
        let sites = unflatten_sites(&self.global).ok_or(FitError::NotLoaded("global charge model"))?;
        if sites.is_empty() {
            return Err(FitError::NotLoaded("global charge model"));
        }
        let comment = format!(
            "{} charges in global frame, total charge {:.6}",
            sites.len(),
            sites.iter().map(|s| s.charge).sum::<f64>()
        );
        GlobalModelFile::write_to_path(&sites, &comment, path).map_err(|e| FitError::ModelFile {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Places the sites of `local` onto `molecule` (Angstroms).
    pub fn instantiate(&self, local: &[f64], molecule: &Molecule) -> Result<Vec<ChargeSite>, FitError> {
        let replication = self
            .replication
            .as_ref()
            .ok_or(FitError::NotLoaded("replication definition"))?;
        place(replication, local, molecule)
    }

    /// Point charges in atomic units for evaluating the potential of `local`
    /// placed on `molecule`.
    pub fn point_charges(&self, local: &[f64], molecule: &Molecule) -> Result<Vec<PointCharge>, FitError> {
        Ok(self
            .instantiate(local, molecule)?
            .into_iter()
            .map(|s| PointCharge {
                position: s.position * ANGSTROM_TO_BOHR,
                charge: s.charge,
            })
            .collect())
    }
}

/// The global vector for a candidate state; empty until all three parts are
/// present. Callers commit nothing when this fails.
fn global_for(
    local: &[f64],
    replication: Option<&ReplicationDefinition>,
    reference: Option<&Molecule>,
) -> Result<Vec<f64>, FitError> {
    match (reference, replication) {
        (Some(reference), Some(replication)) if !local.is_empty() => {
            Ok(flatten_sites(&place(replication, local, reference)?))
        }
        _ => Ok(Vec::new()),
    }
}

fn place(
    replication: &ReplicationDefinition,
    local: &[f64],
    molecule: &Molecule,
) -> Result<Vec<ChargeSite>, FitError> {
    let sites = unflatten_sites(local).ok_or_else(|| {
        FitError::Dimension(format!(
            "local vector length {} is not a multiple of {}",
            local.len(),
            SITE_STRIDE
        ))
    })?;
    replication.validate_atoms(molecule.len())?;

    let mut frames = Vec::with_capacity(replication.frames.len());
    for (index, frame) in replication.frames.iter().enumerate() {
        let [a, b, c] = frame
            .atoms
            .map(|i| molecule.position(i).unwrap_or_else(Point3::origin));
        let axes = local_frame(&a, &b, &c)
            .ok_or(ReplicationError::DegenerateFrame { frame: index })?;
        frames.push((axes, [a, b, c]));
    }

    replication
        .replicas
        .iter()
        .enumerate()
        .map(|(index, replica)| -> Result<ChargeSite, FitError> {
            let site = sites.get(replica.site).ok_or(ReplicationError::UnknownSite {
                replica: index,
                site: replica.site,
            })?;
            let (axes, atoms) = frames.get(replica.frame).ok_or(ReplicationError::UnknownFrame {
                replica: index,
                frame: replica.frame,
            })?;
            let origin = atoms.get(replica.anchor).ok_or(ReplicationError::InvalidAnchor {
                replica: index,
                anchor: replica.anchor,
            })?;
            let y = if replica.mirror {
                -site.position.y
            } else {
                site.position.y
            };
            let offset = axes * Vector3::new(site.position.x, y, site.position.z);
            let position = origin + offset;
            Ok(ChargeSite::new(position.x, position.y, position.z, site.charge))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::charge::{FrameDefinition, Replica};
    use crate::core::models::molecule::Atom;
    use tempfile::tempdir;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn linear_molecule() -> Molecule {
        Molecule::new(vec![
            Atom::new("S", 16, Point3::new(0.0, 0.0, 1.0)),
            Atom::new("C", 6, Point3::new(0.0, 0.0, 0.0)),
            Atom::new("N", 7, Point3::new(1.0, 0.0, 0.0)),
        ])
    }

    fn model_with(local: &[ChargeSite], replicas: Vec<Replica>) -> ChargeModel {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.dcm");
        LocalModelFile::write_to_path(&local.to_vec(), &vec![], &path).unwrap();
        let mut model = ChargeModel::new();
        model.load_local(&path).unwrap();
        model
            .set_replication(ReplicationDefinition {
                frames: vec![FrameDefinition { atoms: [0, 1, 2] }],
                replicas,
            })
            .unwrap();
        model.set_reference(linear_molecule()).unwrap();
        model
    }

    fn replica(site: usize, anchor: usize, mirror: bool) -> Replica {
        Replica {
            site,
            frame: 0,
            anchor,
            mirror,
        }
    }

    #[test]
    fn instantiation_uses_frame_axes_and_anchor_origin() {
        // Frame: ez = +z (b->a), ey = ez x (c-b) = +y, ex = ey x ez = +x.
        let model = model_with(
            &[ChargeSite::new(0.5, 0.25, 0.1, -0.4)],
            vec![replica(0, 1, false), replica(0, 0, true)],
        );
        let global = model.global_vector();
        assert_eq!(global.len(), 8);
        let expected = [0.5, 0.25, 0.1, -0.4, 0.5, -0.25, 1.1, -0.4];
        for (a, b) in global.iter().zip(expected.iter()) {
            assert!(f64_approx_equal(*a, *b), "{} != {}", a, b);
        }
    }

    #[test]
    fn set_local_vector_validates_length_and_refreshes_global() {
        let mut model = model_with(&[ChargeSite::new(0.0, 0.0, 0.0, -1.0)], vec![replica(0, 1, false)]);
        assert!(matches!(
            model.set_local_vector(vec![0.0; 5]),
            Err(FitError::Dimension(_))
        ));
        model.set_local_vector(vec![0.0, 0.0, 1.0, -0.5]).unwrap();
        assert_eq!(model.local_vector(), vec![0.0, 0.0, 1.0, -0.5]);
        assert!(f64_approx_equal(model.global_vector()[2], 1.0));
    }

    #[test]
    fn global_override_lasts_until_next_local_update() {
        let mut model = model_with(&[ChargeSite::new(0.0, 0.0, 0.0, -1.0)], vec![replica(0, 1, false)]);
        model.set_global_vector(vec![9.0, 9.0, 9.0, -1.0]).unwrap();
        assert_eq!(model.global_vector(), vec![9.0, 9.0, 9.0, -1.0]);
        model.set_local_vector(model.local_vector()).unwrap();
        assert_eq!(model.global_vector(), vec![0.0, 0.0, 0.0, -1.0]);
        assert!(matches!(
            model.set_global_vector(vec![0.0; 8]),
            Err(FitError::Dimension(_))
        ));
    }

    #[test]
    fn unplaced_local_site_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.dcm");
        let sites = vec![ChargeSite::new(0.0, 0.0, 0.0, -0.5); 2];
        LocalModelFile::write_to_path(&sites, &vec![], &path).unwrap();
        let mut model = ChargeModel::new();
        model.load_local(&path).unwrap();
        let result = model.set_replication(ReplicationDefinition {
            frames: vec![FrameDefinition { atoms: [0, 1, 2] }],
            replicas: vec![replica(0, 0, false)],
        });
        assert!(matches!(
            result,
            Err(FitError::Replication(ReplicationError::UnplacedSite(1)))
        ));
    }

    fn collapsed_molecule() -> Molecule {
        Molecule::new(vec![
            Atom::new("S", 16, Point3::origin()),
            Atom::new("C", 6, Point3::origin()),
            Atom::new("N", 7, Point3::new(1.0, 0.0, 0.0)),
        ])
    }

    #[test]
    fn failed_local_load_keeps_previous_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local.dcm");
        LocalModelFile::write_to_path(&vec![ChargeSite::new(0.0, 0.0, 0.5, -1.0)], &vec![], &path).unwrap();
        let mut model = ChargeModel::new();
        model
            .set_replication(ReplicationDefinition {
                frames: vec![FrameDefinition { atoms: [0, 1, 2] }],
                replicas: vec![replica(0, 1, false)],
            })
            .unwrap();
        model.set_reference(collapsed_molecule()).unwrap();

        assert!(matches!(
            model.load_local(&path),
            Err(FitError::Replication(ReplicationError::DegenerateFrame { frame: 0 }))
        ));
        assert!(!model.has_local());
        assert!(model.local_vector().is_empty());
        assert!(model.global_vector().is_empty());
    }

    #[test]
    fn failed_replication_or_reference_update_keeps_previous_state() {
        let mut model = model_with(&[ChargeSite::new(0.0, 0.0, 0.5, -1.0)], vec![replica(0, 1, false)]);
        let global = model.global_vector();

        let degenerate = ReplicationDefinition {
            frames: vec![FrameDefinition { atoms: [1, 1, 2] }],
            replicas: vec![replica(0, 1, false)],
        };
        assert!(model.set_replication(degenerate).is_err());
        assert_eq!(model.replication().unwrap().frames[0].atoms, [0, 1, 2]);
        assert_eq!(model.global_vector(), global);

        assert!(model.set_reference(collapsed_molecule()).is_err());
        assert_eq!(model.global_vector(), global);
        model.set_local_vector(vec![0.0, 0.0, 1.0, -1.0]).unwrap();
        assert!(f64_approx_equal(model.global_vector()[2], 1.0));
    }

    #[test]
    fn point_charges_are_in_bohr() {
        let model = model_with(&[ChargeSite::new(0.0, 0.0, 1.0, 0.3)], vec![replica(0, 1, false)]);
        let charges = model
            .point_charges(&model.local_vector(), &linear_molecule())
            .unwrap();
        assert!(f64_approx_equal(charges[0].position.z, ANGSTROM_TO_BOHR));
        assert!(f64_approx_equal(charges[0].charge, 0.3));
    }

    #[test]
    fn write_global_without_reference_fails() {
        let dir = tempdir().unwrap();
        let model = ChargeModel::new();
        assert!(matches!(
            model.write_global(&dir.path().join("g.xyz")),
            Err(FitError::NotLoaded(_))
        ));
    }
}

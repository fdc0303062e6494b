use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of flat-vector entries per charge site: x, y, z, q.
pub const SITE_STRIDE: usize = 4;

/// A point charge site: a position (Angstroms) and a charge magnitude (e).
///
/// For local sites the position is expressed in the site's local frame; for
/// global sites it is a Cartesian position in the molecular frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeSite {
    pub position: Point3<f64>,
    pub charge: f64,
}

impl ChargeSite {
    pub fn new(x: f64, y: f64, z: f64, charge: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
            charge,
        }
    }
}

/// Flattens sites into `[x0, y0, z0, q0, x1, ...]`.
pub fn flatten_sites(sites: &[ChargeSite]) -> Vec<f64> {
    sites
        .iter()
        .flat_map(|s| [s.position.x, s.position.y, s.position.z, s.charge])
        .collect()
}

/// Rebuilds sites from a flat vector. Returns `None` if the length is not a
/// multiple of [`SITE_STRIDE`].
pub fn unflatten_sites(vector: &[f64]) -> Option<Vec<ChargeSite>> {
    if vector.len() % SITE_STRIDE != 0 {
        return None;
    }
    Some(
        vector
            .chunks_exact(SITE_STRIDE)
            .map(|c| ChargeSite::new(c[0], c[1], c[2], c[3]))
            .collect(),
    )
}

/// A local axis system spanned by three atoms of the molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameDefinition {
    pub atoms: [usize; 3],
}

/// Places one local site into one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Replica {
    /// Index of the local site.
    pub site: usize,
    /// Index of the frame in [`ReplicationDefinition::frames`].
    pub frame: usize,
    /// Which of the frame's three atoms is the origin (0, 1 or 2).
    #[serde(default)]
    pub anchor: usize,
    /// Reflect the local y component (symmetry-equivalent copy).
    #[serde(default)]
    pub mirror: bool,
}

/// Maps local charge sites onto the molecule, producing the global charge set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicationDefinition {
    pub frames: Vec<FrameDefinition>,
    pub replicas: Vec<Replica>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ReplicationError {
    #[error("Replica {replica} references unknown local site {site}")]
    UnknownSite { replica: usize, site: usize },
    #[error("Replica {replica} references unknown frame {frame}")]
    UnknownFrame { replica: usize, frame: usize },
    #[error("Replica {replica} has anchor {anchor}; anchors must be 0, 1 or 2")]
    InvalidAnchor { replica: usize, anchor: usize },
    #[error("Frame {frame} references atom {atom} but the molecule has {atom_count} atoms")]
    AtomOutOfRange {
        frame: usize,
        atom: usize,
        atom_count: usize,
    },
    #[error("Frame {frame} is degenerate for the given geometry")]
    DegenerateFrame { frame: usize },
    #[error("Local site {0} is not placed by any replica")]
    UnplacedSite(usize),
}

#[derive(Debug, Error)]
pub enum ReplicationLoadError {
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
    #[error("TOML serialization error for '{path}': {source}")]
    Serialize {
        path: String,
        source: toml::ser::Error,
    },
}

impl ReplicationDefinition {
    /// One frame per site, identity replication: every local site placed once.
    pub fn identity(frame: FrameDefinition, num_sites: usize) -> Self {
        Self {
            frames: vec![frame],
            replicas: (0..num_sites)
                .map(|site| Replica {
                    site,
                    frame: 0,
                    anchor: 0,
                    mirror: false,
                })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ReplicationLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReplicationLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ReplicationLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ReplicationLoadError> {
        let content = toml::to_string_pretty(self).map_err(|e| ReplicationLoadError::Serialize {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        std::fs::write(path, content).map_err(|e| ReplicationLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Checks internal consistency against a local site count.
    pub fn validate(&self, num_sites: usize) -> Result<(), ReplicationError> {
        let mut placed = vec![false; num_sites];
        for (idx, replica) in self.replicas.iter().enumerate() {
            if replica.site >= num_sites {
                return Err(ReplicationError::UnknownSite {
                    replica: idx,
                    site: replica.site,
                });
            }
            if replica.frame >= self.frames.len() {
                return Err(ReplicationError::UnknownFrame {
                    replica: idx,
                    frame: replica.frame,
                });
            }
            if replica.anchor > 2 {
                return Err(ReplicationError::InvalidAnchor {
                    replica: idx,
                    anchor: replica.anchor,
                });
            }
            placed[replica.site] = true;
        }
        match placed.iter().position(|p| !p) {
            Some(site) => Err(ReplicationError::UnplacedSite(site)),
            None => Ok(()),
        }
    }

    pub fn validate_atoms(&self, atom_count: usize) -> Result<(), ReplicationError> {
        for (frame_idx, frame) in self.frames.iter().enumerate() {
            if let Some(&atom) = frame.atoms.iter().find(|&&a| a >= atom_count) {
                return Err(ReplicationError::AtomOutOfRange {
                    frame: frame_idx,
                    atom,
                    atom_count,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn definition() -> ReplicationDefinition {
        ReplicationDefinition {
            frames: vec![FrameDefinition { atoms: [0, 1, 2] }],
            replicas: vec![
                Replica {
                    site: 0,
                    frame: 0,
                    anchor: 0,
                    mirror: false,
                },
                Replica {
                    site: 1,
                    frame: 0,
                    anchor: 2,
                    mirror: true,
                },
            ],
        }
    }

    #[test]
    fn flatten_and_unflatten_are_inverse() {
        let sites = vec![
            ChargeSite::new(0.1, 0.2, 0.3, -0.5),
            ChargeSite::new(1.0, -1.0, 0.0, -0.5),
        ];
        let flat = flatten_sites(&sites);
        assert_eq!(flat, vec![0.1, 0.2, 0.3, -0.5, 1.0, -1.0, 0.0, -0.5]);
        assert_eq!(unflatten_sites(&flat), Some(sites));
    }

    #[test]
    fn unflatten_rejects_partial_sites() {
        assert_eq!(unflatten_sites(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn validate_accepts_consistent_definition() {
        assert_eq!(definition().validate(2), Ok(()));
        assert_eq!(definition().validate_atoms(3), Ok(()));
    }

    #[test]
    fn validate_reports_unplaced_and_unknown_sites() {
        assert_eq!(
            definition().validate(3),
            Err(ReplicationError::UnplacedSite(2))
        );
        assert_eq!(
            definition().validate(1),
            Err(ReplicationError::UnknownSite {
                replica: 1,
                site: 1
            })
        );
    }

    #[test]
    fn validate_atoms_reports_out_of_range_frame_atom() {
        assert_eq!(
            definition().validate_atoms(2),
            Err(ReplicationError::AtomOutOfRange {
                frame: 0,
                atom: 2,
                atom_count: 2
            })
        );
    }

    #[test]
    fn load_parses_toml_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.toml");
        fs::write(
            &path,
            r#"
            [[frames]]
            atoms = [0, 1, 2]

            [[replicas]]
            site = 0
            frame = 0
            "#,
        )
        .unwrap();
        let def = ReplicationDefinition::load(&path).unwrap();
        assert_eq!(def.replicas[0].anchor, 0);
        assert!(!def.replicas[0].mirror);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.toml");
        definition().save(&path).unwrap();
        assert_eq!(ReplicationDefinition::load(&path).unwrap(), definition());
    }

    #[test]
    fn load_fails_for_unknown_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[[frames]]\natoms = [0, 1, 2]\nweight = 2.0\n").unwrap();
        let result = ReplicationDefinition::load(&path);
        assert!(matches!(result, Err(ReplicationLoadError::Toml { .. })));
    }
}

use super::molecule::Molecule;
use crate::core::utils::geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("An internal coordinate needs 2 to 4 atoms, got {0}")]
    InvalidAtomCount(usize),
    #[error("Internal coordinate {0} references the same atom more than once")]
    RepeatedAtom(InternalCoordinate),
    #[error("Atom index {index} is out of range for a molecule with {atom_count} atoms")]
    AtomOutOfRange { index: usize, atom_count: usize },
    #[error("Cannot set {coordinate} to {value}: the geometry is degenerate")]
    Degenerate {
        coordinate: InternalCoordinate,
        value: f64,
    },
}

/// A scanned degree of freedom, defined by zero-based atom indices.
///
/// Bond values are in Angstroms, angle and dihedral values in degrees. When a
/// value is applied, only the last atom of the definition is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub enum InternalCoordinate {
    Bond(usize, usize),
    Angle(usize, usize, usize),
    Dihedral(usize, usize, usize, usize),
}

impl InternalCoordinate {
    pub fn from_atoms(atoms: &[usize]) -> Result<Self, CoordinateError> {
        let coordinate = match *atoms {
            [a, b] => Self::Bond(a, b),
            [a, b, c] => Self::Angle(a, b, c),
            [a, b, c, d] => Self::Dihedral(a, b, c, d),
            _ => return Err(CoordinateError::InvalidAtomCount(atoms.len())),
        };
        let unique: HashSet<_> = atoms.iter().collect();
        if unique.len() != atoms.len() {
            return Err(CoordinateError::RepeatedAtom(coordinate));
        }
        Ok(coordinate)
    }

    pub fn atoms(&self) -> Vec<usize> {
        match *self {
            Self::Bond(a, b) => vec![a, b],
            Self::Angle(a, b, c) => vec![a, b, c],
            Self::Dihedral(a, b, c, d) => vec![a, b, c, d],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bond(..) => "bond",
            Self::Angle(..) => "angle",
            Self::Dihedral(..) => "dihedral",
        }
    }

    pub fn validate_for(&self, molecule: &Molecule) -> Result<(), CoordinateError> {
        for index in self.atoms() {
            if index >= molecule.len() {
                return Err(CoordinateError::AtomOutOfRange {
                    index,
                    atom_count: molecule.len(),
                });
            }
        }
        Ok(())
    }

    pub fn measure(&self, molecule: &Molecule) -> Result<f64, CoordinateError> {
        self.validate_for(molecule)?;
        let p = molecule.positions();
        Ok(match *self {
            Self::Bond(a, b) => geometry::distance(&p[a], &p[b]),
            Self::Angle(a, b, c) => geometry::angle_degrees(&p[a], &p[b], &p[c]),
            Self::Dihedral(a, b, c, d) => geometry::dihedral_degrees(&p[a], &p[b], &p[c], &p[d]),
        })
    }

    pub fn apply(&self, molecule: &mut Molecule, value: f64) -> Result<(), CoordinateError> {
        self.validate_for(molecule)?;
        let p = molecule.positions();
        let (moved_index, placed) = match *self {
            Self::Bond(a, b) => (b, geometry::place_at_distance(&p[a], &p[b], value)),
            Self::Angle(a, b, c) => (c, geometry::place_at_angle(&p[a], &p[b], &p[c], value)),
            Self::Dihedral(a, b, c, d) => (
                d,
                geometry::place_at_dihedral(&p[a], &p[b], &p[c], &p[d], value),
            ),
        };
        let placed = placed.ok_or(CoordinateError::Degenerate {
            coordinate: *self,
            value,
        })?;
        molecule.set_position(moved_index, placed);
        Ok(())
    }
}

impl TryFrom<Vec<usize>> for InternalCoordinate {
    type Error = CoordinateError;

    fn try_from(atoms: Vec<usize>) -> Result<Self, Self::Error> {
        Self::from_atoms(&atoms)
    }
}

impl From<InternalCoordinate> for Vec<usize> {
    fn from(coordinate: InternalCoordinate) -> Self {
        coordinate.atoms()
    }
}

impl fmt::Display for InternalCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let atoms: Vec<String> = self.atoms().iter().map(|a| a.to_string()).collect();
        write!(f, "{}({})", self.kind(), atoms.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::Atom;
    use nalgebra::Point3;

    fn thiocyanate() -> Molecule {
        Molecule::new(vec![
            Atom::new("S", 16, Point3::new(0.0, 0.0, 0.0)),
            Atom::new("C", 6, Point3::new(1.68, 0.0, 0.0)),
            Atom::new("N", 7, Point3::new(2.85, 0.01, 0.0)),
        ])
    }

    #[test]
    fn from_atoms_maps_atom_count_to_kind() {
        assert_eq!(
            InternalCoordinate::from_atoms(&[0, 1]),
            Ok(InternalCoordinate::Bond(0, 1))
        );
        assert_eq!(
            InternalCoordinate::from_atoms(&[0, 1, 2]),
            Ok(InternalCoordinate::Angle(0, 1, 2))
        );
        assert_eq!(
            InternalCoordinate::from_atoms(&[3, 0, 1, 2]),
            Ok(InternalCoordinate::Dihedral(3, 0, 1, 2))
        );
    }

    #[test]
    fn from_atoms_rejects_bad_definitions() {
        assert_eq!(
            InternalCoordinate::from_atoms(&[0]),
            Err(CoordinateError::InvalidAtomCount(1))
        );
        assert_eq!(
            InternalCoordinate::from_atoms(&[0, 1, 2, 3, 4]),
            Err(CoordinateError::InvalidAtomCount(5))
        );
        assert!(matches!(
            InternalCoordinate::from_atoms(&[0, 1, 0]),
            Err(CoordinateError::RepeatedAtom(_))
        ));
    }

    #[test]
    fn apply_then_measure_returns_requested_value() {
        let mut mol = thiocyanate();
        let angle = InternalCoordinate::Angle(0, 1, 2);
        angle.apply(&mut mol, 163.0).unwrap();
        assert!((angle.measure(&mol).unwrap() - 163.0).abs() < 1e-6);

        let bond = InternalCoordinate::Bond(0, 1);
        bond.apply(&mut mol, 1.70).unwrap();
        assert!((bond.measure(&mol).unwrap() - 1.70).abs() < 1e-9);
    }

    #[test]
    fn apply_moves_only_the_last_atom() {
        let mut mol = thiocyanate();
        let before = mol.clone();
        InternalCoordinate::Angle(0, 1, 2)
            .apply(&mut mol, 150.0)
            .unwrap();
        assert_eq!(mol.position(0), before.position(0));
        assert_eq!(mol.position(1), before.position(1));
        assert_ne!(mol.position(2), before.position(2));
    }

    #[test]
    fn validate_rejects_out_of_range_atoms() {
        let mol = thiocyanate();
        let result = InternalCoordinate::Bond(0, 7).measure(&mol);
        assert_eq!(
            result,
            Err(CoordinateError::AtomOutOfRange {
                index: 7,
                atom_count: 3
            })
        );
    }

    #[test]
    fn display_lists_kind_and_atoms() {
        assert_eq!(
            InternalCoordinate::Dihedral(0, 1, 2, 3).to_string(),
            "dihedral(0-1-2-3)"
        );
    }
}

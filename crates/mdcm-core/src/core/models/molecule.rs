use nalgebra::Point3;

/// A single atom of a molecule with its Cartesian position in Angstroms.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The element symbol as written in the source file (e.g., "S", "Cl").
    pub element: String,
    /// The atomic number resolved from the element symbol.
    pub atomic_number: u8,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    pub fn new(element: &str, atomic_number: u8, position: Point3<f64>) -> Self {
        Self {
            element: element.to_string(),
            atomic_number,
            position,
        }
    }
}

/// An ordered collection of atoms.
///
/// Atom indices used throughout the crate (degree-of-freedom definitions,
/// local frame definitions) are zero-based positions into this collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    atoms: Vec<Atom>,
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn position(&self, index: usize) -> Option<Point3<f64>> {
        self.atoms.get(index).map(|a| a.position)
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn set_position(&mut self, index: usize, position: Point3<f64>) -> bool {
        match self.atoms.get_mut(index) {
            Some(atom) => {
                atom.position = position;
                true
            }
            None => false,
        }
    }
}

use super::traits::FormatFile;
use crate::core::models::molecule::{Atom, Molecule};
use crate::core::utils::elements;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Expected {expected} atoms but found {found}")]
    AtomCountMismatch { expected: usize, found: usize },
}

/// The standard XYZ format: atom count, comment line, one `El x y z` line per atom.
pub struct XyzFile;

impl FormatFile for XyzFile {
    type Data = Molecule;
    /// The comment line.
    type Metadata = String;
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Molecule, String), XyzError> {
        let mut lines = reader.lines();

        let count_line = lines.next().transpose()?.ok_or_else(|| XyzError::Parse {
            line: 1,
            message: "file is empty".into(),
        })?;
        let expected: usize = count_line.trim().parse().map_err(|_| XyzError::Parse {
            line: 1,
            message: format!("invalid atom count '{}'", count_line.trim()),
        })?;
        let comment = lines.next().transpose()?.unwrap_or_default();

        let mut atoms = Vec::with_capacity(expected);
        for (offset, line_res) in lines.enumerate() {
            let line = line_res?;
            let line_num = offset + 3;
            if line.trim().is_empty() {
                continue;
            }
            if atoms.len() == expected {
                break;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return Err(XyzError::Parse {
                    line: line_num,
                    message: "expected 'element x y z'".into(),
                });
            }
            let atomic_number = parts[0]
                .parse::<u8>()
                .ok()
                .filter(|z| elements::element_symbol(*z).is_some())
                .or_else(|| elements::atomic_number(parts[0]))
                .ok_or_else(|| XyzError::Parse {
                    line: line_num,
                    message: format!("unknown element '{}'", parts[0]),
                })?;
            let element = elements::element_symbol(atomic_number).unwrap_or(parts[0]);
            let mut coords = [0.0; 3];
            for (k, value) in parts[1..4].iter().enumerate() {
                coords[k] = value.parse().map_err(|_| XyzError::Parse {
                    line: line_num,
                    message: format!("invalid coordinate '{}'", value),
                })?;
            }
            atoms.push(Atom::new(
                element,
                atomic_number,
                Point3::new(coords[0], coords[1], coords[2]),
            ));
        }

        if atoms.len() != expected {
            return Err(XyzError::AtomCountMismatch {
                expected,
                found: atoms.len(),
            });
        }
        Ok((Molecule::new(atoms), comment))
    }

    fn write_to(
        molecule: &Molecule,
        comment: &String,
        writer: &mut impl Write,
    ) -> Result<(), XyzError> {
        writeln!(writer, "{}", molecule.len())?;
        writeln!(writer, "{}", comment)?;
        for atom in molecule.atoms() {
            writeln!(
                writer,
                "{:<3}{:>16.8}{:>16.8}{:>16.8}",
                atom.element, atom.position.x, atom.position.y, atom.position.z
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    const SCN: &str = "3\nthiocyanate anion\nS 0.0 0.0 0.0\nC 1.68 0.0 0.0\nN 2.85 0.0 0.0\n";

    #[test]
    fn read_parses_atoms_and_comment() {
        let (mol, comment) = XyzFile::read_from(&mut Cursor::new(SCN)).unwrap();
        assert_eq!(comment, "thiocyanate anion");
        assert_eq!(mol.len(), 3);
        assert_eq!(mol.atoms()[0].atomic_number, 16);
        assert_eq!(mol.atoms()[2].element, "N");
        assert_eq!(mol.position(1), Some(Point3::new(1.68, 0.0, 0.0)));
    }

    #[test]
    fn read_accepts_atomic_numbers_as_elements() {
        let content = "1\n\n8 0.0 0.0 0.5\n";
        let (mol, _) = XyzFile::read_from(&mut Cursor::new(content)).unwrap();
        assert_eq!(mol.atoms()[0].element, "O");
    }

    #[test]
    fn read_fails_for_unknown_element() {
        let content = "1\n\nQq 0.0 0.0 0.0\n";
        let result = XyzFile::read_from(&mut Cursor::new(content));
        assert!(matches!(result, Err(XyzError::Parse { line: 3, .. })));
    }

    #[test]
    fn read_fails_when_atom_count_is_short() {
        let content = "3\n\nS 0.0 0.0 0.0\n";
        let result = XyzFile::read_from(&mut Cursor::new(content));
        assert!(matches!(
            result,
            Err(XyzError::AtomCountMismatch {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn write_then_read_preserves_positions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scn.xyz");
        let (mol, comment) = XyzFile::read_from(&mut Cursor::new(SCN)).unwrap();
        XyzFile::write_to_path(&mol, &comment, &path).unwrap();
        let (reread, reread_comment) = XyzFile::read_from_path(&path).unwrap();
        assert_eq!(reread_comment, comment);
        for (a, b) in mol.atoms().iter().zip(reread.atoms()) {
            assert!((a.position - b.position).norm() < 1e-8);
            assert_eq!(a.element, b.element);
        }
    }
}

use super::traits::FormatFile;
use crate::core::models::molecule::{Atom, Molecule};
use crate::core::electrostatics::units::BOHR_TO_ANGSTROM;
use crate::core::utils::elements;
use nalgebra::{Point3, Vector3};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CubeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Expected {expected} grid values but found {found}")]
    ValueCountMismatch { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CubeAtom {
    pub atomic_number: u8,
    pub nuclear_charge: f64,
    /// Position in bohr.
    pub position: Point3<f64>,
}

/// A scalar field sampled on a regular, possibly non-orthogonal lattice.
///
/// All lengths are stored in bohr regardless of the unit flag of the file the
/// grid was read from. Values are stored in file order: the first axis varies
/// slowest and the third axis fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeGrid {
    pub origin: Point3<f64>,
    pub axes: [Vector3<f64>; 3],
    pub shape: [usize; 3],
    pub atoms: Vec<CubeAtom>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CubeMetadata {
    pub title: String,
    pub description: String,
}

impl CubeGrid {
    pub fn num_points(&self) -> usize {
        self.shape.iter().product()
    }

    /// Cartesian position (bohr) of the grid point with the given flat index.
    pub fn point(&self, flat_index: usize) -> Point3<f64> {
        let [_, n2, n3] = self.shape;
        let i = flat_index / (n2 * n3);
        let j = (flat_index / n3) % n2;
        let k = flat_index % n3;
        self.origin + self.axes[0] * i as f64 + self.axes[1] * j as f64 + self.axes[2] * k as f64
    }

    pub fn same_lattice(&self, other: &CubeGrid) -> bool {
        const TOL: f64 = 1e-6;
        self.shape == other.shape
            && (self.origin - other.origin).norm() < TOL
            && self
                .axes
                .iter()
                .zip(other.axes.iter())
                .all(|(a, b)| (a - b).norm() < TOL)
    }

    /// The molecule embedded in the cube header, converted to Angstroms.
    pub fn molecule(&self) -> Molecule {
        Molecule::new(
            self.atoms
                .iter()
                .map(|a| {
                    Atom::new(
                        elements::element_symbol(a.atomic_number).unwrap_or("X"),
                        a.atomic_number,
                        a.position * BOHR_TO_ANGSTROM,
                    )
                })
                .collect(),
        )
    }

    /// Returns a grid with the same lattice and atoms but new values.
    pub fn with_values(&self, values: Vec<f64>) -> CubeGrid {
        CubeGrid {
            origin: self.origin,
            axes: self.axes,
            shape: self.shape,
            atoms: self.atoms.clone(),
            values,
        }
    }
}

fn parse_fields<T: std::str::FromStr>(
    line: &str,
    line_num: usize,
    count: usize,
) -> Result<Vec<T>, CubeError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < count {
        return Err(CubeError::Parse {
            line: line_num,
            message: format!("expected at least {} fields, found {}", count, parts.len()),
        });
    }
    parts[..count]
        .iter()
        .map(|p| {
            p.parse::<T>().map_err(|_| CubeError::Parse {
                line: line_num,
                message: format!("invalid number '{}'", p),
            })
        })
        .collect()
}

fn parse_value(token: &str, line_num: usize) -> Result<f64, CubeError> {
    token
        .replace(['D', 'd'], "E")
        .parse()
        .map_err(|_| CubeError::Parse {
            line: line_num,
            message: format!("invalid grid value '{}'", token),
        })
}

/// The Gaussian cube text format.
pub struct CubeFile;

impl FormatFile for CubeFile {
    type Data = CubeGrid;
    type Metadata = CubeMetadata;
    type Error = CubeError;

    fn read_from(reader: &mut impl BufRead) -> Result<(CubeGrid, CubeMetadata), CubeError> {
        let mut lines = reader.lines().enumerate();
        let mut next_line = |what: &str| -> Result<(usize, String), CubeError> {
            match lines.next() {
                Some((idx, line)) => Ok((idx + 1, line?)),
                None => Err(CubeError::Parse {
                    line: 0,
                    message: format!("unexpected end of file while reading {}", what),
                }),
            }
        };

        let (_, title) = next_line("title")?;
        let (_, description) = next_line("description")?;

        let (num, line) = next_line("atom count")?;
        let header: Vec<f64> = parse_fields(&line, num, 4)?;
        let signed_atoms = header[0] as i64;
        let origin = Point3::new(header[1], header[2], header[3]);

        let mut shape = [0usize; 3];
        let mut axes = [Vector3::zeros(); 3];
        let mut angstrom = false;
        for axis in 0..3 {
            let (num, line) = next_line("grid axis")?;
            let fields: Vec<f64> = parse_fields(&line, num, 4)?;
            let count = fields[0] as i64;
            if count == 0 {
                return Err(CubeError::Parse {
                    line: num,
                    message: "grid axis has zero points".into(),
                });
            }
            angstrom |= count < 0;
            shape[axis] = count.unsigned_abs() as usize;
            axes[axis] = Vector3::new(fields[1], fields[2], fields[3]);
        }
        let unit = if angstrom { 1.0 / BOHR_TO_ANGSTROM } else { 1.0 };

        let mut atoms = Vec::with_capacity(signed_atoms.unsigned_abs() as usize);
        for _ in 0..signed_atoms.unsigned_abs() {
            let (num, line) = next_line("atom record")?;
            let fields: Vec<f64> = parse_fields(&line, num, 5)?;
            atoms.push(CubeAtom {
                atomic_number: fields[0] as u8,
                nuclear_charge: fields[1],
                position: Point3::new(fields[2], fields[3], fields[4]) * unit,
            });
        }
        if signed_atoms < 0 {
            next_line("orbital index record")?;
        }

        let expected: usize = shape.iter().product();
        let mut values = Vec::with_capacity(expected);
        for (idx, line) in lines {
            let line = line?;
            for token in line.split_whitespace() {
                values.push(parse_value(token, idx + 1)?);
            }
        }
        if values.len() != expected {
            return Err(CubeError::ValueCountMismatch {
                expected,
                found: values.len(),
            });
        }

        let grid = CubeGrid {
            origin: origin * unit,
            axes: axes.map(|a| a * unit),
            shape,
            atoms,
            values,
        };
        Ok((grid, CubeMetadata { title, description }))
    }

    fn write_to(
        grid: &CubeGrid,
        metadata: &CubeMetadata,
        writer: &mut impl Write,
    ) -> Result<(), CubeError> {
        writeln!(writer, "{}", metadata.title)?;
        writeln!(writer, "{}", metadata.description)?;
        writeln!(
            writer,
            "{:5}{:12.6}{:12.6}{:12.6}",
            grid.atoms.len(),
            grid.origin.x,
            grid.origin.y,
            grid.origin.z
        )?;
        for (n, axis) in grid.shape.iter().zip(grid.axes.iter()) {
            writeln!(
                writer,
                "{:5}{:12.6}{:12.6}{:12.6}",
                n, axis.x, axis.y, axis.z
            )?;
        }
        for atom in &grid.atoms {
            writeln!(
                writer,
                "{:5}{:12.6}{:12.6}{:12.6}{:12.6}",
                atom.atomic_number,
                atom.nuclear_charge,
                atom.position.x,
                atom.position.y,
                atom.position.z
            )?;
        }
        let row = grid.shape[2];
        for chunk in grid.values.chunks(row.max(1)) {
            for (col, value) in chunk.iter().enumerate() {
                write!(writer, "{:13.5E}", value)?;
                if col % 6 == 5 && col + 1 != chunk.len() {
                    writeln!(writer)?;
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn small_grid() -> CubeGrid {
        CubeGrid {
            origin: Point3::new(-1.0, -1.0, -1.0),
            axes: [
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 0.5),
            ],
            shape: [2, 2, 7],
            atoms: vec![CubeAtom {
                atomic_number: 8,
                nuclear_charge: 8.0,
                position: Point3::origin(),
            }],
            values: (0..28).map(|v| v as f64 * 1.0e-3).collect(),
        }
    }

    #[test]
    fn point_maps_flat_index_with_last_axis_fastest() {
        let grid = small_grid();
        assert_eq!(grid.point(0), Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(grid.point(1), Point3::new(-1.0, -1.0, -0.5));
        assert_eq!(grid.point(7), Point3::new(-1.0, 0.0, -1.0));
        assert_eq!(grid.point(14), Point3::new(0.0, -1.0, -1.0));
    }

    #[test]
    fn write_then_read_preserves_grid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.cube");
        let grid = small_grid();
        let meta = CubeMetadata {
            title: "title".into(),
            description: "electrostatic potential".into(),
        };
        CubeFile::write_to_path(&grid, &meta, &path).unwrap();
        let (reread, reread_meta) = CubeFile::read_from_path(&path).unwrap();
        assert_eq!(reread_meta, meta);
        assert!(reread.same_lattice(&grid));
        assert_eq!(reread.atoms.len(), 1);
        for (a, b) in grid.values.iter().zip(reread.values.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn read_converts_angstrom_lattice_to_bohr() {
        let content = "t\nd\n    1    0.000000    0.000000    0.000000\n   -1    1.000000    0.000000    0.000000\n   -1    0.000000    1.000000    0.000000\n   -1    0.000000    0.000000    1.000000\n    1    1.000000    0.529177    0.000000    0.000000\n 1.0D-02\n";
        let (grid, _) = CubeFile::read_from(&mut Cursor::new(content)).unwrap();
        assert!((grid.axes[0].x - 1.0 / BOHR_TO_ANGSTROM).abs() < 1e-9);
        assert!((grid.atoms[0].position.x - 1.0).abs() < 1e-5);
        assert!((grid.values[0] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn read_fails_on_truncated_values() {
        let content = "t\nd\n    0    0.0    0.0    0.0\n    2    1.0    0.0    0.0\n    1    0.0    1.0    0.0\n    1    0.0    0.0    1.0\n 1.0E-02\n";
        let result = CubeFile::read_from(&mut Cursor::new(content));
        assert!(matches!(
            result,
            Err(CubeError::ValueCountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn molecule_converts_positions_to_angstrom() {
        let mut grid = small_grid();
        grid.atoms[0].position = Point3::new(1.0, 0.0, 0.0);
        let mol = grid.molecule();
        assert_eq!(mol.atoms()[0].element, "O");
        assert!((mol.position(0).unwrap().x - BOHR_TO_ANGSTROM).abs() < 1e-12);
    }
}

use super::config::{ConfigError, ScanConfig};
use super::error::EngineError;
use super::store::ScanPoint;
use crate::core::models::coordinate::{CoordinateError, InternalCoordinate};
use crate::core::models::molecule::Molecule;
use tracing::debug;

/// Binds the step sequences of all coordinates by position.
///
/// Step `i` takes the `i`-th value of every sequence, so `n` values per
/// coordinate give exactly `n` scan points regardless of how many coordinates
/// are scanned. This is a coupled scan, not a Cartesian product.
pub fn synchronized_steps(
    dofs: &[InternalCoordinate],
    steps: &[Vec<f64>],
) -> Result<Vec<Vec<f64>>, ConfigError> {
    if dofs.len() != steps.len() {
        return Err(ConfigError::DofStepMismatch {
            dofs: dofs.len(),
            steps: steps.len(),
        });
    }
    let expected = steps.first().map_or(0, |s| s.len());
    if let Some((index, seq)) = steps.iter().enumerate().find(|(_, s)| s.len() != expected) {
        return Err(ConfigError::UnequalStepLengths {
            index,
            expected,
            found: seq.len(),
        });
    }
    Ok((0..expected)
        .map(|i| steps.iter().map(|seq| seq[i]).collect())
        .collect())
}

/// Applies one value per coordinate, in coordinate order, to a copy of `base`.
pub fn constrained_geometry(
    base: &Molecule,
    dofs: &[InternalCoordinate],
    values: &[f64],
) -> Result<Molecule, CoordinateError> {
    let mut geometry = base.clone();
    for (dof, &value) in dofs.iter().zip(values) {
        dof.apply(&mut geometry, value)?;
    }
    Ok(geometry)
}

/// Produces the ordered scan points for a configuration and its input geometry.
pub fn enumerate(config: &ScanConfig, base: &Molecule) -> Result<Vec<ScanPoint>, EngineError> {
    for dof in &config.dofs {
        dof.validate_for(base)
            .map_err(|source| EngineError::Coordinate { index: 0, source })?;
    }
    let rows = synchronized_steps(&config.dofs, &config.steps)?;
    rows.into_iter()
        .enumerate()
        .map(|(index, values)| {
            let geometry = constrained_geometry(base, &config.dofs, &values)
                .map_err(|source| EngineError::Coordinate { index, source })?;
            debug!(index, ?values, "Enumerated scan point.");
            Ok(ScanPoint::new(index, values, geometry))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::Atom;
    use crate::engine::config::tests::scn_builder;
    use crate::engine::store::PointStatus;
    use nalgebra::Point3;

    fn scn() -> Molecule {
        Molecule::new(vec![
            Atom::new("S", 16, Point3::new(0.0, 0.0, 0.0)),
            Atom::new("C", 6, Point3::new(1.68, 0.0, 0.0)),
            Atom::new("N", 7, Point3::new(2.85, 0.02, 0.0)),
        ])
    }

    #[test]
    fn single_dof_yields_one_point_per_step_in_order() {
        let config = scn_builder().build().unwrap();
        let points = enumerate(&config, &scn()).unwrap();
        assert_eq!(points.len(), 3);
        let values: Vec<f64> = points.iter().map(|p| p.dof_values[0]).collect();
        assert_eq!(values, vec![179.0, 175.0, 171.0]);
        assert!(points.iter().all(|p| p.status == PointStatus::Pending));
        assert_eq!(
            points.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn enumerated_geometries_carry_the_requested_values() {
        let config = scn_builder().build().unwrap();
        let points = enumerate(&config, &scn()).unwrap();
        for point in &points {
            let measured = config.dofs[0].measure(&point.geometry).unwrap();
            assert!((measured - point.dof_values[0]).abs() < 1e-6);
        }
    }

    #[test]
    fn multiple_dofs_are_bound_by_index_not_combined() {
        let dofs = [
            InternalCoordinate::Angle(0, 1, 2),
            InternalCoordinate::Bond(0, 1),
        ];
        let steps = vec![vec![179.0, 175.0, 171.0], vec![1.60, 1.65, 1.70]];
        let rows = synchronized_steps(&dofs, &steps).unwrap();
        assert_eq!(
            rows,
            vec![vec![179.0, 1.60], vec![175.0, 1.65], vec![171.0, 1.70]]
        );
    }

    #[test]
    fn unequal_step_lengths_are_a_config_error() {
        let dofs = [
            InternalCoordinate::Angle(0, 1, 2),
            InternalCoordinate::Bond(0, 1),
        ];
        let steps = vec![vec![179.0, 175.0], vec![1.60]];
        assert!(matches!(
            synchronized_steps(&dofs, &steps),
            Err(ConfigError::UnequalStepLengths { .. })
        ));
    }

    #[test]
    fn dof_step_count_mismatch_is_a_config_error() {
        let dofs = [InternalCoordinate::Angle(0, 1, 2)];
        assert!(matches!(
            synchronized_steps(&dofs, &[]),
            Err(ConfigError::DofStepMismatch { dofs: 1, steps: 0 })
        ));
    }

    #[test]
    fn enumerate_rejects_dofs_outside_the_molecule() {
        let config = scn_builder()
            .dofs(vec![InternalCoordinate::Angle(0, 1, 5)])
            .build()
            .unwrap();
        assert!(matches!(
            enumerate(&config, &scn()),
            Err(EngineError::Coordinate { .. })
        ));
    }
}

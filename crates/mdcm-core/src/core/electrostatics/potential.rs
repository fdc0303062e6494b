use nalgebra::Point3;

const MIN_DISTANCE_BOHR: f64 = 1e-6;

/// A point charge in atomic units (position in bohr, charge in e).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCharge {
    pub position: Point3<f64>,
    pub charge: f64,
}

/// Coulomb potential of a single charge at distance `dist` (bohr), in Hartree/e.
#[inline]
pub fn coulomb_potential(dist: f64, charge: f64) -> f64 {
    if dist < MIN_DISTANCE_BOHR {
        return charge.signum() * 1e10;
    }
    charge / dist
}

/// Electrostatic potential of a set of point charges at `point`, in Hartree/e.
///
/// Charges are summed in slice order, so a given input always produces the
/// same floating-point result.
#[inline]
pub fn potential_at(charges: &[PointCharge], point: &Point3<f64>) -> f64 {
    charges
        .iter()
        .map(|q| coulomb_potential((point - q.position).norm(), q.charge))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn coulomb_potential_is_charge_over_distance() {
        assert!(f64_approx_equal(coulomb_potential(2.0, 1.0), 0.5));
        assert!(f64_approx_equal(coulomb_potential(4.0, -1.0), -0.25));
    }

    #[test]
    fn coulomb_potential_caps_singularity_with_sign() {
        assert!(f64_approx_equal(coulomb_potential(0.0, 0.3), 1e10));
        assert!(f64_approx_equal(coulomb_potential(1e-9, -0.3), -1e10));
    }

    #[test]
    fn potential_at_superposes_charges() {
        let charges = [
            PointCharge {
                position: Point3::new(1.0, 0.0, 0.0),
                charge: 1.0,
            },
            PointCharge {
                position: Point3::new(-1.0, 0.0, 0.0),
                charge: -1.0,
            },
        ];
        assert!(f64_approx_equal(potential_at(&charges, &Point3::origin()), 0.0));
        let v = potential_at(&charges, &Point3::new(2.0, 0.0, 0.0));
        assert!(f64_approx_equal(v, 1.0 - 1.0 / 3.0));
    }
}

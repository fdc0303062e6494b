use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};

const DEGENERACY_EPS: f64 = 1e-8;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Returns some unit vector perpendicular to `v`.
pub fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let n = v.normalize();
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (helper - n * n.dot(&helper)).normalize()
}

pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

/// Angle a-b-c in degrees, with `b` as the vertex.
pub fn angle_degrees(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let u = a - b;
    let v = c - b;
    let cos = (u.dot(&v) / (u.norm() * v.norm())).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Dihedral a-b-c-d in degrees, in the range (-180, 180].
pub fn dihedral_degrees(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let x = n1.dot(&n2);
    let y = b2.norm() * b1.dot(&n2);
    y.atan2(x).to_degrees()
}

/// Moves `moving` along the `fixed -> moving` axis so the distance equals `length`.
pub fn place_at_distance(
    fixed: &Point3<f64>,
    moving: &Point3<f64>,
    length: f64,
) -> Option<Point3<f64>> {
    let axis = moving - fixed;
    if axis.norm() < DEGENERACY_EPS {
        return None;
    }
    Some(fixed + axis.normalize() * length)
}

/// Rotates `c` about `b` within the a-b-c plane so the a-b-c angle equals `target_degrees`.
///
/// For a collinear arrangement the rotation plane is arbitrary; an axis
/// perpendicular to the b-c bond is chosen.
pub fn place_at_angle(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    target_degrees: f64,
) -> Option<Point3<f64>> {
    let u = a - b;
    let v = c - b;
    if u.norm() < DEGENERACY_EPS || v.norm() < DEGENERACY_EPS {
        return None;
    }
    let normal = u.cross(&v);
    let axis = if normal.norm() < DEGENERACY_EPS {
        any_perpendicular(&v)
    } else {
        normal
    };
    let current = angle_degrees(a, b, c);
    let rotation = rotation_from_axis_angle(&axis, target_degrees - current);
    Some(b + rotation * v)
}

/// Rotates `d` about the b-c axis so the a-b-c-d dihedral equals `target_degrees`.
pub fn place_at_dihedral(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    target_degrees: f64,
) -> Option<Point3<f64>> {
    let axis = c - b;
    if axis.norm() < DEGENERACY_EPS {
        return None;
    }
    let current = dihedral_degrees(a, b, c, d);
    let rotation = rotation_from_axis_angle(&axis, target_degrees - current);
    Some(c + rotation * (d - c))
}

/// Builds an orthonormal local axis system from three points.
///
/// The returned matrix has the frame axes as columns `(ex, ey, ez)` with
/// `ez` along `b -> a` and `ey` normal to the a-b-c plane. A degenerate plane
/// falls back to an arbitrary perpendicular for `ey`.
pub fn local_frame(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Matrix3<f64>> {
    let z_raw = a - b;
    if z_raw.norm() < DEGENERACY_EPS {
        return None;
    }
    let ez = z_raw.normalize();
    let y_raw = ez.cross(&(c - b));
    let ey = if y_raw.norm() < DEGENERACY_EPS {
        any_perpendicular(&ez)
    } else {
        y_raw.normalize()
    };
    let ex = ey.cross(&ez);
    Some(Matrix3::from_columns(&[ex, ey, ez]))
}

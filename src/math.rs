// math.rs — rotation-matrix and orientation math shared by the fusion paths.
//
// Conventions match the platform sensor stack the raw samples come from:
// device coordinates are x right, y top, z out of the screen; the world
// frame is x east, y magnetic north, z up. Azimuth grows clockwise from
// north.

use nalgebra::{Matrix3, Vector3};

/// Gravity magnitude below which the device is treated as in free fall.
const FREE_FALL_GRAVITY_SQUARED: f64 = 0.01 * 9.81 * 9.81;

/// Rotation matrix aligning the device frame with the world frame, derived
/// from a gravity vector and a geomagnetic field vector.
///
/// Returns `None` for degenerate input: free fall, or a field close to
/// colinear with gravity (device near a magnetic pole).
pub fn rotation_matrix(
    gravity: Vector3<f64>,
    geomagnetic: Vector3<f64>,
) -> Option<Matrix3<f64>> {
    if gravity.norm_squared() < FREE_FALL_GRAVITY_SQUARED {
        return None;
    }

    // Horizontal east axis: field x gravity
    let h = geomagnetic.cross(&gravity);
    let norm_h = h.norm();
    if norm_h < 0.1 {
        return None;
    }
    let h = h / norm_h;
    let a = gravity.normalize();
    // North axis completes the right-handed basis
    let m = a.cross(&h);

    Some(Matrix3::new(
        h.x, h.y, h.z, //
        m.x, m.y, m.z, //
        a.x, a.y, a.z,
    ))
}

/// Azimuth, pitch and roll in radians extracted from a rotation matrix.
pub fn orientation_angles(r: &Matrix3<f64>) -> [f64; 3] {
    let azimuth = r[(0, 1)].atan2(r[(1, 1)]);
    let pitch = (-r[(2, 1)]).asin();
    let roll = (-r[(2, 0)]).atan2(r[(2, 2)]);
    [azimuth, pitch, roll]
}

/// Rotation matrix from a rotation-vector sample: unit quaternion components
/// x, y, z, w, with an optional fifth accuracy component that is ignored.
/// When only three components are present, w is reconstructed from the unit
/// norm.
pub fn rotation_matrix_from_vector(rv: &[f64]) -> Matrix3<f64> {
    let q1 = rv[0];
    let q2 = rv[1];
    let q3 = rv[2];
    let q0 = if rv.len() >= 4 {
        rv[3]
    } else {
        (1.0 - q1 * q1 - q2 * q2 - q3 * q3).max(0.0).sqrt()
    };

    let sq_q1 = 2.0 * q1 * q1;
    let sq_q2 = 2.0 * q2 * q2;
    let sq_q3 = 2.0 * q3 * q3;
    let q1_q2 = 2.0 * q1 * q2;
    let q3_q0 = 2.0 * q3 * q0;
    let q1_q3 = 2.0 * q1 * q3;
    let q2_q0 = 2.0 * q2 * q0;
    let q2_q3 = 2.0 * q2 * q3;
    let q1_q0 = 2.0 * q1 * q0;

    Matrix3::new(
        1.0 - sq_q2 - sq_q3,
        q1_q2 - q3_q0,
        q1_q3 + q2_q0,
        q1_q2 + q3_q0,
        1.0 - sq_q1 - sq_q3,
        q2_q3 - q1_q0,
        q1_q3 - q2_q0,
        q2_q3 + q1_q0,
        1.0 - sq_q1 - sq_q2,
    )
}

/// Normalize a heading into [0, 360) by repeated wrapping. Non-finite input
/// is returned unchanged.
pub fn normalize_heading_degrees(mut degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return degrees;
    }
    while degrees < 0.0 {
        degrees += 360.0;
    }
    while degrees >= 360.0 {
        degrees -= 360.0;
    }
    degrees
}

//! Scalar-first quaternion and rotation-matrix utilities.
//!
//! Quaternions are stored `[s, v1, v2, v3]` with the scalar first. Matrices
//! are row-major `[m00, m01, m02, m10, ...]` and transform column vectors on
//! the right. These are the conventions used by the vehicle-dynamics links.

/// Renormalization is skipped when the squared norm is within this distance
/// of one; tighter renormalization just churns the low bits.
pub const QUAT_NORM_TOLERANCE: f64 = 0.000_000_238_42;

/// Quaternion magnitude.
pub fn quat_norm(q: &[f64; 4]) -> f64 {
    (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt()
}

/// Normalize `q` in place when its norm has drifted beyond the tolerance.
/// Leaves a zero quaternion untouched rather than dividing by zero.
pub fn normalize_quat(q: &mut [f64; 4]) {
    let norm_sq = q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3];
    if norm_sq <= f64::EPSILON {
        return;
    }
    if (norm_sq - 1.0).abs() > QUAT_NORM_TOLERANCE {
        let inv = 1.0 / norm_sq.sqrt();
        for c in q.iter_mut() {
            *c *= inv;
        }
    }
}

/// Hamilton product `a * b` (scalar-first).
pub fn quat_multiply(a: &[f64; 4], b: &[f64; 4]) -> [f64; 4] {
    [
        a[0] * b[0] - a[1] * b[1] - a[2] * b[2] - a[3] * b[3],
        a[0] * b[1] + a[1] * b[0] + a[2] * b[3] - a[3] * b[2],
        a[0] * b[2] - a[1] * b[3] + a[2] * b[0] + a[3] * b[1],
        a[0] * b[3] + a[1] * b[2] - a[2] * b[1] + a[3] * b[0],
    ]
}

/// Quaternion conjugate.
pub fn quat_conjugate(q: &[f64; 4]) -> [f64; 4] {
    [q[0], -q[1], -q[2], -q[3]]
}

/// Build the 3x3 matrix corresponding to unit quaternion `q`.
pub fn quat_to_matrix(q: &[f64; 4]) -> [f64; 9] {
    let (s, v1, v2, v3) = (q[0], q[1], q[2], q[3]);
    [
        s * s + v1 * v1 - v2 * v2 - v3 * v3,
        2.0 * (v1 * v2 + s * v3),
        2.0 * (v1 * v3 - s * v2),
        2.0 * (v1 * v2 - s * v3),
        s * s - v1 * v1 + v2 * v2 - v3 * v3,
        2.0 * (v2 * v3 + s * v1),
        2.0 * (v1 * v3 + s * v2),
        2.0 * (v2 * v3 - s * v1),
        s * s - v1 * v1 - v2 * v2 + v3 * v3,
    ]
}

/// Recover the scalar-first quaternion from rotation matrix `m`.
///
/// Uses Shepperd's method: of the four squared components, divide by the
/// largest to avoid cancellation. The result equals the source quaternion up
/// to overall sign.
pub fn matrix_to_quat(m: &[f64; 9]) -> [f64; 4] {
    let trace = m[0] + m[4] + m[8];

    // Four times the squared components.
    let ss = 1.0 + trace;
    let v1s = 1.0 + 2.0 * m[0] - trace;
    let v2s = 1.0 + 2.0 * m[4] - trace;
    let v3s = 1.0 + 2.0 * m[8] - trace;

    if ss >= v1s && ss >= v2s && ss >= v3s {
        let s = 0.5 * ss.sqrt();
        let d = 0.25 / s;
        [
            s,
            (m[5] - m[7]) * d,
            (m[6] - m[2]) * d,
            (m[1] - m[3]) * d,
        ]
    } else if v1s >= v2s && v1s >= v3s {
        let v1 = 0.5 * v1s.sqrt();
        let d = 0.25 / v1;
        [
            (m[5] - m[7]) * d,
            v1,
            (m[1] + m[3]) * d,
            (m[2] + m[6]) * d,
        ]
    } else if v2s >= v3s {
        let v2 = 0.5 * v2s.sqrt();
        let d = 0.25 / v2;
        [
            (m[6] - m[2]) * d,
            (m[1] + m[3]) * d,
            v2,
            (m[5] + m[7]) * d,
        ]
    } else {
        let v3 = 0.5 * v3s.sqrt();
        let d = 0.25 / v3;
        [
            (m[1] - m[3]) * d,
            (m[2] + m[6]) * d,
            (m[5] + m[7]) * d,
            v3,
        ]
    }
}

/// Transform vector `v` by matrix `m`.
pub fn multiply_matrix_vector(m: &[f64; 9], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

/// Time derivative of quaternion `q` under body angular velocity `w` (rad/s).
pub fn quat_derivative(q: &[f64; 4], w: &[f64; 3]) -> [f64; 4] {
    [
        -0.5 * (q[1] * w[0] + q[2] * w[1] + q[3] * w[2]),
        0.5 * (q[0] * w[0] + q[2] * w[2] - q[3] * w[1]),
        0.5 * (q[0] * w[1] - q[1] * w[2] + q[3] * w[0]),
        0.5 * (q[0] * w[2] + q[1] * w[1] - q[2] * w[0]),
    ]
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn round_trip_up_to_sign(
            s in -1.0_f64..1.0,
            v1 in -1.0_f64..1.0,
            v2 in -1.0_f64..1.0,
            v3 in -1.0_f64..1.0,
        ) {
            let norm = (s * s + v1 * v1 + v2 * v2 + v3 * v3).sqrt();
            prop_assume!(norm > 1e-3);
            let q = [s / norm, v1 / norm, v2 / norm, v3 / norm];

            let recovered = matrix_to_quat(&quat_to_matrix(&q));
            let same: f64 = q.iter().zip(&recovered).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
            let flipped: f64 = q.iter().zip(&recovered).map(|(a, b)| (a + b).abs()).fold(0.0, f64::max);
            prop_assert!(same < 1e-13 || flipped < 1e-13);
        }
    }
}

//! Euler angle <-> quaternion conversion
//!
//! Two axis orders are supported, each with its own closed form:
//!
//! | order | matrix          | pitch axis | used by                      |
//! |-------|-----------------|------------|------------------------------|
//! | `Xyz` | `Rz * Ry * Rx`  | Y          | FBX `Lcl Rotation` (X first) |
//! | `Yxz` | `Ry * Rx * Rz`  | X          | PMX rigid bodies, MQO bones  |
//!
//! Angles are radians, stored as `(x, y, z)` regardless of order.

use glam::{DQuat, DVec3};
use std::f64::consts::FRAC_PI_2;

/// Distance of `|sin(pitch)|` from 1 below which the gimbal-lock branch is taken
pub const GIMBAL_LOCK_EPSILON: f64 = 1e-8;

/// Supported Euler axis orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EulerOrder {
    /// X applied first, then Y, then Z: `Rz * Ry * Rx`
    #[default]
    Xyz,
    /// `Ry * Rx * Rz`, i.e. heading / pitch / bank (mesh editor bones)
    Yxz,
}

/// Convert Euler angles to a unit quaternion
pub fn euler_to_quat(angles: DVec3, order: EulerOrder) -> DQuat {
    let (s1, c1) = (angles.x * 0.5).sin_cos();
    let (s2, c2) = (angles.y * 0.5).sin_cos();
    let (s3, c3) = (angles.z * 0.5).sin_cos();

    match order {
        EulerOrder::Xyz => DQuat::from_xyzw(
            s1 * c2 * c3 - c1 * s2 * s3,
            c1 * s2 * c3 + s1 * c2 * s3,
            c1 * c2 * s3 - s1 * s2 * c3,
            c1 * c2 * c3 + s1 * s2 * s3,
        ),
        EulerOrder::Yxz => DQuat::from_xyzw(
            s1 * c2 * c3 + c1 * s2 * s3,
            c1 * s2 * c3 - s1 * c2 * s3,
            c1 * c2 * s3 - s1 * s2 * c3,
            c1 * c2 * c3 + s1 * s2 * s3,
        ),
    }
}

/// Convert a quaternion to Euler angles
///
/// In gimbal lock the bank angle (Z) is pinned to zero and the whole residual
/// rotation is folded into the remaining free angle, so the result is
/// rotation-equivalent to the input but not necessarily angle-identical.
pub fn quat_to_euler(q: DQuat, order: EulerOrder) -> DVec3 {
    let q = q.normalize();
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);

    // Rotation matrix elements, m{row}{col}
    let m11 = 1.0 - 2.0 * (y * y + z * z);
    let m12 = 2.0 * (x * y - z * w);
    let m13 = 2.0 * (x * z + y * w);
    let m21 = 2.0 * (x * y + z * w);
    let m22 = 1.0 - 2.0 * (x * x + z * z);
    let m23 = 2.0 * (y * z - x * w);
    let m31 = 2.0 * (x * z - y * w);
    let m32 = 2.0 * (y * z + x * w);
    let m33 = 1.0 - 2.0 * (x * x + y * y);

    match order {
        EulerOrder::Xyz => {
            let sin_pitch = (-m31).clamp(-1.0, 1.0);
            if 1.0 - sin_pitch.abs() < GIMBAL_LOCK_EPSILON {
                let x = (m12 * sin_pitch.signum()).atan2(m22);
                DVec3::new(x, FRAC_PI_2.copysign(sin_pitch), 0.0)
            } else {
                DVec3::new(m32.atan2(m33), sin_pitch.asin(), m21.atan2(m11))
            }
        }
        EulerOrder::Yxz => {
            let sin_pitch = (-m23).clamp(-1.0, 1.0);
            if 1.0 - sin_pitch.abs() < GIMBAL_LOCK_EPSILON {
                DVec3::new(FRAC_PI_2.copysign(sin_pitch), (-m31).atan2(m11), 0.0)
            } else {
                DVec3::new(sin_pitch.asin(), m13.atan2(m33), m21.atan2(m22))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn degrees(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3::new(x.to_radians(), y.to_radians(), z.to_radians())
    }

    fn assert_same_rotation(a: DQuat, b: DQuat) {
        let dot = a.dot(b).abs();
        assert!((dot - 1.0).abs() < 1e-9, "rotations differ: {a:?} vs {b:?}");
    }

    #[test]
    fn test_roundtrip_xyz() {
        let angles = degrees(10.0, 20.0, 30.0);
        let back = quat_to_euler(euler_to_quat(angles, EulerOrder::Xyz), EulerOrder::Xyz);
        assert!((back - angles).abs().max_element() < 1e-6, "{back:?}");
    }

    #[test]
    fn test_roundtrip_yxz() {
        let angles = degrees(10.0, 20.0, 30.0);
        let back = quat_to_euler(euler_to_quat(angles, EulerOrder::Yxz), EulerOrder::Yxz);
        assert!((back - angles).abs().max_element() < 1e-6, "{back:?}");
    }

    #[test]
    fn test_zero_angles() {
        for order in [EulerOrder::Xyz, EulerOrder::Yxz] {
            let q = euler_to_quat(DVec3::ZERO, order);
            assert_same_rotation(q, DQuat::IDENTITY);
            let back = quat_to_euler(q, order);
            assert!(back.abs().max_element() < 1e-12);
        }
    }

    #[test]
    fn test_negative_angles_roundtrip() {
        let angles = degrees(-45.0, 60.0, -120.0);
        for order in [EulerOrder::Xyz, EulerOrder::Yxz] {
            let back = quat_to_euler(euler_to_quat(angles, order), order);
            assert!((back - angles).abs().max_element() < 1e-6, "{order:?}: {back:?}");
        }
    }

    #[test]
    fn test_xyz_matches_axis_product() {
        let angles = degrees(15.0, -35.0, 70.0);
        let expected = DQuat::from_rotation_z(angles.z)
            * DQuat::from_rotation_y(angles.y)
            * DQuat::from_rotation_x(angles.x);
        assert_same_rotation(euler_to_quat(angles, EulerOrder::Xyz), expected);
    }

    #[test]
    fn test_yxz_matches_axis_product() {
        let angles = degrees(15.0, -35.0, 70.0);
        let expected = DQuat::from_rotation_y(angles.y)
            * DQuat::from_rotation_x(angles.x)
            * DQuat::from_rotation_z(angles.z);
        assert_same_rotation(euler_to_quat(angles, EulerOrder::Yxz), expected);
    }

    #[test]
    fn test_gimbal_lock_xyz_is_rotation_equivalent() {
        for pitch in [90.0, -90.0] {
            let q = euler_to_quat(degrees(10.0, pitch, 30.0), EulerOrder::Xyz);
            let angles = quat_to_euler(q, EulerOrder::Xyz);
            assert_eq!(angles.z, 0.0);
            assert_same_rotation(euler_to_quat(angles, EulerOrder::Xyz), q);
        }
    }

    #[test]
    fn test_gimbal_lock_yxz_is_rotation_equivalent() {
        for pitch in [90.0, -90.0] {
            let q = euler_to_quat(degrees(pitch, 10.0, 30.0), EulerOrder::Yxz);
            let angles = quat_to_euler(q, EulerOrder::Yxz);
            assert_eq!(angles.z, 0.0);
            assert_same_rotation(euler_to_quat(angles, EulerOrder::Yxz), q);
        }
    }
}

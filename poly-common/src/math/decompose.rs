//! 4x4 matrix composition and decomposition

use glam::{DMat4, DQuat, DVec3};

/// Scale axis length below which a decomposition is flagged degenerate
pub const DEGENERATE_SCALE_EPSILON: f64 = 1e-12;

/// Translation / rotation / scale recovered from an affine matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
    /// A scale axis collapsed to zero; `rotation` is the identity placeholder
    pub degenerate: bool,
}

/// Build `T * R * S`
pub fn compose(translation: DVec3, rotation: DQuat, scale: DVec3) -> DMat4 {
    DMat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Split an affine matrix into translation, rotation and scale
///
/// A mirrored matrix (negative determinant) is reported as a negative X scale.
/// When any scale axis has (near) zero length the rotation is undefined; the
/// result then carries `degenerate = true` and an identity rotation.
pub fn decompose(m: &DMat4) -> Decomposition {
    let translation = m.w_axis.truncate();

    let col0 = m.x_axis.truncate();
    let col1 = m.y_axis.truncate();
    let col2 = m.z_axis.truncate();

    let mut scale = DVec3::new(col0.length(), col1.length(), col2.length());
    if m.determinant() < 0.0 {
        scale.x = -scale.x;
    }

    if scale.abs().min_element() < DEGENERATE_SCALE_EPSILON {
        tracing::warn!(
            "Degenerate scale {:?} in matrix decomposition, rotation set to identity",
            scale
        );
        return Decomposition {
            translation,
            rotation: DQuat::IDENTITY,
            scale,
            degenerate: true,
        };
    }

    let col0 = col0 / scale.x;
    let col1 = col1 / scale.y;
    let col2 = col2 / scale.z;

    // Pure rotation matrix elements, m{row}{col}
    let (m00, m10, m20) = (col0.x, col0.y, col0.z);
    let (m01, m11, m21) = (col1.x, col1.y, col1.z);
    let (m02, m12, m22) = (col2.x, col2.y, col2.z);

    let trace = m00 + m11 + m22;
    let rotation = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        DQuat::from_xyzw((m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s, 0.25 * s)
    } else if m00 > m11 && m00 > m22 {
        let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
        DQuat::from_xyzw(0.25 * s, (m01 + m10) / s, (m02 + m20) / s, (m21 - m12) / s)
    } else if m11 > m22 {
        let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
        DQuat::from_xyzw((m01 + m10) / s, 0.25 * s, (m12 + m21) / s, (m02 - m20) / s)
    } else {
        let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
        DQuat::from_xyzw((m02 + m20) / s, (m12 + m21) / s, 0.25 * s, (m10 - m01) / s)
    };

    Decomposition {
        translation,
        rotation: rotation.normalize(),
        scale,
        degenerate: false,
    }
}

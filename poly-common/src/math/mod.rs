//! Numeric kernel
//!
//! Geometry in the document model is `f32`; rotation conversion and matrix
//! decomposition run in `f64` so that round trips stay well inside 1e-6.

mod decompose;
mod euler;
mod triangulate;

pub use decompose::{compose, decompose, Decomposition, DEGENERATE_SCALE_EPSILON};
pub use euler::{euler_to_quat, quat_to_euler, EulerOrder, GIMBAL_LOCK_EPSILON};
pub use triangulate::{polygon_normal, triangulate};

use glam::{Mat4, Vec3};

/// Inverse bind matrix for a joint whose rest pose is a pure translation
///
/// Maps rest-pose mesh-space positions into joint-local space.
pub fn inverse_bind_matrix(rest_position: Vec3) -> Mat4 {
    Mat4::from_translation(-rest_position)
}

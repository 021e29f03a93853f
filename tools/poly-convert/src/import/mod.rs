//! Readers that build a [`poly_common::Document`] from each input format
//!
//! Every importer produces the same conventions: right-handed Y-up
//! coordinates scaled by `ConvertConfig::scale`, counter-clockwise front
//! faces, top-left UV origin, 1-based bone ids and per-vertex weights.

pub mod fbx;
pub mod gltf;
pub mod mqo;
pub mod pmx;

pub use self::fbx::import_fbx;
pub use self::gltf::import_gltf;
pub use self::mqo::import_mqo;
pub use self::pmx::import_pmx;

use glam::{DMat4, DVec3};
use poly_common::decompose;

/// Rest position of a joint from its global matrix
///
/// Bones carry a position only; rotation and scale are dropped.
pub(crate) fn rest_position(global: &DMat4) -> DVec3 {
    decompose(global).translation
}

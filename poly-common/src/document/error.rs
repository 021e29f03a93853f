//! Document invariant violations

use thiserror::Error;

/// Structural problems in a [`Document`](super::Document)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentError {
    #[error("bone {bone} references unknown parent {parent}")]
    UnknownParentBone { bone: u32, parent: u32 },

    #[error("bone id {0} is used more than once")]
    DuplicateBoneId(u32),

    #[error("bone id 0 is reserved for the root sentinel")]
    ReservedBoneId,

    #[error("bone {bone} is part of a parent cycle")]
    BoneCycle { bone: u32 },

    #[error("unknown bone {0}")]
    UnknownBone(u32),

    #[error("object '{object}' has a face with {corners} corners")]
    DegenerateFace { object: String, corners: usize },

    #[error("object '{object}' references vertex {index} but has {count} vertices")]
    VertexOutOfRange {
        object: String,
        index: usize,
        count: usize,
    },

    #[error("object '{object}' references unknown material {index}")]
    MaterialOutOfRange { object: String, index: usize },
}

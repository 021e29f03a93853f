//! Shared types for the polybridge model converters
//!
//! This crate provides the pieces every conversion direction depends on:
//! - `poly-fbx` / `poly-pmx` (format readers) produce raw trees and records
//! - `poly-convert` (conversion tool) builds and rewrites [`Document`]s
//!
//! # Modules
//!
//! - [`math`] - Euler/quaternion conversion, matrix decomposition, n-gon triangulation
//! - [`document`] - Format-agnostic mesh/material/bone/morph document

pub mod document;
pub mod math;

// Re-export the document model
pub use document::{
    BoneFlags, BoneSet, BoneWeight, Bone, Document, DocumentError, Extension, ExtensionRegistry,
    Face, Inherit, Joint, Material, MeshObject, Morph, MorphSet, MorphTarget, MorphTargetList,
    PhysicsMode, PhysicsSet, RigidBody, RigidShape, Vertex, WeightRecord, BONE_TAG, MORPH_TAG,
    PHYSICS_TAG, ROOT_BONE_ID,
};

// Re-export commonly used math items
pub use math::{
    compose, decompose, euler_to_quat, inverse_bind_matrix, polygon_normal, quat_to_euler,
    triangulate, Decomposition, EulerOrder, DEGENERATE_SCALE_EPSILON, GIMBAL_LOCK_EPSILON,
};

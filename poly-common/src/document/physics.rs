//! Physics extension (rigid bodies and joints)
//!
//! Filled by the PMX importer and carried through conversions untouched.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RigidShape {
    #[default]
    Sphere,
    Box,
    Capsule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhysicsMode {
    /// Follows its bone
    #[default]
    Static,
    /// Simulated, drives its bone
    Dynamic,
    /// Simulated rotation, position snapped to the bone
    DynamicWithBone,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RigidBody {
    pub name: String,
    /// Attached bone id, if any
    pub bone: Option<u32>,
    pub group: u8,
    pub collision_mask: u16,
    pub shape: RigidShape,
    pub size: Vec3,
    pub position: Vec3,
    /// Euler angles (YXZ, radians)
    pub rotation: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    pub mode: PhysicsMode,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Joint {
    pub name: String,
    /// Indices into [`PhysicsSet::bodies`]
    pub body_a: Option<usize>,
    pub body_b: Option<usize>,
    pub position: Vec3,
    pub rotation: Vec3,
    pub linear_min: Vec3,
    pub linear_max: Vec3,
    pub angular_min: Vec3,
    pub angular_max: Vec3,
    pub spring_linear: Vec3,
    pub spring_angular: Vec3,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsSet {
    pub bodies: Vec<RigidBody>,
    pub joints: Vec<Joint>,
}

impl PhysicsSet {
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty() && self.joints.is_empty()
    }
}

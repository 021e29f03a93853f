//! Rigid body and joint sections

use super::helpers::PmxReader;
use crate::error::PmxError;
use crate::model::{Header, Joint, RigidBody};

pub(super) fn parse_rigid_bodies(
    reader: &mut PmxReader,
    header: &Header,
) -> Result<Vec<RigidBody>, PmxError> {
    let count = reader.count("rigid body")?;
    let mut bodies = Vec::with_capacity(reader.capacity(count, 90));
    for _ in 0..count {
        bodies.push(RigidBody {
            name: reader.text(header.encoding)?,
            name_en: reader.text(header.encoding)?,
            bone: reader.index(header.bone_index)?,
            group: reader.u8()?,
            non_collision_mask: reader.u16()?,
            shape: reader.u8()?,
            size: reader.vec3()?,
            position: reader.vec3()?,
            rotation: reader.vec3()?,
            mass: reader.f32()?,
            linear_damping: reader.f32()?,
            angular_damping: reader.f32()?,
            restitution: reader.f32()?,
            friction: reader.f32()?,
            mode: reader.u8()?,
        });
    }
    Ok(bodies)
}

pub(super) fn parse_joints(reader: &mut PmxReader, header: &Header) -> Result<Vec<Joint>, PmxError> {
    // Some exporters stop after the rigid bodies
    if reader.remaining() == 0 {
        return Ok(Vec::new());
    }
    let count = reader.count("joint")?;
    let mut joints = Vec::with_capacity(reader.capacity(count, 120));
    for _ in 0..count {
        joints.push(Joint {
            name: reader.text(header.encoding)?,
            name_en: reader.text(header.encoding)?,
            kind: reader.u8()?,
            body_a: reader.index(header.rigid_body_index)?,
            body_b: reader.index(header.rigid_body_index)?,
            position: reader.vec3()?,
            rotation: reader.vec3()?,
            linear_min: reader.vec3()?,
            linear_max: reader.vec3()?,
            angular_min: reader.vec3()?,
            angular_max: reader.vec3()?,
            spring_linear: reader.vec3()?,
            spring_angular: reader.vec3()?,
        });
    }
    Ok(joints)
}

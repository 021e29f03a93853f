//! PMX character model import
//!
//! PMX is left-handed; positions and normals get Z negated and triangle
//! winding reversed. Bone ids are PMX bone indices plus one.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{DQuat, Vec2, Vec3};
use poly_common::{
    euler_to_quat, quat_to_euler, Bone, BoneFlags, BoneSet, Document, EulerOrder, Face, Inherit,
    Joint, Material, MeshObject, Morph, PhysicsMode, PhysicsSet, RigidBody, RigidShape, Vertex,
    ROOT_BONE_ID,
};
use poly_pmx::{parse_pmx, MaterialFlags, MorphOffsets, PmxModel};
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::convert::resolve_inherit_parents;

/// Read and convert a `.pmx` file
pub fn import_pmx(path: &Path, config: &ConvertConfig) -> Result<Document> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read PMX: {:?}", path))?;
    let model = parse_pmx(&data).with_context(|| format!("Failed to parse PMX: {:?}", path))?;
    document_from_pmx(&model, config)
}

fn flip_z(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.y, -v.z)
}

/// Rigid body and joint rotations (Y-X-Z Euler) mirrored along with the Z axis
///
/// Reflecting through the XY plane keeps the quaternion's Z and W and
/// negates X and Y.
fn flip_rotation(r: Vec3) -> Vec3 {
    let q = euler_to_quat(r.as_dvec3(), EulerOrder::Yxz);
    let mirrored = DQuat::from_xyzw(-q.x, -q.y, q.z, q.w);
    quat_to_euler(mirrored, EulerOrder::Yxz).as_vec3()
}

/// Valid table index, `None` for `-1` and out-of-range values
fn table_index(index: i32, len: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < len)
}

/// Convert a parsed model into a single-object document
pub fn document_from_pmx(model: &PmxModel, config: &ConvertConfig) -> Result<Document> {
    let scale = config.scale;
    let mut document = Document::new();

    for material in &model.materials {
        let mut converted = Material::new(material.name.clone());
        converted.color = material.diffuse;
        converted.ambient = material.ambient.element_sum() / 3.0;
        converted.specular = material.specular.element_sum() / 3.0;
        converted.power = material.specular_strength;
        converted.double_sided = material.flags.contains(MaterialFlags::NO_CULL);
        converted.texture = table_index(material.texture, model.textures.len())
            .map(|t| model.textures[t].clone());
        document.materials.push(converted);
    }

    let name = if model.info.name.is_empty() {
        "model".to_string()
    } else {
        model.info.name.clone()
    };
    let mut object = MeshObject::new(name);
    object.vertices = model
        .vertices
        .iter()
        .map(|v| {
            let mut vertex = Vertex::new(flip_z(v.position) * scale);
            vertex.normal = Some(flip_z(v.normal));
            vertex.uv = Some(v.uv);
            for (bone, weight) in v.weight.influences() {
                if let Some(bone) = table_index(bone, model.bones.len()) {
                    if weight > 0.0 {
                        vertex.add_weight(bone as u32 + 1, weight);
                    }
                }
            }
            vertex
        })
        .collect();

    let ranges = model.material_ranges();
    let covered = ranges.last().map_or(0, |r| r.end);
    for (material, range) in ranges.into_iter().enumerate() {
        for t in model.indices[range].chunks_exact(3) {
            let [a, b, c] = [t[0], t[1], t[2]].map(|i| i as usize);
            object.faces.push(Face::new(vec![a, c, b], Some(material)));
        }
    }
    if covered < model.indices.len() {
        warn!(
            triangles = (model.indices.len() - covered) / 3,
            "faces not covered by any material"
        );
        for t in model.indices[covered..].chunks_exact(3) {
            let [a, b, c] = [t[0], t[1], t[2]].map(|i| i as usize);
            object.faces.push(Face::new(vec![a, c, b], None));
        }
    }

    object.morphs = convert_morphs(model, scale);
    document.objects.push(object);

    if !model.bones.is_empty() {
        let mut bones = convert_bones(model, scale);
        let moved = resolve_inherit_parents(
            &mut bones,
            config.inherit_threshold,
            &config.inherit_whitelist,
        );
        debug!(moved, "inherit re-parenting");
        bones.validate().context("Invalid PMX bone hierarchy")?;
        *document.extensions.bones_or_insert() = bones;
    }

    let physics = convert_physics(model, scale);
    if !physics.is_empty() {
        *document.extensions.physics_or_insert() = physics;
    }

    document.validate().context("Converted PMX document is invalid")?;
    info!(
        name = %model.info.name,
        vertices = document.vertex_count(),
        faces = document.face_count(),
        bones = model.bones.len(),
        "Imported PMX"
    );
    Ok(document)
}

fn convert_bones(model: &PmxModel, scale: f32) -> BoneSet {
    let count = model.bones.len();
    let mut bones = BoneSet::new();
    for (i, source) in model.bones.iter().enumerate() {
        let parent = match table_index(source.parent, count) {
            Some(p) if p != i => p as u32 + 1,
            Some(_) => {
                warn!(bone = %source.name, "bone is its own parent, attached to root");
                ROOT_BONE_ID
            }
            None => {
                if source.parent >= 0 {
                    warn!(bone = %source.name, parent = source.parent, "parent out of range, attached to root");
                }
                ROOT_BONE_ID
            }
        };

        let mut bone = Bone::new(i as u32 + 1, source.name.clone(), parent, flip_z(source.position) * scale);
        let flag_map = [
            (poly_pmx::BoneFlags::ROTATABLE, BoneFlags::ROTATABLE),
            (poly_pmx::BoneFlags::MOVABLE, BoneFlags::MOVABLE),
            (poly_pmx::BoneFlags::VISIBLE, BoneFlags::VISIBLE),
            (poly_pmx::BoneFlags::IK, BoneFlags::IK),
            (poly_pmx::BoneFlags::INHERIT_ROTATION, BoneFlags::INHERIT_ROTATION),
            (poly_pmx::BoneFlags::INHERIT_TRANSLATION, BoneFlags::INHERIT_TRANSLATION),
        ];
        bone.flags = flag_map
            .into_iter()
            .filter(|(from, _)| source.flags.contains(*from))
            .fold(BoneFlags::empty(), |acc, (_, to)| acc | to);
        bone.inherit = source.inherit.and_then(|inherit| {
            table_index(inherit.parent, count).map(|s| Inherit {
                source: s as u32 + 1,
                influence: inherit.influence,
            })
        });
        bones.push_unchecked(bone);
    }
    bones
}

fn convert_morphs(model: &PmxModel, scale: f32) -> Vec<Morph> {
    let vertex_count = model.vertices.len();
    let mut morphs = Vec::new();
    let mut unsupported = 0usize;
    for source in &model.morphs {
        let mut morph = Morph::new(source.name.clone());
        match &source.offsets {
            MorphOffsets::Vertex(offsets) => {
                morph.positions = offsets
                    .iter()
                    .filter_map(|o| {
                        let v = table_index(o.vertex, vertex_count)?;
                        Some((v, flip_z(o.offset) * scale))
                    })
                    .collect();
            }
            MorphOffsets::Uv { channel: 0, offsets } => {
                morph.uvs = offsets
                    .iter()
                    .filter_map(|o| {
                        let v = table_index(o.vertex, vertex_count)?;
                        Some((v, Vec2::new(o.offset.x, o.offset.y)))
                    })
                    .collect();
            }
            _ => {
                unsupported += 1;
                continue;
            }
        }
        if morph.is_empty() {
            debug!(morph = %source.name, "empty morph skipped");
            continue;
        }
        morphs.push(morph);
    }
    if unsupported > 0 {
        debug!(unsupported, "group, bone, material and extra UV morphs not converted");
    }
    morphs
}

fn convert_physics(model: &PmxModel, scale: f32) -> PhysicsSet {
    let bodies = model
        .rigid_bodies
        .iter()
        .map(|b| RigidBody {
            name: b.name.clone(),
            bone: table_index(b.bone, model.bones.len()).map(|i| i as u32 + 1),
            group: b.group,
            collision_mask: b.non_collision_mask,
            shape: match b.shape {
                1 => RigidShape::Box,
                2 => RigidShape::Capsule,
                _ => RigidShape::Sphere,
            },
            size: b.size * scale,
            position: flip_z(b.position) * scale,
            rotation: flip_rotation(b.rotation),
            mass: b.mass,
            linear_damping: b.linear_damping,
            angular_damping: b.angular_damping,
            restitution: b.restitution,
            friction: b.friction,
            mode: match b.mode {
                1 => PhysicsMode::Dynamic,
                2 => PhysicsMode::DynamicWithBone,
                _ => PhysicsMode::Static,
            },
        })
        .collect();

    let body_count = model.rigid_bodies.len();
    let joints = model
        .joints
        .iter()
        .map(|j| Joint {
            name: j.name.clone(),
            body_a: table_index(j.body_a, body_count),
            body_b: table_index(j.body_b, body_count),
            position: flip_z(j.position) * scale,
            rotation: flip_rotation(j.rotation),
            linear_min: j.linear_min * scale,
            linear_max: j.linear_max * scale,
            angular_min: j.angular_min,
            angular_max: j.angular_max,
            spring_linear: j.spring_linear,
            spring_angular: j.spring_angular,
        })
        .collect();

    PhysicsSet { bodies, joints }
}

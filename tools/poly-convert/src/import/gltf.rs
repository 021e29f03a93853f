//! glTF / GLB import
//!
//! Every mesh node of the default scene becomes one object with its
//! primitives merged, positions baked into world space. Skin joints become
//! bones parented to their nearest joint ancestor.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3, Vec4};
use hashbrown::{HashMap, HashSet};
use poly_common::{Bone, BoneSet, Document, Face, Material, MeshObject, Morph, Vertex, ROOT_BONE_ID};
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::import::rest_position;

/// Read and convert a `.gltf` or `.glb` file
pub fn import_gltf(path: &Path, config: &ConvertConfig) -> Result<Document> {
    let (gltf, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;
    document_from_gltf(&gltf, &buffers, config)
}

/// Morph names stored as `extras.targetNames` on the mesh
pub fn target_names(mesh: &gltf::Mesh<'_>) -> Vec<String> {
    let Some(raw) = mesh.extras() else {
        return Vec::new();
    };
    serde_json::from_str::<serde_json::Value>(raw.get())
        .ok()
        .and_then(|extras| {
            extras.get("targetNames")?.as_array().map(|names| {
                names
                    .iter()
                    .map(|n| n.as_str().unwrap_or_default().to_string())
                    .collect()
            })
        })
        .unwrap_or_default()
}

/// World matrix of every node reachable from the scene roots
fn world_matrices(gltf: &gltf::Document) -> Vec<Option<Mat4>> {
    fn visit(node: gltf::Node<'_>, parent: Mat4, worlds: &mut Vec<Option<Mat4>>) {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if worlds[node.index()].is_some() {
            return;
        }
        worlds[node.index()] = Some(world);
        for child in node.children() {
            visit(child, world, worlds);
        }
    }

    let mut worlds = vec![None; gltf.nodes().len()];
    match gltf.default_scene().or_else(|| gltf.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                visit(node, Mat4::IDENTITY, &mut worlds);
            }
        }
        None => {
            let children: HashSet<usize> = gltf
                .nodes()
                .flat_map(|n| n.children().map(|c| c.index()).collect::<Vec<_>>())
                .collect();
            for node in gltf.nodes().filter(|n| !children.contains(&n.index())) {
                visit(node, Mat4::IDENTITY, &mut worlds);
            }
        }
    }
    worlds
}

fn convert_material(material: gltf::Material<'_>, index: usize) -> Material {
    let name = material
        .name()
        .map_or_else(|| format!("material{index}"), str::to_string);
    let mut converted = Material::new(name);
    let pbr = material.pbr_metallic_roughness();
    converted.color = Vec4::from_array(pbr.base_color_factor());
    converted.double_sided = material.double_sided();
    converted.texture = pbr.base_color_texture().and_then(|info| {
        match info.texture().source().source() {
            gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
            gltf::image::Source::View { .. } => {
                debug!(material = index, "embedded texture not extracted");
                None
            }
        }
    });
    converted
}

/// Convert an imported glTF document
pub fn document_from_gltf(
    gltf: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    config: &ConvertConfig,
) -> Result<Document> {
    let scale = config.scale;
    let worlds = world_matrices(gltf);
    let mut document = Document::new();
    document.materials = gltf
        .materials()
        .enumerate()
        .map(|(i, m)| convert_material(m, i))
        .collect();

    let mut parents: Vec<Option<usize>> = vec![None; gltf.nodes().len()];
    for node in gltf.nodes() {
        for child in node.children() {
            parents[child.index()] = Some(node.index());
        }
    }

    // Joint node index -> bone id, over every skin
    let mut bone_ids: HashMap<usize, u32> = HashMap::new();
    let mut joint_order = Vec::new();
    for skin in gltf.skins() {
        for joint in skin.joints() {
            if !bone_ids.contains_key(&joint.index()) {
                bone_ids.insert(joint.index(), bone_ids.len() as u32 + 1);
                joint_order.push(joint);
            }
        }
    }
    if !joint_order.is_empty() {
        let mut bones = BoneSet::new();
        for joint in &joint_order {
            let mut parent = ROOT_BONE_ID;
            let mut current = parents[joint.index()];
            while let Some(p) = current {
                if let Some(&id) = bone_ids.get(&p) {
                    parent = id;
                    break;
                }
                current = parents[p];
            }
            let world = worlds[joint.index()].unwrap_or(Mat4::IDENTITY);
            let name = joint
                .name()
                .map_or_else(|| format!("joint{}", joint.index()), str::to_string);
            bones.push_unchecked(Bone::new(
                bone_ids[&joint.index()],
                name,
                parent,
                rest_position(&world.as_dmat4()).as_vec3() * scale,
            ));
        }
        bones.validate().context("Invalid glTF joint hierarchy")?;
        *document.extensions.bones_or_insert() = bones;
    }

    let mut taken = HashSet::new();
    for node in gltf.nodes() {
        let (Some(mesh), Some(world)) = (node.mesh(), worlds[node.index()]) else {
            continue;
        };
        let base = node
            .name()
            .or_else(|| mesh.name())
            .map_or_else(|| format!("mesh{}", mesh.index()), str::to_string);
        let mut name = base.clone();
        let mut n = 1;
        while !taken.insert(name.clone()) {
            name = format!("{base}.{n}");
            n += 1;
        }

        let joints: Vec<u32> = node
            .skin()
            .map(|skin| skin.joints().map(|j| bone_ids[&j.index()]).collect())
            .unwrap_or_default();
        let object = convert_mesh(&mesh, buffers, world, &joints, name, scale);
        document.objects.push(object);
    }

    document.validate().context("Converted glTF document is invalid")?;
    info!(
        objects = document.objects.len(),
        vertices = document.vertex_count(),
        faces = document.face_count(),
        bones = bone_ids.len(),
        "Imported glTF"
    );
    Ok(document)
}

fn convert_mesh(
    mesh: &gltf::Mesh<'_>,
    buffers: &[gltf::buffer::Data],
    world: Mat4,
    joints: &[u32],
    name: String,
    scale: f32,
) -> MeshObject {
    let mut object = MeshObject::new(name);
    let names = target_names(mesh);
    let mut morphs: Vec<Morph> = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!(mesh = mesh.index(), mode = ?primitive.mode(), "non-triangle primitive skipped");
            continue;
        }
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
        let Some(positions) = reader.read_positions() else {
            warn!(mesh = mesh.index(), "primitive without positions skipped");
            continue;
        };

        let offset = object.vertices.len();
        object.vertices.extend(
            positions.map(|p| Vertex::new(world.transform_point3(Vec3::from_array(p)) * scale)),
        );
        let count = object.vertices.len() - offset;
        let added = &mut object.vertices[offset..];

        if let Some(normals) = reader.read_normals() {
            for (vertex, n) in added.iter_mut().zip(normals) {
                vertex.normal = Some(world.transform_vector3(Vec3::from_array(n)).normalize_or_zero());
            }
        }
        if let Some(uvs) = reader.read_tex_coords(0) {
            for (vertex, uv) in added.iter_mut().zip(uvs.into_f32()) {
                vertex.uv = Some(Vec2::from_array(uv));
            }
        }
        if let (Some(joint_sets), Some(weight_sets)) = (reader.read_joints(0), reader.read_weights(0)) {
            for (vertex, (js, ws)) in added.iter_mut().zip(joint_sets.into_u16().zip(weight_sets.into_f32())) {
                for (j, w) in js.into_iter().zip(ws) {
                    match joints.get(j as usize) {
                        Some(&bone) if w > 0.0 => vertex.add_weight(bone, w),
                        Some(_) => {}
                        None => debug!(joint = j, "joint index outside the skin"),
                    }
                }
            }
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..count as u32).collect(),
        };
        let material = primitive.material().index();
        for t in indices.chunks_exact(3) {
            if t.iter().any(|&i| i as usize >= count) {
                continue;
            }
            let corners = t.iter().map(|&i| offset + i as usize).collect();
            object.faces.push(Face::new(corners, material));
        }

        for (target, (deltas, _, _)) in reader.read_morph_targets().enumerate() {
            if morphs.len() <= target {
                let name = names
                    .get(target)
                    .filter(|n| !n.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("morph{target}"));
                morphs.push(Morph::new(name));
            }
            let Some(deltas) = deltas else { continue };
            for (i, d) in deltas.enumerate() {
                let delta = world.transform_vector3(Vec3::from_array(d)) * scale;
                if delta != Vec3::ZERO {
                    morphs[target].positions.push((offset + i, delta));
                }
            }
        }
    }

    object.morphs = morphs.into_iter().filter(|m| !m.is_empty()).collect();
    debug!(
        object = %object.name,
        vertices = object.vertices.len(),
        faces = object.faces.len(),
        morphs = object.morphs.len(),
        "converted glTF mesh"
    );
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::export_glb;

    fn skinned_document() -> Document {
        let mut doc = Document::new();
        let mut object = MeshObject::new("body");
        for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            let mut vertex = Vertex::new(p);
            vertex.add_weight(2, 1.0);
            object.vertices.push(vertex);
        }
        object.faces.push(Face::new(vec![0, 1, 2], None));
        let mut smile = Morph::new("smile");
        smile.positions.push((1, Vec3::new(0.0, 0.25, 0.0)));
        object.morphs.push(smile);
        doc.objects.push(object);

        let bones = doc.extensions.bones_or_insert();
        bones.push_unchecked(Bone::new(1, "hips", ROOT_BONE_ID, Vec3::new(0.0, 1.0, 0.0)));
        bones.push_unchecked(Bone::new(2, "spine", 1, Vec3::new(0.0, 1.5, 0.2)));
        doc
    }

    fn reimport(doc: &Document, config: &ConvertConfig) -> Document {
        let glb = export_glb(doc, &ConvertConfig::default(), None).unwrap();
        let (gltf, buffers, _) = gltf::import_slice(&glb).unwrap();
        document_from_gltf(&gltf, &buffers, config).unwrap()
    }

    #[test]
    fn test_joint_rest_positions_from_world_matrices() {
        let doc = reimport(&skinned_document(), &ConvertConfig::default());
        let bones = doc.extensions.bones().unwrap();
        let spine = bones.by_name("spine").unwrap();
        assert_eq!(spine.parent, bones.by_name("hips").unwrap().id);
        assert!(spine.position.abs_diff_eq(Vec3::new(0.0, 1.5, 0.2), 1e-6));
    }

    #[test]
    fn test_weights_and_morph_names_survive() {
        let config = ConvertConfig {
            scale: 2.0,
            ..Default::default()
        };
        let doc = reimport(&skinned_document(), &config);
        let object = &doc.objects[0];
        assert_eq!(object.name, "body");
        assert_eq!(object.faces.len(), 1);
        assert_eq!(object.morphs[0].name, "smile");
        assert_eq!(object.vertices[1].position, Vec3::new(2.0, 0.0, 0.0));

        let spine = doc.extensions.bones().unwrap().by_name("spine").unwrap().id;
        assert_eq!(object.vertices[0].weights[0].bone, spine);
        assert_eq!(object.vertices[0].weights[0].weight, 1.0);
    }
}

//! Binary glTF export
//!
//! Bones become a node hierarchy with local translations, every object a
//! mesh node with one primitive per material. Morph target lists are
//! flattened first so each morph is a position-delta target.

mod buffer;
mod document;
mod utils;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use glam::Vec3;
use hashbrown::HashMap;
use poly_common::{Document, MeshObject};
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::convert::{
    apply_blend_shape_presets, flatten_target_lists, resolve_bone_map, split_faces,
    warn_duplicate_names, Skeleton, SkinSlots, SplitMesh,
};
use crate::texture::{load_texture_png, resolve_texture_path};

pub use buffer::{AccessorIndex, BufferBuilder};
pub use document::{GltfBuilder, MaterialDesc, PrimitiveAccessors};
pub use utils::{align_buffer, assemble_glb, compute_bounds};

const GENERATOR: &str = concat!("poly-convert ", env!("CARGO_PKG_VERSION"));

/// Convert a document to GLB bytes
///
/// Relative texture paths are resolved against `texture_dir`; textures that
/// cannot be loaded are left out with a warning. Skin weights are read from
/// the vertices only.
pub fn export_glb(document: &Document, config: &ConvertConfig, texture_dir: Option<&Path>) -> Result<Vec<u8>> {
    let mut document = document.clone();
    flatten_target_lists(&mut document);
    apply_blend_shape_presets(&mut document, &config.blend_shapes);

    let mut buffer = BufferBuilder::new();
    let mut gltf = GltfBuilder::new();

    let skeleton = document
        .extensions
        .bones()
        .map(|bones| {
            warn_duplicate_names(bones);
            Skeleton::build(bones)
        })
        .unwrap_or_default();
    if skeleton.len() > u16::MAX as usize + 1 {
        bail!("{} bones exceed the 16-bit joint index range", skeleton.len());
    }
    let skin = add_skeleton(&mut gltf, &mut buffer, &skeleton, &document, config);

    let materials = add_materials(&mut gltf, &mut buffer, &document, config, texture_dir);

    let mut meshes = 0;
    for object in &document.objects {
        if object.faces.is_empty() {
            debug!(object = %object.name, "object without faces skipped");
            continue;
        }
        let skin = skin.filter(|_| object.is_skinned());
        let (primitives, target_names) =
            pack_object(&mut buffer, object, &skeleton, &materials, skin.is_some(), config);
        if primitives.is_empty() {
            continue;
        }
        let node = gltf.add_mesh_node(&object.name, &primitives, &target_names, skin)?;
        gltf.add_scene_root(node);
        meshes += 1;
    }

    info!(
        meshes,
        joints = skeleton.len(),
        materials = materials.len(),
        bytes = buffer.data().len(),
        "Built GLB"
    );
    let root = gltf.build(&buffer, GENERATOR);
    assemble_glb(&root, buffer.data())
}

/// Joint nodes, parents before children; returns the skin index
fn add_skeleton(
    gltf: &mut GltfBuilder,
    buffer: &mut BufferBuilder,
    skeleton: &Skeleton,
    document: &Document,
    config: &ConvertConfig,
) -> Option<u32> {
    if skeleton.is_empty() {
        return None;
    }
    let humanoid = document
        .extensions
        .bones()
        .map(|bones| resolve_bone_map(bones, &config.bone_map))
        .unwrap_or_default();

    let mut nodes = Vec::with_capacity(skeleton.len());
    for joint in 0..skeleton.len() {
        let name = humanoid
            .get(&skeleton.bone_ids[joint])
            .unwrap_or(&skeleton.names[joint]);
        let node = gltf.add_node(name, Some(skeleton.local_translations[joint].to_array()));
        nodes.push(node);
        match skeleton.parents[joint] {
            Some(parent) => gltf.add_child(nodes[parent], node),
            None => gltf.add_scene_root(node),
        }
    }

    let matrices: Vec<[f32; 16]> = skeleton
        .inverse_bind_matrices
        .iter()
        .map(|m| m.to_cols_array())
        .collect();
    let ibm = buffer.pack_mat4(&matrices);
    let root = skeleton.roots().next().map(|joint| nodes[joint]);
    Some(gltf.add_skin("Armature", root, &nodes, ibm))
}

/// Materials with overrides applied; returns the glTF index per document material
fn add_materials(
    gltf: &mut GltfBuilder,
    buffer: &mut BufferBuilder,
    document: &Document,
    config: &ConvertConfig,
    texture_dir: Option<&Path>,
) -> Vec<u32> {
    let mut textures: HashMap<PathBuf, Option<u32>> = HashMap::new();
    let mut indices = Vec::with_capacity(document.materials.len());

    for material in &document.materials {
        let mut desc = MaterialDesc {
            name: material.name.clone(),
            base_color: material.color.to_array(),
            double_sided: material.double_sided,
            texture: None,
        };
        let mut texture = material.texture.clone();
        if let Some(o) = config.material_override(&material.name) {
            debug!(material = %material.name, "applying material override");
            if let Some(color) = o.color {
                desc.base_color = color;
            }
            if let Some(double_sided) = o.double_sided {
                desc.double_sided = double_sided;
            }
            if o.texture.is_some() {
                texture = o.texture.clone();
            }
        }

        if let Some(texture) = texture.filter(|t| !t.is_empty()) {
            let path = resolve_texture_path(&texture, texture_dir);
            desc.texture = *textures.entry(path.clone()).or_insert_with(|| {
                match load_texture_png(&path) {
                    Ok(png) => {
                        let view = buffer.pack_image(&png);
                        Some(gltf.add_texture(&texture, view))
                    }
                    Err(e) => {
                        warn!(material = %material.name, "texture skipped: {e:#}");
                        None
                    }
                }
            });
        }
        indices.push(gltf.add_material(&desc));
    }
    indices
}

/// Pack one primitive per used material plus shared morph targets
fn pack_object(
    buffer: &mut BufferBuilder,
    object: &MeshObject,
    skeleton: &Skeleton,
    materials: &[u32],
    skinned: bool,
    config: &ConvertConfig,
) -> (Vec<PrimitiveAccessors>, Vec<String>) {
    // glTF targets carry positions only; UV-only morphs have nothing to export
    let morphs: Vec<_> = object
        .morphs
        .iter()
        .filter(|m| !m.positions.is_empty())
        .collect();
    let skipped = object.morphs.len() - morphs.len();
    if skipped > 0 {
        debug!(object = %object.name, skipped, "UV-only morphs not exported");
    }
    let deltas: Vec<HashMap<usize, Vec3>> = morphs
        .iter()
        .map(|m| m.positions.iter().copied().collect())
        .collect();

    let mut primitives = Vec::new();
    for material in object.used_materials() {
        let faces = object.faces.iter().filter(|f| f.material == material);
        let mesh = split_faces(object, faces, config.split_uv_epsilon);
        if mesh.is_empty() {
            continue;
        }

        let positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.position.to_array()).collect();
        let normals: Vec<[f32; 3]> = mesh
            .vertices
            .iter()
            .map(|v| v.normal.normalize_or(Vec3::Y).to_array())
            .collect();
        let indices: Vec<u32> = mesh.triangles.iter().flatten().copied().collect();

        let positions = buffer.pack_positions(&positions);
        let normals = Some(buffer.pack_vec3(&normals));
        let uvs = mesh.has_uvs().then(|| {
            let uvs: Vec<[f32; 2]> = mesh
                .vertices
                .iter()
                .map(|v| v.uv.unwrap_or_default().to_array())
                .collect();
            buffer.pack_vec2(&uvs)
        });
        let (joints, weights) = if skinned {
            let (joints, weights) = skin_attributes(&mesh, skeleton, &object.name);
            (Some(buffer.pack_joints(&joints)), Some(buffer.pack_vec4(&weights)))
        } else {
            (None, None)
        };
        let indices = buffer.pack_indices(&indices);

        let targets = deltas
            .iter()
            .map(|delta| {
                let data: Vec<[f32; 3]> = mesh
                    .vertices
                    .iter()
                    .map(|v| delta.get(&v.source).copied().unwrap_or(Vec3::ZERO).to_array())
                    .collect();
                buffer.pack_positions(&data)
            })
            .collect();

        primitives.push(PrimitiveAccessors {
            positions,
            normals,
            uvs,
            joints,
            weights,
            indices,
            targets,
            material: material.and_then(|m| materials.get(m).copied()),
        });
    }

    let names = morphs.iter().map(|m| m.name.clone()).collect();
    (primitives, names)
}

/// Four joints and normalised weights per split vertex
///
/// Vertices without a usable influence are bound fully to joint 0.
fn skin_attributes(mesh: &SplitMesh, skeleton: &Skeleton, object: &str) -> (Vec<[u16; 4]>, Vec<[f32; 4]>) {
    let mut joints = Vec::with_capacity(mesh.vertices.len());
    let mut weights = Vec::with_capacity(mesh.vertices.len());
    let mut overflowed = 0usize;
    let mut dangling = 0usize;
    let mut unbound = 0usize;

    for vertex in &mesh.vertices {
        let mut slots = SkinSlots::new();
        for influence in &vertex.weights {
            match skeleton.joint(influence.bone) {
                Some(joint) => slots.offer(joint as u16, influence.weight),
                None => dangling += 1,
            }
        }
        if slots.overflowed() {
            overflowed += 1;
        }
        if slots.is_empty() {
            unbound += 1;
            joints.push([0; 4]);
            weights.push([1.0, 0.0, 0.0, 0.0]);
            continue;
        }

        let (j, mut w) = slots.finish();
        let sum: f32 = w.iter().sum();
        if sum > 0.0 && (sum - 1.0).abs() > 1e-4 {
            w.iter_mut().for_each(|x| *x /= sum);
        }
        joints.push(j);
        weights.push(w);
    }

    if overflowed > 0 {
        warn!(object, vertices = overflowed, "more than 4 influences, smallest dropped");
    }
    if dangling > 0 {
        warn!(object, influences = dangling, "influences reference unknown bones");
    }
    if unbound > 0 {
        debug!(object, vertices = unbound, "unweighted vertices bound to the first joint");
    }
    (joints, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec4};
    use poly_common::{Bone, BoneSet, Face, Material, Morph, Vertex, ROOT_BONE_ID};

    fn document() -> Document {
        let mut doc = Document::new();
        let mut material = Material::new("skin");
        material.color = Vec4::new(1.0, 0.8, 0.7, 1.0);
        doc.materials.push(material);

        let mut object = MeshObject::new("body");
        for (i, p) in [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y]
            .into_iter()
            .enumerate()
        {
            let mut vertex = Vertex::new(p);
            vertex.uv = Some(Vec2::new(p.x, 1.0 - p.y));
            vertex.add_weight(if i < 2 { 1 } else { 2 }, 1.0);
            object.vertices.push(vertex);
        }
        object.faces.push(Face::new(vec![0, 1, 2, 3], Some(0)));
        let mut smile = Morph::new("smile");
        smile.positions.push((2, Vec3::new(0.0, 0.1, 0.0)));
        object.morphs.push(smile);
        doc.objects.push(object);

        let bones = doc.extensions.bones_or_insert();
        bones.push_unchecked(Bone::new(1, "hips", ROOT_BONE_ID, Vec3::ZERO));
        bones.push_unchecked(Bone::new(2, "spine", 1, Vec3::Y));
        doc
    }

    #[test]
    fn test_export_reads_back() {
        let glb = export_glb(&document(), &ConvertConfig::default(), None).unwrap();
        let gltf = gltf::Gltf::from_slice(&glb).unwrap();

        assert_eq!(gltf.nodes().count(), 3);
        assert_eq!(gltf.skins().count(), 1);
        assert_eq!(gltf.skins().next().unwrap().joints().count(), 2);
        let spine = gltf.nodes().nth(1).unwrap();
        assert_eq!(spine.name(), Some("spine"));
        let (translation, _, _) = spine.transform().decomposed();
        assert_eq!(translation, [0.0, 1.0, 0.0]);

        let mesh = gltf.meshes().next().unwrap();
        let primitive = mesh.primitives().next().unwrap();
        assert_eq!(primitive.morph_targets().count(), 1);
        assert_eq!(primitive.indices().unwrap().count(), 6);
        assert_eq!(primitive.material().index(), Some(0));
        assert!(primitive.get(&gltf::Semantic::Joints(0)).is_some());
        assert_eq!(crate::import::gltf::target_names(&mesh), vec!["smile".to_string()]);
    }

    #[test]
    fn test_bone_map_renames_joint_nodes() {
        let config = ConvertConfig::parse("[bone_map]\nhips_humanoid = \"hips\"\n").unwrap();
        let glb = export_glb(&document(), &config, None).unwrap();
        let gltf = gltf::Gltf::from_slice(&glb).unwrap();
        assert_eq!(gltf.nodes().next().unwrap().name(), Some("hips_humanoid"));
    }

    #[test]
    fn test_unweighted_vertex_binds_to_first_joint() {
        let mut doc = document();
        doc.objects[0].vertices[3].weights.clear();
        let skeleton = Skeleton::build(doc.extensions.bones().unwrap());
        let object = &doc.objects[0];
        let mesh = split_faces(object, &object.faces, 1e-4);
        let (joints, weights) = skin_attributes(&mesh, &skeleton, "body");

        let unweighted = mesh.emitted_from(3).next().unwrap();
        assert_eq!(joints[unweighted], [0; 4]);
        assert_eq!(weights[unweighted], [1.0, 0.0, 0.0, 0.0]);
        let spine = mesh.emitted_from(2).next().unwrap();
        assert_eq!(joints[spine][0], 1);
    }

    #[test]
    fn test_missing_texture_is_skipped() {
        let mut doc = document();
        doc.materials[0].texture = Some("missing.png".into());
        let dir = tempfile::tempdir().unwrap();
        let glb = export_glb(&doc, &ConvertConfig::default(), Some(dir.path())).unwrap();
        let gltf = gltf::Gltf::from_slice(&glb).unwrap();
        assert_eq!(gltf.textures().count(), 0);
        assert_eq!(gltf.materials().count(), 1);
    }

    #[test]
    fn test_unskinned_document_has_no_skin() {
        let mut doc = document();
        doc.extensions = Default::default();
        doc.objects[0].vertices.iter_mut().for_each(|v| v.weights.clear());
        let glb = export_glb(&doc, &ConvertConfig::default(), None).unwrap();
        let gltf = gltf::Gltf::from_slice(&glb).unwrap();
        assert_eq!(gltf.skins().count(), 0);
        assert_eq!(gltf.nodes().count(), 1);
    }
}

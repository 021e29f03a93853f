//! Binary FBX import
//!
//! Mesh control points are baked into model space with each model's global
//! matrix. Bone rest positions come from the cluster bind matrix when a skin
//! references the bone, else from the bone model's global matrix. FBX UVs
//! have a bottom-left origin and are flipped on the way in.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{DMat4, DVec3, Vec2, Vec3, Vec4};
use hashbrown::{HashMap, HashSet};
use poly_common::{Bone, BoneSet, Document, Face, Material, MeshObject, Morph, Vertex, ROOT_BONE_ID};
use poly_fbx::{parse_fbx, FbxDocument, FbxObject, HasWeights, Model, ObjectId, SceneGraph};
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::import::rest_position;

/// Read and convert a binary `.fbx` file
pub fn import_fbx(path: &Path, config: &ConvertConfig) -> Result<Document> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read FBX: {:?}", path))?;
    let fbx = parse_fbx(&data).with_context(|| format!("Failed to parse FBX: {:?}", path))?;
    document_from_fbx(&fbx, config)
}

fn to_vec3(v: DVec3, scale: f32) -> Vec3 {
    v.as_vec3() * scale
}

fn average(color: Option<DVec3>) -> Option<f32> {
    color.map(|c| (c.element_sum() / 3.0) as f32)
}

/// Convert a parsed FBX tree into a document
pub fn document_from_fbx(fbx: &FbxDocument, config: &ConvertConfig) -> Result<Document> {
    let graph = SceneGraph::build(fbx);
    let mut document = Document::new();

    let bone_ids = collect_bones(&graph, &mut document, config.scale)?;

    let mut materials: HashMap<ObjectId, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    for model in graph.models().filter(Model::is_mesh) {
        let Some(geometry) = model.geometry(&graph) else {
            debug!(model = model.name(), "mesh model without geometry");
            continue;
        };

        let base = match model.name() {
            "" => "mesh",
            name => name,
        };
        let mut name = base.to_string();
        let mut n = 1;
        while !taken.insert(name.clone()) {
            name = format!("{base}.{n}");
            n += 1;
        }

        let slots: Vec<usize> = model
            .materials(&graph)
            .into_iter()
            .map(|m| *materials.entry(m.id()).or_insert_with(|| {
                document.materials.push(convert_material(&m, &graph));
                document.materials.len() - 1
            }))
            .collect();

        let global = model.global_matrix(&graph);
        let object = convert_geometry(&geometry, &graph, global, &slots, &bone_ids, name, config.scale);
        document.objects.push(object);
    }

    document.validate().context("Converted FBX document is invalid")?;
    info!(
        version = fbx.version,
        objects = document.objects.len(),
        vertices = document.vertex_count(),
        faces = document.face_count(),
        bones = bone_ids.len(),
        "Imported FBX"
    );
    Ok(document)
}

/// Bone models in declaration order, ids starting at 1
fn collect_bones(
    graph: &SceneGraph<'_>,
    document: &mut Document,
    scale: f32,
) -> Result<HashMap<ObjectId, u32>> {
    let models: Vec<Model<'_>> = graph.models().filter(Model::is_bone).collect();
    if models.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: HashMap<ObjectId, u32> = models
        .iter()
        .enumerate()
        .map(|(i, m)| (m.id(), i as u32 + 1))
        .collect();

    // Bind-pose positions from skin clusters win over the scene pose
    let mut bind_positions: HashMap<ObjectId, DVec3> = HashMap::new();
    for (_, node) in graph.index().iter() {
        let Some(cluster) = poly_fbx::Cluster::from_node(node) else {
            continue;
        };
        if let (Some(bone), Some(link)) = (cluster.bone(graph), cluster.transform_link()) {
            bind_positions.entry(bone.id()).or_insert(rest_position(&link));
        }
    }

    let mut bones = BoneSet::new();
    for model in &models {
        let parent = graph
            .parent_model(model)
            .and_then(|p| ids.get(&p.id()).copied())
            .unwrap_or(ROOT_BONE_ID);
        let position = bind_positions
            .get(&model.id())
            .copied()
            .unwrap_or_else(|| rest_position(&model.global_matrix(graph)));
        bones.push_unchecked(Bone::new(ids[&model.id()], model.name(), parent, to_vec3(position, scale)));
    }
    bones.validate().context("Invalid FBX bone hierarchy")?;
    *document.extensions.bones_or_insert() = bones;
    Ok(ids)
}

fn convert_material(material: &poly_fbx::Material<'_>, graph: &SceneGraph<'_>) -> Material {
    let mut converted = Material::new(material.name());
    if let Some(diffuse) = material.diffuse_color() {
        let d = diffuse.as_vec3();
        converted.color = Vec4::new(d.x, d.y, d.z, material.opacity() as f32);
    }
    if let Some(ambient) = average(material.ambient_color()) {
        converted.ambient = ambient;
    }
    if let Some(emissive) = average(material.emissive_color()) {
        converted.emissive = emissive;
    }
    if let Some(specular) = average(material.specular_color()) {
        converted.specular = specular;
    }
    if let Some(shininess) = material.shininess() {
        converted.power = shininess as f32;
    }
    converted.texture = material
        .diffuse_texture(graph)
        .and_then(|t| t.file_name())
        .map(|f| f.replace('\\', "/"));
    converted
}

fn convert_geometry(
    geometry: &poly_fbx::Geometry<'_>,
    graph: &SceneGraph<'_>,
    global: DMat4,
    slots: &[usize],
    bone_ids: &HashMap<ObjectId, u32>,
    name: String,
    scale: f32,
) -> MeshObject {
    let mut object = MeshObject::new(name);
    let control_points = geometry.control_points();
    object.vertices = control_points
        .iter()
        .map(|&p| Vertex::new(to_vec3(global.transform_point3(p), scale)))
        .collect();

    let normals = geometry.normals();
    let uvs = geometry.uvs();
    let mut skipped = 0usize;
    for (p, polygon) in geometry.polygons().iter().enumerate() {
        if polygon.control_points.len() < 3
            || polygon.control_points.iter().any(|&c| c >= control_points.len())
        {
            skipped += 1;
            continue;
        }
        let material = geometry.material_slot(p).and_then(|s| slots.get(s).copied());
        let mut face = Face::new(polygon.control_points.clone(), material);

        let corner = |c: usize| (polygon.first_corner + c, polygon.control_points[c]);
        face.uvs = uvs.as_ref().and_then(|layer| {
            (0..polygon.control_points.len())
                .map(|c| {
                    let (slot, cp) = corner(c);
                    match layer.value(p, slot, cp)? {
                        [u, v] => Some(Vec2::new(*u as f32, 1.0 - *v as f32)),
                        _ => None,
                    }
                })
                .collect()
        });
        face.normals = normals.as_ref().and_then(|layer| {
            (0..polygon.control_points.len())
                .map(|c| {
                    let (slot, cp) = corner(c);
                    match layer.value(p, slot, cp)? {
                        [x, y, z] => Some(
                            global
                                .transform_vector3(DVec3::new(*x, *y, *z))
                                .normalize_or_zero()
                                .as_vec3(),
                        ),
                        _ => None,
                    }
                })
                .collect()
        });
        object.faces.push(face);
    }
    if skipped > 0 {
        warn!(object = %object.name, skipped, "degenerate or out-of-range polygons skipped");
    }

    for skin in geometry.skins(graph) {
        for cluster in skin.clusters(graph) {
            let Some(bone) = cluster.bone(graph).and_then(|b| bone_ids.get(&b.id()).copied()) else {
                warn!(cluster = cluster.name(), "cluster without a bone");
                continue;
            };
            for (cp, weight) in cluster.weighted_indices() {
                if let Some(vertex) = object.vertices.get_mut(cp) {
                    if weight > 0.0 {
                        vertex.add_weight(bone, weight as f32);
                    }
                }
            }
        }
    }

    for channel in geometry.blend_shape_channels(graph) {
        // The first shape is the full-weight target
        let Some(shape) = channel.shapes(graph).into_iter().next() else {
            continue;
        };
        let mut morph = Morph::new(channel.name());
        for (&index, delta) in shape.indexes().iter().zip(shape.deltas()) {
            let Ok(v) = usize::try_from(index) else { continue };
            if v < object.vertices.len() {
                morph.positions.push((v, to_vec3(global.transform_vector3(delta), scale)));
            }
        }
        if !morph.is_empty() {
            object.morphs.push(morph);
        }
    }

    debug!(
        object = %object.name,
        vertices = object.vertices.len(),
        faces = object.faces.len(),
        morphs = object.morphs.len(),
        "converted FBX geometry"
    );
    object
}

//! glTF JSON document construction

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use gltf_json as json;
use gltf_json::validation::Checked::Valid;
use serde_json::value::RawValue;

use super::buffer::{AccessorIndex, BufferBuilder};

/// Accessors of one triangle primitive
#[derive(Debug, Clone)]
pub struct PrimitiveAccessors {
    pub positions: AccessorIndex,
    pub normals: Option<AccessorIndex>,
    pub uvs: Option<AccessorIndex>,
    pub joints: Option<AccessorIndex>,
    pub weights: Option<AccessorIndex>,
    pub indices: AccessorIndex,
    /// Position delta accessor per morph target
    pub targets: Vec<AccessorIndex>,
    pub material: Option<u32>,
}

/// Base colour material description
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    pub name: String,
    pub base_color: [f32; 4],
    pub double_sided: bool,
    /// Texture index from [`GltfBuilder::add_texture`]
    pub texture: Option<u32>,
}

/// Builder for a single-buffer glTF document
#[derive(Default)]
pub struct GltfBuilder {
    nodes: Vec<json::Node>,
    meshes: Vec<json::Mesh>,
    skins: Vec<json::Skin>,
    materials: Vec<json::Material>,
    textures: Vec<json::Texture>,
    images: Vec<json::Image>,
    samplers: Vec<json::texture::Sampler>,
    scene_roots: Vec<u32>,
}

impl GltfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Add a transform-only node
    pub fn add_node(&mut self, name: &str, translation: Option<[f32; 3]>) -> u32 {
        self.nodes.push(json::Node {
            camera: None,
            children: None,
            extensions: Default::default(),
            extras: Default::default(),
            matrix: None,
            mesh: None,
            name: Some(name.to_string()),
            rotation: None,
            scale: None,
            skin: None,
            translation,
            weights: None,
        });
        self.nodes.len() as u32 - 1
    }

    /// Rename an existing node
    pub fn rename_node(&mut self, node: u32, name: &str) {
        if let Some(n) = self.nodes.get_mut(node as usize) {
            n.name = Some(name.to_string());
        }
    }

    pub fn add_child(&mut self, parent: u32, child: u32) {
        if let Some(node) = self.nodes.get_mut(parent as usize) {
            node.children
                .get_or_insert_with(Vec::new)
                .push(json::Index::new(child));
        }
    }

    pub fn add_scene_root(&mut self, node: u32) {
        self.scene_roots.push(node);
    }

    /// Add a mesh node; morph names go to `extras.targetNames`
    pub fn add_mesh_node(
        &mut self,
        name: &str,
        primitives: &[PrimitiveAccessors],
        target_names: &[String],
        skin: Option<u32>,
    ) -> Result<u32> {
        let primitives = primitives.iter().map(build_primitive).collect();
        let extras = if target_names.is_empty() {
            Default::default()
        } else {
            let value = serde_json::json!({ "targetNames": target_names });
            Some(RawValue::from_string(value.to_string()).context("Failed to encode target names")?)
        };
        self.meshes.push(json::Mesh {
            extensions: Default::default(),
            extras,
            name: Some(name.to_string()),
            primitives,
            weights: (!target_names.is_empty()).then(|| vec![0.0; target_names.len()]),
        });

        let node = self.add_node(name, None);
        let entry = &mut self.nodes[node as usize];
        entry.mesh = Some(json::Index::new(self.meshes.len() as u32 - 1));
        entry.skin = skin.map(json::Index::new);
        Ok(node)
    }

    /// Add a skin over joint nodes; returns the skin index
    pub fn add_skin(
        &mut self,
        name: &str,
        skeleton_root: Option<u32>,
        joints: &[u32],
        inverse_bind_matrices: AccessorIndex,
    ) -> u32 {
        self.skins.push(json::Skin {
            extensions: Default::default(),
            extras: Default::default(),
            inverse_bind_matrices: Some(inverse_bind_matrices.as_json_index()),
            joints: joints.iter().map(|j| json::Index::new(*j)).collect(),
            name: Some(name.to_string()),
            skeleton: skeleton_root.map(json::Index::new),
        });
        self.skins.len() as u32 - 1
    }

    /// Add a PNG image stored in a buffer view; returns the texture index
    pub fn add_texture(&mut self, name: &str, view: json::Index<json::buffer::View>) -> u32 {
        if self.samplers.is_empty() {
            self.samplers.push(json::texture::Sampler {
                mag_filter: Some(Valid(json::texture::MagFilter::Linear)),
                min_filter: Some(Valid(json::texture::MinFilter::LinearMipmapLinear)),
                wrap_s: Valid(json::texture::WrappingMode::Repeat),
                wrap_t: Valid(json::texture::WrappingMode::Repeat),
                ..Default::default()
            });
        }
        self.images.push(json::Image {
            buffer_view: Some(view),
            mime_type: Some(json::image::MimeType("image/png".to_string())),
            name: Some(name.to_string()),
            uri: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        self.textures.push(json::Texture {
            name: Some(name.to_string()),
            sampler: Some(json::Index::new(0)),
            source: json::Index::new(self.images.len() as u32 - 1),
            extensions: Default::default(),
            extras: Default::default(),
        });
        self.textures.len() as u32 - 1
    }

    pub fn add_material(&mut self, desc: &MaterialDesc) -> u32 {
        let mut material = json::Material {
            name: Some(desc.name.clone()),
            double_sided: desc.double_sided,
            ..Default::default()
        };
        let pbr = &mut material.pbr_metallic_roughness;
        pbr.base_color_factor = json::material::PbrBaseColorFactor(desc.base_color);
        pbr.metallic_factor = json::material::StrengthFactor(0.0);
        pbr.base_color_texture = desc.texture.map(|t| json::texture::Info {
            index: json::Index::new(t),
            tex_coord: 0,
            extensions: Default::default(),
            extras: Default::default(),
        });
        if desc.base_color[3] < 1.0 {
            material.alpha_mode = Valid(json::material::AlphaMode::Blend);
        }
        self.materials.push(material);
        self.materials.len() as u32 - 1
    }

    /// Final root referencing the packed buffer
    pub fn build(self, buffer: &BufferBuilder, generator: &str) -> json::Root {
        let buffers = if buffer.data().is_empty() {
            Vec::new()
        } else {
            vec![json::Buffer {
                byte_length: buffer.data().len().into(),
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                uri: None,
            }]
        };

        json::Root {
            accessors: buffer.accessors().to_vec(),
            asset: json::Asset {
                copyright: None,
                extensions: Default::default(),
                extras: Default::default(),
                generator: Some(generator.to_string()),
                min_version: None,
                version: "2.0".to_string(),
            },
            buffers,
            buffer_views: buffer.views().to_vec(),
            images: self.images,
            materials: self.materials,
            meshes: self.meshes,
            nodes: self.nodes,
            samplers: self.samplers,
            scene: Some(json::Index::new(0)),
            scenes: vec![json::Scene {
                extensions: Default::default(),
                extras: Default::default(),
                name: Some("Scene".to_string()),
                nodes: self.scene_roots.into_iter().map(json::Index::new).collect(),
            }],
            skins: self.skins,
            textures: self.textures,
            ..Default::default()
        }
    }
}

fn build_primitive(accessors: &PrimitiveAccessors) -> json::mesh::Primitive {
    let mut attributes = BTreeMap::new();
    attributes.insert(
        Valid(json::mesh::Semantic::Positions),
        accessors.positions.as_json_index(),
    );
    let optional = [
        (json::mesh::Semantic::Normals, accessors.normals),
        (json::mesh::Semantic::TexCoords(0), accessors.uvs),
        (json::mesh::Semantic::Joints(0), accessors.joints),
        (json::mesh::Semantic::Weights(0), accessors.weights),
    ];
    for (semantic, accessor) in optional {
        if let Some(accessor) = accessor {
            attributes.insert(Valid(semantic), accessor.as_json_index());
        }
    }

    let targets = (!accessors.targets.is_empty()).then(|| {
        accessors
            .targets
            .iter()
            .map(|t| json::mesh::MorphTarget {
                positions: Some(t.as_json_index()),
                normals: None,
                tangents: None,
            })
            .collect()
    });

    json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices: Some(accessors.indices.as_json_index()),
        material: accessors.material.map(json::Index::new),
        mode: Valid(json::mesh::Mode::Triangles),
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_node_with_targets() {
        let mut buffer = BufferBuilder::new();
        let positions = buffer.pack_positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let delta = buffer.pack_positions(&[[0.0, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 0.0, 0.0]]);
        let indices = buffer.pack_indices(&[0, 1, 2]);

        let mut gltf = GltfBuilder::new();
        let primitive = PrimitiveAccessors {
            positions,
            normals: None,
            uvs: None,
            joints: None,
            weights: None,
            indices,
            targets: vec![delta],
            material: None,
        };
        let node = gltf
            .add_mesh_node("face", &[primitive], &["smile".to_string()], None)
            .unwrap();
        gltf.add_scene_root(node);
        let root = gltf.build(&buffer, "test");

        assert_eq!(root.meshes.len(), 1);
        let mesh = &root.meshes[0];
        assert_eq!(mesh.weights.as_deref(), Some(&[0.0][..]));
        assert_eq!(mesh.primitives[0].targets.as_ref().unwrap().len(), 1);
        let extras = mesh.extras.as_ref().unwrap().get();
        assert!(extras.contains("\"targetNames\":[\"smile\"]"));
        assert_eq!(root.scenes[0].nodes.len(), 1);
    }

    #[test]
    fn test_node_children() {
        let mut gltf = GltfBuilder::new();
        let hips = gltf.add_node("hips", Some([0.0, 1.0, 0.0]));
        let spine = gltf.add_node("spine", Some([0.0, 0.2, 0.0]));
        gltf.add_child(hips, spine);
        gltf.add_scene_root(hips);
        let root = gltf.build(&BufferBuilder::new(), "test");

        assert!(root.buffers.is_empty());
        assert_eq!(root.nodes[0].children.as_ref().unwrap()[0].value(), 1);
        assert_eq!(root.nodes[1].translation, Some([0.0, 0.2, 0.0]));
    }
}

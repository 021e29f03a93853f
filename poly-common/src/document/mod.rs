//! Format-agnostic intermediate document
//!
//! Every conversion goes reader -> format builder -> [`Document`] ->
//! conversion steps -> target builder -> writer. The document is built in one
//! pass, mutated in place (weight attachment, id assignment, morph grouping)
//! and then serialized wholesale.
//!
//! Geometry uses the shared-vertex model: a [`Vertex`] may carry its own UV,
//! but faces can override it per corner. Exporters that need per-corner
//! vertex identity run the splitter in `poly-convert`.

mod bone;
mod error;
mod extension;
mod morph;
mod physics;

pub use bone::{Bone, BoneFlags, BoneSet, Inherit, WeightRecord, ROOT_BONE_ID};
pub use error::DocumentError;
pub use extension::{Extension, ExtensionRegistry, BONE_TAG, MORPH_TAG, PHYSICS_TAG};
pub use morph::{Morph, MorphSet, MorphTarget, MorphTargetList};
pub use physics::{Joint, PhysicsMode, PhysicsSet, RigidBody, RigidShape};

use glam::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;

/// Single (bone id, weight) influence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneWeight {
    pub bone: u32,
    pub weight: f32,
}

/// Shared vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Option<Vec3>,
    pub uv: Option<Vec2>,
    /// Unbounded influence list, in insertion order
    pub weights: SmallVec<[BoneWeight; 4]>,
}

impl Vertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Add an influence, merging with an existing entry for the same bone
    pub fn add_weight(&mut self, bone: u32, weight: f32) {
        if let Some(existing) = self.weights.iter_mut().find(|w| w.bone == bone) {
            existing.weight += weight;
        } else {
            self.weights.push(BoneWeight { bone, weight });
        }
    }
}

/// N-gon face
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Face {
    /// Vertex indices (>= 3)
    pub indices: Vec<usize>,
    /// Per-corner UVs, parallel to `indices`
    pub uvs: Option<Vec<Vec2>>,
    /// Per-corner normals, parallel to `indices`
    pub normals: Option<Vec<Vec3>>,
    /// Index into [`Document::materials`]
    pub material: Option<usize>,
}

impl Face {
    pub fn new(indices: Vec<usize>, material: Option<usize>) -> Self {
        Self {
            indices,
            uvs: None,
            normals: None,
            material,
        }
    }

    pub fn corner_count(&self) -> usize {
        self.indices.len()
    }

    /// UV of a corner: the face's own UV if present, else the vertex UV
    pub fn corner_uv(&self, corner: usize, vertices: &[Vertex]) -> Option<Vec2> {
        self.uvs
            .as_ref()
            .and_then(|uvs| uvs.get(corner).copied())
            .or_else(|| vertices.get(self.indices[corner]).and_then(|v| v.uv))
    }

    /// Normal of a corner: the face's own normal if present, else the vertex normal
    pub fn corner_normal(&self, corner: usize, vertices: &[Vertex]) -> Option<Vec3> {
        self.normals
            .as_ref()
            .and_then(|normals| normals.get(corner).copied())
            .or_else(|| vertices.get(self.indices[corner]).and_then(|v| v.normal))
    }
}

/// Surface material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Base colour, RGBA
    pub color: Vec4,
    pub diffuse: f32,
    pub ambient: f32,
    pub emissive: f32,
    pub specular: f32,
    pub power: f32,
    /// Texture file, relative to the source document
    pub texture: Option<String>,
    pub double_sided: bool,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Vec4::ONE,
            diffuse: 0.8,
            ambient: 0.6,
            emissive: 0.0,
            specular: 0.0,
            power: 5.0,
            texture: None,
            double_sided: false,
        }
    }
}

/// Named mesh object (sub-mesh)
#[derive(Debug, Clone, PartialEq)]
pub struct MeshObject {
    pub name: String,
    pub visible: bool,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    /// Flat per-vertex morph deltas owned by this object
    pub morphs: Vec<Morph>,
}

impl MeshObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            vertices: Vec::new(),
            faces: Vec::new(),
            morphs: Vec::new(),
        }
    }

    /// True if any vertex carries at least one influence
    pub fn is_skinned(&self) -> bool {
        self.vertices.iter().any(|v| !v.weights.is_empty())
    }

    /// Materials referenced by faces, in first-use order
    pub fn used_materials(&self) -> Vec<Option<usize>> {
        let mut used = Vec::new();
        for face in &self.faces {
            if !used.contains(&face.material) {
                used.push(face.material);
            }
        }
        used
    }
}

/// Intermediate document: the hub of every conversion
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub materials: Vec<Material>,
    pub objects: Vec<MeshObject>,
    pub extensions: ExtensionRegistry,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of an object by name
    pub fn object_index(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name == name)
    }

    pub fn object(&self, name: &str) -> Option<&MeshObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut MeshObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    /// Position of a material by name
    pub fn material_index(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn vertex_count(&self) -> usize {
        self.objects.iter().map(|o| o.vertices.len()).sum()
    }

    pub fn face_count(&self) -> usize {
        self.objects.iter().map(|o| o.faces.len()).sum()
    }

    /// Check structural invariants: face indices in range, material indices
    /// in range, bone forest well-formed
    pub fn validate(&self) -> Result<(), DocumentError> {
        for object in &self.objects {
            for face in &object.faces {
                if face.indices.len() < 3 {
                    return Err(DocumentError::DegenerateFace {
                        object: object.name.clone(),
                        corners: face.indices.len(),
                    });
                }
                if let Some(&bad) = face.indices.iter().find(|&&i| i >= object.vertices.len()) {
                    return Err(DocumentError::VertexOutOfRange {
                        object: object.name.clone(),
                        index: bad,
                        count: object.vertices.len(),
                    });
                }
                if let Some(m) = face.material {
                    if m >= self.materials.len() {
                        return Err(DocumentError::MaterialOutOfRange {
                            object: object.name.clone(),
                            index: m,
                        });
                    }
                }
            }
        }

        if let Some(bones) = self.extensions.bones() {
            bones.validate()?;
        }

        Ok(())
    }
}

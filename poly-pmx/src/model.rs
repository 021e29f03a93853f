//! PMX model data structures
//!
//! Indices are kept as the signed values stored in the file; `-1` means
//! "none" for every index kind except vertices.

use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};

use crate::VERSION_2_1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf16Le,
    Utf8,
}

/// Byte width of an index field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    One,
    Two,
    Four,
}

impl IndexWidth {
    pub fn from_byte(width: u8) -> Option<Self> {
        match width {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub version: f32,
    pub encoding: TextEncoding,
    pub additional_uvs: u8,
    pub vertex_index: IndexWidth,
    pub texture_index: IndexWidth,
    pub material_index: IndexWidth,
    pub bone_index: IndexWidth,
    pub morph_index: IndexWidth,
    pub rigid_body_index: IndexWidth,
}

impl Header {
    /// 2.1 features (QDEF, flip and impulse morphs) are allowed
    pub fn is_2_1(&self) -> bool {
        self.version >= VERSION_2_1 - 1e-4
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub name_en: String,
    pub comment: String,
    pub comment_en: String,
}

/// Vertex skinning scheme
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    Bdef1 {
        bone: i32,
    },
    /// `weight` belongs to the first bone, `1 - weight` to the second
    Bdef2 {
        bones: [i32; 2],
        weight: f32,
    },
    Bdef4 {
        bones: [i32; 4],
        weights: [f32; 4],
    },
    /// Spherical deform; the C/R0/R1 vectors are kept but not interpreted
    Sdef {
        bones: [i32; 2],
        weight: f32,
        c: Vec3,
        r0: Vec3,
        r1: Vec3,
    },
    /// Dual-quaternion deform (2.1)
    Qdef {
        bones: [i32; 4],
        weights: [f32; 4],
    },
}

impl Weight {
    /// `(bone, weight)` pairs in declaration order
    pub fn influences(&self) -> Vec<(i32, f32)> {
        match *self {
            Self::Bdef1 { bone } => vec![(bone, 1.0)],
            Self::Bdef2 { bones, weight } | Self::Sdef { bones, weight, .. } => {
                vec![(bones[0], weight), (bones[1], 1.0 - weight)]
            }
            Self::Bdef4 { bones, weights } | Self::Qdef { bones, weights } => {
                bones.into_iter().zip(weights).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub additional_uvs: Vec<Vec4>,
    pub weight: Weight,
    pub edge_scale: f32,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaterialFlags: u8 {
        const NO_CULL = 0x01;
        const GROUND_SHADOW = 0x02;
        const DRAW_SHADOW = 0x04;
        const RECEIVE_SHADOW = 0x08;
        const EDGE = 0x10;
        const VERTEX_COLOR = 0x20;
        const POINT_DRAW = 0x40;
        const LINE_DRAW = 0x80;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toon {
    /// One of the ten built-in toon textures
    Shared(u8),
    /// Texture table index
    Texture(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub name_en: String,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_strength: f32,
    pub ambient: Vec3,
    pub flags: MaterialFlags,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture: i32,
    pub sphere_texture: i32,
    pub sphere_mode: u8,
    pub toon: Toon,
    pub memo: String,
    /// Number of face indices (3 per triangle) drawn with this material
    pub index_count: usize,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BoneFlags: u16 {
        /// Tail is another bone instead of an offset
        const INDEXED_TAIL = 0x0001;
        const ROTATABLE = 0x0002;
        const MOVABLE = 0x0004;
        const VISIBLE = 0x0008;
        const ENABLED = 0x0010;
        const IK = 0x0020;
        const INHERIT_LOCAL = 0x0080;
        const INHERIT_ROTATION = 0x0100;
        const INHERIT_TRANSLATION = 0x0200;
        const FIXED_AXIS = 0x0400;
        const LOCAL_AXES = 0x0800;
        const PHYSICS_AFTER_DEFORM = 0x1000;
        const EXTERNAL_PARENT = 0x2000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoneTail {
    Bone(i32),
    Offset(Vec3),
}

/// Inherited rotation/translation ("append" parent)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inherit {
    pub parent: i32,
    pub influence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkLink {
    pub bone: i32,
    /// Angle limits (min, max) in radians
    pub limits: Option<(Vec3, Vec3)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ik {
    pub target: i32,
    pub loop_count: i32,
    pub limit_angle: f32,
    pub links: Vec<IkLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub name_en: String,
    pub position: Vec3,
    pub parent: i32,
    pub layer: i32,
    pub flags: BoneFlags,
    pub tail: BoneTail,
    pub inherit: Option<Inherit>,
    pub fixed_axis: Option<Vec3>,
    /// Local X and Z axes
    pub local_axes: Option<(Vec3, Vec3)>,
    pub external_parent: Option<i32>,
    pub ik: Option<Ik>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupOffset {
    pub morph: i32,
    pub factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexOffset {
    pub vertex: i32,
    pub offset: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneOffset {
    pub bone: i32,
    pub translation: Vec3,
    pub rotation: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvOffset {
    pub vertex: i32,
    pub offset: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialOffset {
    /// `-1` targets every material
    pub material: i32,
    /// 0 = multiply, 1 = add
    pub operation: u8,
    pub diffuse: Vec4,
    pub specular: Vec3,
    pub specular_strength: f32,
    pub ambient: Vec3,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture_tint: Vec4,
    pub sphere_tint: Vec4,
    pub toon_tint: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseOffset {
    pub rigid_body: i32,
    pub local: bool,
    pub velocity: Vec3,
    pub torque: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MorphOffsets {
    Group(Vec<GroupOffset>),
    Vertex(Vec<VertexOffset>),
    Bone(Vec<BoneOffset>),
    /// `channel` 0 is the main UV, 1..=4 the additional ones
    Uv {
        channel: u8,
        offsets: Vec<UvOffset>,
    },
    Material(Vec<MaterialOffset>),
    Flip(Vec<GroupOffset>),
    Impulse(Vec<ImpulseOffset>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Morph {
    pub name: String,
    pub name_en: String,
    /// Editor panel (1 eyebrow, 2 eye, 3 mouth, 4 other)
    pub panel: u8,
    pub offsets: MorphOffsets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameItem {
    Bone(i32),
    Morph(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    pub name: String,
    pub name_en: String,
    pub special: bool,
    pub items: Vec<FrameItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub name: String,
    pub name_en: String,
    pub bone: i32,
    pub group: u8,
    pub non_collision_mask: u16,
    /// 0 sphere, 1 box, 2 capsule
    pub shape: u8,
    pub size: Vec3,
    pub position: Vec3,
    pub rotation: Vec3,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    /// 0 static, 1 dynamic, 2 dynamic with bone
    pub mode: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub name_en: String,
    pub kind: u8,
    pub body_a: i32,
    pub body_b: i32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub linear_min: Vec3,
    pub linear_max: Vec3,
    pub angular_min: Vec3,
    pub angular_max: Vec3,
    pub spring_linear: Vec3,
    pub spring_angular: Vec3,
}

/// Complete parsed model
#[derive(Debug, Clone, PartialEq)]
pub struct PmxModel {
    pub header: Header,
    pub info: ModelInfo,
    pub vertices: Vec<Vertex>,
    /// Triangle list, three vertex indices per face
    pub indices: Vec<u32>,
    pub textures: Vec<String>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    pub display_frames: Vec<DisplayFrame>,
    pub rigid_bodies: Vec<RigidBody>,
    pub joints: Vec<Joint>,
}

impl PmxModel {
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Index ranges of each material's faces, in material order
    pub fn material_ranges(&self) -> Vec<std::ops::Range<usize>> {
        let mut start = 0;
        self.materials
            .iter()
            .map(|m| {
                let end = (start + m.index_count).min(self.indices.len());
                let range = start..end;
                start = end;
                range
            })
            .collect()
    }
}

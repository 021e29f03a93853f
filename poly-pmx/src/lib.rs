//! PMX: skeletal character model reader
//!
//! PMX files are a flat sequence of length-prefixed sections (vertices,
//! faces, textures, materials, bones, morphs, display frames, rigid bodies,
//! joints). Index fields use the per-kind byte widths declared in the header.
//!
//! # Usage
//!
//! ```ignore
//! use poly_pmx::parse_pmx;
//!
//! let data = std::fs::read("model.pmx").unwrap();
//! let model = parse_pmx(&data).unwrap();
//! println!("{}: {} vertices, {} bones", model.info.name, model.vertices.len(), model.bones.len());
//! ```

mod error;
mod model;
mod parser;

pub use error::PmxError;
pub use model::{
    Bone, BoneFlags, BoneOffset, BoneTail, DisplayFrame, FrameItem, GroupOffset, Header, Ik,
    IkLink, ImpulseOffset, IndexWidth, Inherit, Joint, Material, MaterialFlags, MaterialOffset,
    ModelInfo, Morph, MorphOffsets, PmxModel, RigidBody, TextEncoding, Toon, UvOffset, Vertex,
    VertexOffset, Weight,
};
pub use parser::parse_pmx;

/// Magic bytes of a PMX file
pub const PMX_MAGIC: &[u8; 4] = b"PMX ";

/// Magic bytes of the legacy PMD format (recognised, not supported)
pub const PMD_MAGIC: &[u8; 3] = b"Pmd";

/// Additional UV channels allowed per vertex
pub const MAX_ADDITIONAL_UVS: u8 = 4;

/// Version that introduced QDEF weights and flip/impulse morphs
pub const VERSION_2_1: f32 = 2.1;

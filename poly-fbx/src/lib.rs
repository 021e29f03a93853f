//! Binary FBX support
//!
//! The file is a tree of named records, each carrying a list of typed
//! properties and child records. This crate keeps that tree 1:1 ([`Node`]),
//! reads and writes it ([`parse_fbx`], [`write_fbx`]) and resolves the
//! `Objects` / `Connections` sections into a [`SceneGraph`] in a second pass.
//! Typed views such as [`Model`] or [`Cluster`] borrow nodes from the tree.
//!
//! # Example
//!
//! ```no_run
//! use poly_fbx::{parse_fbx, FbxObject, SceneGraph};
//!
//! let bytes = std::fs::read("model.fbx").unwrap();
//! let document = parse_fbx(&bytes).unwrap();
//! let graph = SceneGraph::build(&document);
//! for model in graph.models() {
//!     println!("{} ({})", model.name(), model.kind());
//! }
//! ```

mod error;
mod graph;
mod node;
mod objects;
mod reader;
mod writer;

pub use error::FbxError;
pub use graph::{Connection, ConnectionKind, ObjectId, ObjectIndex, SceneGraph, SCENE_ROOT_ID};
pub use node::{FbxDocument, Node, Property};
pub use objects::{
    BlendShapeChannel, Cluster, FbxObject, Geometry, HasTransform, HasWeights, LayerElement,
    MappingMode, Material, Model, Polygon, ReferenceMode, Shape, Skin, Texture,
};
pub use reader::parse_fbx;
pub use writer::{write_fbx, ArrayCompression, FbxWriter, WriteOptions};

/// Magic bytes at the start of every binary FBX file (20 chars + `0x00 0x1A 0x00`)
pub const FBX_MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// Magic plus the `u32` version
pub const PROLOGUE_LEN: usize = 27;

/// Version written by default
pub const DEFAULT_VERSION: u32 = 7400;

/// First version whose record headers use 64-bit fields
pub const LARGE_HEADER_VERSION: u32 = 7500;

/// Size of a record header (end offset, property count, property list length,
/// name length) for a file version
pub fn record_header_len(version: u32) -> usize {
    if version >= LARGE_HEADER_VERSION {
        3 * 8 + 1
    } else {
        3 * 4 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_header_len() {
        assert_eq!(record_header_len(7400), 13);
        assert_eq!(record_header_len(7500), 25);
        assert_eq!(record_header_len(7700), 25);
    }
}

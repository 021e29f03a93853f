//! Conversion engine: steps that rewrite a [`poly_common::Document`]
//! between reading and writing

pub mod hierarchy;
pub mod morph_groups;
pub mod skin;
pub mod split;
pub mod weights;

pub use hierarchy::{resolve_bone_map, resolve_inherit_parents, warn_duplicate_names, Skeleton};
pub use morph_groups::{
    apply_blend_shape_presets, find_morph_groups, flatten_target_lists, split_morph_groups,
    FaceGroups, MorphGroup,
};
pub use skin::{SkinSlots, MAX_INFLUENCES};
pub use split::{split_faces, SplitMesh, SplitVertex, DEFAULT_UV_EPSILON};
pub use weights::{attach_weight_records, collect_weight_records};

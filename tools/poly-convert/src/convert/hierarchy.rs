//! Bone forest construction for export
//!
//! Joints are ordered parents-first. Rest positions are model space, so a
//! joint's local translation is its offset from the parent and its inverse
//! bind matrix is a pure translation.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};
use hashbrown::HashMap;
use poly_common::{inverse_bind_matrix, BoneFlags, BoneSet, ROOT_BONE_ID};
use tracing::{debug, warn};

/// Re-parent bones with a strong inherited rotation onto their inherit source
///
/// A bone qualifies when it has the inherit-rotation flag, its influence is
/// above `threshold` and the source's name is listed in `whitelist`. Must run
/// after every bone is loaded since sources may be declared later. Moves that
/// would close a cycle are refused. Returns the number of bones moved.
pub fn resolve_inherit_parents(bones: &mut BoneSet, threshold: f32, whitelist: &[String]) -> usize {
    let candidates: Vec<(u32, u32)> = bones
        .bones
        .iter()
        .filter(|b| b.flags.contains(BoneFlags::INHERIT_ROTATION))
        .filter_map(|b| {
            let inherit = b.inherit?;
            (inherit.influence > threshold).then_some((b.id, inherit.source))
        })
        .filter(|&(_, source)| {
            bones
                .get(source)
                .is_some_and(|s| whitelist.iter().any(|name| *name == s.name))
        })
        .collect();

    let mut moved = 0;
    for (id, source) in candidates {
        match bones.reparent(id, source) {
            Ok(()) => {
                debug!(bone = id, source, "re-parented onto inherit source");
                moved += 1;
            }
            Err(e) => warn!(bone = id, source, "inherit re-parenting refused: {e}"),
        }
    }
    moved
}

/// Exportable joint list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    /// Bone id of each joint, parents before children
    pub bone_ids: Vec<u32>,
    pub names: Vec<String>,
    /// Parent joint index, `None` for roots
    pub parents: Vec<Option<usize>>,
    /// Translation relative to the parent joint
    pub local_translations: Vec<Vec3>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl Skeleton {
    /// Order the bone forest and derive local transforms
    pub fn build(bones: &BoneSet) -> Self {
        let order = bones.topological_order();
        let joint_of: HashMap<u32, usize> =
            order.iter().enumerate().map(|(joint, &id)| (id, joint)).collect();

        let mut skeleton = Self::default();
        for &id in &order {
            let Some(bone) = bones.get(id) else { continue };
            let parent = (bone.parent != ROOT_BONE_ID)
                .then(|| joint_of.get(&bone.parent).copied())
                .flatten();
            let parent_position = bone
                .parent
                .ne(&ROOT_BONE_ID)
                .then(|| bones.get(bone.parent))
                .flatten()
                .map_or(Vec3::ZERO, |p| p.position);

            skeleton.bone_ids.push(id);
            skeleton.names.push(bone.name.clone());
            skeleton.parents.push(parent);
            skeleton.local_translations.push(bone.position - parent_position);
            skeleton.inverse_bind_matrices.push(inverse_bind_matrix(bone.position));
        }
        skeleton
    }

    pub fn len(&self) -> usize {
        self.bone_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bone_ids.is_empty()
    }

    /// Joint index of a bone id
    pub fn joint(&self, bone: u32) -> Option<usize> {
        self.bone_ids.iter().position(|&id| id == bone)
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(joint, _)| joint)
    }

    pub fn children(&self, joint: usize) -> impl Iterator<Item = usize> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(move |(_, p)| **p == Some(joint))
            .map(|(child, _)| child)
    }
}

/// Resolve the humanoid bone map to bone ids
///
/// Source names that match several bones are ambiguous; the first declared
/// bone wins and a warning is logged. Unknown source names are skipped.
pub fn resolve_bone_map(bones: &BoneSet, map: &BTreeMap<String, String>) -> HashMap<u32, String> {
    let mut resolved = HashMap::new();
    for (humanoid, source) in map {
        let mut matches = bones.bones.iter().filter(|b| &b.name == source);
        let Some(bone) = matches.next() else {
            warn!(humanoid = %humanoid, bone = %source, "mapped bone not found");
            continue;
        };
        if matches.next().is_some() {
            warn!(bone = %source, "several bones share this name, using the first");
        }
        resolved.insert(bone.id, humanoid.clone());
    }
    resolved
}

/// Log every bone name used more than once
pub fn warn_duplicate_names(bones: &BoneSet) -> usize {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for bone in &bones.bones {
        *seen.entry(bone.name.as_str()).or_default() += 1;
    }
    let mut duplicates = 0;
    for (name, count) in seen {
        if count > 1 {
            warn!(bone = %name, count, "duplicate bone name");
            duplicates += 1;
        }
    }
    duplicates
}

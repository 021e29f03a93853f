//! Extension sub-documents keyed by stable string tags
//!
//! Bone, morph and physics data ride along with the mesh document as a
//! heterogeneous list. Each variant owns exactly one tag, so a lookup by tag
//! always yields the matching variant.

use super::{BoneSet, MorphSet, PhysicsSet};

pub const BONE_TAG: &str = "bone";
pub const MORPH_TAG: &str = "morph";
pub const PHYSICS_TAG: &str = "physics";

/// One extension sub-document
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    Bones(BoneSet),
    Morphs(MorphSet),
    Physics(PhysicsSet),
}

impl Extension {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Bones(_) => BONE_TAG,
            Self::Morphs(_) => MORPH_TAG,
            Self::Physics(_) => PHYSICS_TAG,
        }
    }
}

/// Ordered extension list with at most one entry per tag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionRegistry {
    entries: Vec<Extension>,
}

macro_rules! accessors {
    ($get:ident, $get_mut:ident, $get_or_insert:ident, $variant:ident, $ty:ty, $tag:expr) => {
        pub fn $get(&self) -> Option<&$ty> {
            match self.get($tag)? {
                Extension::$variant(inner) => Some(inner),
                _ => None,
            }
        }

        pub fn $get_mut(&mut self) -> Option<&mut $ty> {
            match self.entries.iter_mut().find(|e| e.tag() == $tag)? {
                Extension::$variant(inner) => Some(inner),
                _ => None,
            }
        }

        pub fn $get_or_insert(&mut self) -> &mut $ty {
            let pos = match self.position($tag) {
                Some(pos) => pos,
                None => {
                    self.entries.push(Extension::$variant(<$ty>::default()));
                    self.entries.len() - 1
                }
            };
            match &mut self.entries[pos] {
                Extension::$variant(inner) => inner,
                other => unreachable!("tag '{}' holds a {} extension", $tag, other.tag()),
            }
        }
    };
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, tag: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.tag() == tag)
    }

    pub fn get(&self, tag: &str) -> Option<&Extension> {
        self.entries.iter().find(|e| e.tag() == tag)
    }

    /// Insert or replace the entry for the extension's tag
    pub fn insert(&mut self, extension: Extension) -> Option<Extension> {
        match self.position(extension.tag()) {
            Some(pos) => Some(std::mem::replace(&mut self.entries[pos], extension)),
            None => {
                self.entries.push(extension);
                None
            }
        }
    }

    pub fn remove(&mut self, tag: &str) -> Option<Extension> {
        let pos = self.position(tag)?;
        Some(self.entries.remove(pos))
    }

    /// Tags in insertion order
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(Extension::tag)
    }

    accessors!(bones, bones_mut, bones_or_insert, Bones, BoneSet, BONE_TAG);
    accessors!(morphs, morphs_mut, morphs_or_insert, Morphs, MorphSet, MORPH_TAG);
    accessors!(physics, physics_mut, physics_or_insert, Physics, PhysicsSet, PHYSICS_TAG);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Bone, MorphTargetList, ROOT_BONE_ID};
    use glam::Vec3;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.bones().is_none());

        registry
            .bones_or_insert()
            .insert(Bone::new(1, "root", ROOT_BONE_ID, Vec3::ZERO))
            .unwrap();
        assert_eq!(registry.bones_or_insert().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tags_keep_insertion_order() {
        let mut registry = ExtensionRegistry::new();
        registry.morphs_or_insert();
        registry.physics_or_insert();
        registry.bones_or_insert();
        assert_eq!(
            registry.tags().collect::<Vec<_>>(),
            vec![MORPH_TAG, PHYSICS_TAG, BONE_TAG]
        );
    }

    #[test]
    fn test_insert_replaces_same_tag() {
        let mut registry = ExtensionRegistry::new();
        registry.morphs_or_insert();
        let replaced = registry.insert(Extension::Morphs(MorphSet {
            target_lists: vec![MorphTargetList::new("base")],
        }));
        assert!(matches!(replaced, Some(Extension::Morphs(ref m)) if m.target_lists.is_empty()));
        assert_eq!(registry.morphs().unwrap().target_lists.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut registry = ExtensionRegistry::new();
        registry.physics_or_insert();
        assert!(matches!(registry.remove(PHYSICS_TAG), Some(Extension::Physics(_))));
        assert!(registry.physics().is_none());
        assert!(registry.remove(PHYSICS_TAG).is_none());
    }
}

//! Bone extension: skeleton forest and per-object weight records

use bitflags::bitflags;
use glam::Vec3;

use super::DocumentError;

/// Parent id of top-level bones
pub const ROOT_BONE_ID: u32 = 0;

bitflags! {
    /// Behaviour flags carried over from the source skeleton
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BoneFlags: u16 {
        const ROTATABLE = 1 << 0;
        const MOVABLE = 1 << 1;
        const VISIBLE = 1 << 2;
        const IK = 1 << 3;
        const INHERIT_ROTATION = 1 << 4;
        const INHERIT_TRANSLATION = 1 << 5;
        /// Helper bone without deforming influence
        const DUMMY = 1 << 6;
    }
}

/// Inherited (granted) rotation/translation source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inherit {
    pub source: u32,
    pub influence: f32,
}

/// Skeleton bone
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// 1-based id; 0 is the root sentinel
    pub id: u32,
    pub name: String,
    /// Parent bone id, [`ROOT_BONE_ID`] for top-level bones
    pub parent: u32,
    /// Rest position in model space
    pub position: Vec3,
    pub flags: BoneFlags,
    pub inherit: Option<Inherit>,
}

impl Bone {
    pub fn new(id: u32, name: impl Into<String>, parent: u32, position: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            position,
            flags: BoneFlags::ROTATABLE | BoneFlags::VISIBLE,
            inherit: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent == ROOT_BONE_ID
    }
}

/// One (bone, object, vertex, weight) association
///
/// Vertex ids restart per object, so records are always object-scoped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRecord {
    pub bone: u32,
    /// 1-based position in [`Document::objects`](super::Document::objects)
    pub object: u32,
    /// 1-based vertex position inside the object
    pub vertex: u32,
    pub weight: f32,
}

/// Bones plus the weight records that reference them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneSet {
    pub bones: Vec<Bone>,
    pub weights: Vec<WeightRecord>,
}

impl BoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Bone> {
        self.bones.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Bone> {
        self.bones.iter_mut().find(|b| b.id == id)
    }

    /// First bone with the given name
    pub fn by_name(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// Next free id (ids are 1-based)
    pub fn next_id(&self) -> u32 {
        self.bones.iter().map(|b| b.id).max().unwrap_or(ROOT_BONE_ID) + 1
    }

    /// Add a bone whose parent is already known
    pub fn insert(&mut self, bone: Bone) -> Result<u32, DocumentError> {
        if bone.id == ROOT_BONE_ID {
            return Err(DocumentError::ReservedBoneId);
        }
        if self.get(bone.id).is_some() {
            return Err(DocumentError::DuplicateBoneId(bone.id));
        }
        if bone.parent != ROOT_BONE_ID && self.get(bone.parent).is_none() {
            return Err(DocumentError::UnknownParentBone {
                bone: bone.id,
                parent: bone.parent,
            });
        }
        let id = bone.id;
        self.bones.push(bone);
        Ok(id)
    }

    /// Add a bone without checking its parent (bulk loading from formats
    /// that may declare parents after children); call [`validate`](Self::validate)
    /// once everything is loaded
    pub fn push_unchecked(&mut self, bone: Bone) {
        self.bones.push(bone);
    }

    /// Direct children of a bone, in declaration order
    pub fn children_of(&self, id: u32) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(move |b| b.parent == id && b.id != id)
    }

    /// True if `ancestor` is on the parent chain of `id` (or equal to it)
    pub fn is_ancestor(&self, ancestor: u32, id: u32) -> bool {
        let mut current = id;
        for _ in 0..=self.bones.len() {
            if current == ancestor {
                return true;
            }
            match self.get(current) {
                Some(bone) if bone.parent != ROOT_BONE_ID => current = bone.parent,
                _ => return false,
            }
        }
        false
    }

    /// Change a bone's parent, refusing cycles and unknown parents
    pub fn reparent(&mut self, id: u32, new_parent: u32) -> Result<(), DocumentError> {
        if self.get(id).is_none() {
            return Err(DocumentError::UnknownBone(id));
        }
        if new_parent != ROOT_BONE_ID {
            if self.get(new_parent).is_none() {
                return Err(DocumentError::UnknownParentBone {
                    bone: id,
                    parent: new_parent,
                });
            }
            if self.is_ancestor(id, new_parent) {
                return Err(DocumentError::BoneCycle { bone: id });
            }
        }
        if let Some(bone) = self.get_mut(id) {
            bone.parent = new_parent;
        }
        Ok(())
    }

    /// Bones ordered so every parent precedes its children
    ///
    /// Top-level bones keep declaration order; children follow depth-first.
    pub fn topological_order(&self) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.bones.len());
        let mut stack: Vec<u32> = self
            .bones
            .iter()
            .filter(|b| b.is_root() || self.get(b.parent).is_none())
            .map(|b| b.id)
            .rev()
            .collect();

        while let Some(id) = stack.pop() {
            if order.contains(&id) {
                continue;
            }
            order.push(id);
            let children: Vec<u32> = self.children_of(id).map(|b| b.id).collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Check the forest invariants: unique non-zero ids, known parents, no cycles
    pub fn validate(&self) -> Result<(), DocumentError> {
        for (i, bone) in self.bones.iter().enumerate() {
            if bone.id == ROOT_BONE_ID {
                return Err(DocumentError::ReservedBoneId);
            }
            if self.bones[..i].iter().any(|b| b.id == bone.id) {
                return Err(DocumentError::DuplicateBoneId(bone.id));
            }
            if bone.parent != ROOT_BONE_ID && self.get(bone.parent).is_none() {
                return Err(DocumentError::UnknownParentBone {
                    bone: bone.id,
                    parent: bone.parent,
                });
            }
        }
        for bone in &self.bones {
            if bone.parent != ROOT_BONE_ID && self.is_ancestor(bone.id, bone.parent) {
                return Err(DocumentError::BoneCycle { bone: bone.id });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> BoneSet {
        let mut set = BoneSet::new();
        set.insert(Bone::new(1, "hips", ROOT_BONE_ID, Vec3::ZERO)).unwrap();
        set.insert(Bone::new(2, "spine", 1, Vec3::Y)).unwrap();
        set.insert(Bone::new(3, "head", 2, Vec3::Y * 2.0)).unwrap();
        set.insert(Bone::new(4, "arm", 2, Vec3::X)).unwrap();
        set
    }

    #[test]
    fn test_insert_requires_known_parent() {
        let mut set = chain();
        let err = set.insert(Bone::new(9, "orphan", 42, Vec3::ZERO)).unwrap_err();
        assert_eq!(err, DocumentError::UnknownParentBone { bone: 9, parent: 42 });
        assert_eq!(
            set.insert(Bone::new(0, "root", 0, Vec3::ZERO)).unwrap_err(),
            DocumentError::ReservedBoneId
        );
        assert_eq!(
            set.insert(Bone::new(2, "again", 1, Vec3::ZERO)).unwrap_err(),
            DocumentError::DuplicateBoneId(2)
        );
    }

    #[test]
    fn test_reparent_refuses_cycle() {
        let mut set = chain();
        assert_eq!(
            set.reparent(1, 3).unwrap_err(),
            DocumentError::BoneCycle { bone: 1 }
        );
        set.reparent(4, 1).unwrap();
        assert_eq!(set.get(4).unwrap().parent, 1);
    }

    #[test]
    fn test_topological_order_with_forward_parent() {
        let mut set = BoneSet::new();
        // Child declared before its parent
        set.push_unchecked(Bone::new(1, "child", 2, Vec3::ZERO));
        set.push_unchecked(Bone::new(2, "parent", ROOT_BONE_ID, Vec3::ZERO));
        set.push_unchecked(Bone::new(3, "other", ROOT_BONE_ID, Vec3::ZERO));
        assert!(set.validate().is_ok());
        assert_eq!(set.topological_order(), vec![2, 1, 3]);
    }

    #[test]
    fn test_validate_detects_cycle() {
        let mut set = BoneSet::new();
        set.push_unchecked(Bone::new(1, "a", 2, Vec3::ZERO));
        set.push_unchecked(Bone::new(2, "b", 1, Vec3::ZERO));
        assert!(matches!(set.validate(), Err(DocumentError::BoneCycle { .. })));
    }

    #[test]
    fn test_next_id() {
        assert_eq!(BoneSet::new().next_id(), 1);
        assert_eq!(chain().next_id(), 5);
    }
}

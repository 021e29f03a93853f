//! Morph data in both organisations
//!
//! - [`Morph`]: flat, sparse per-vertex deltas owned by one object
//!   (character and interchange formats)
//! - [`MorphTargetList`]: a base object plus whole duplicated target objects
//!   (mesh editor format)

use glam::{Vec2, Vec3};

/// Sparse per-vertex position / UV deltas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Morph {
    pub name: String,
    /// (vertex index, position delta)
    pub positions: Vec<(usize, Vec3)>,
    /// (vertex index, UV delta)
    pub uvs: Vec<(usize, Vec2)>,
}

impl Morph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Vertex indices touched by either delta list, position deltas first
    pub fn touched_vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions
            .iter()
            .map(|(v, _)| *v)
            .chain(self.uvs.iter().map(|(v, _)| *v))
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.uvs.is_empty()
    }

    pub fn position_delta(&self, vertex: usize) -> Option<Vec3> {
        self.positions
            .iter()
            .find(|(v, _)| *v == vertex)
            .map(|(_, d)| *d)
    }

    pub fn uv_delta(&self, vertex: usize) -> Option<Vec2> {
        self.uvs.iter().find(|(v, _)| *v == vertex).map(|(_, d)| *d)
    }
}

/// One duplicated target object
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTarget {
    /// Name of the target object in the document
    pub object: String,
    /// Default blend weight
    pub param: f32,
}

/// Base object plus its ordered duplicated targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphTargetList {
    pub base: String,
    pub targets: Vec<MorphTarget>,
}

impl MorphTargetList {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            targets: Vec::new(),
        }
    }

    pub fn push_target(&mut self, object: impl Into<String>) {
        self.targets.push(MorphTarget {
            object: object.into(),
            param: 0.0,
        });
    }
}

/// Morph extension
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphSet {
    pub target_lists: Vec<MorphTargetList>,
}

impl MorphSet {
    /// Target list whose base is `base`
    pub fn list_for_base(&self, base: &str) -> Option<&MorphTargetList> {
        self.target_lists.iter().find(|l| l.base == base)
    }

    /// True if `object` is a target of some list
    pub fn is_target(&self, object: &str) -> bool {
        self.target_lists
            .iter()
            .any(|l| l.targets.iter().any(|t| t.object == object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touched_vertices() {
        let mut morph = Morph::new("smile");
        morph.positions.push((4, Vec3::X));
        morph.uvs.push((7, Vec2::Y));
        assert_eq!(morph.touched_vertices().collect::<Vec<_>>(), vec![4, 7]);
        assert_eq!(morph.position_delta(4), Some(Vec3::X));
        assert_eq!(morph.uv_delta(4), None);
    }

    #[test]
    fn test_morph_set_lookup() {
        let mut list = MorphTargetList::new("MorphBase0");
        list.push_target("blink");
        let set = MorphSet {
            target_lists: vec![list],
        };
        assert!(set.is_target("blink"));
        assert!(!set.is_target("MorphBase0"));
        assert_eq!(set.list_for_base("MorphBase0").unwrap().targets.len(), 1);
    }
}

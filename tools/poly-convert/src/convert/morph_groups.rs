//! Morph grouping
//!
//! Flat per-vertex morphs are regrouped into base objects with duplicated
//! target objects, the layout the mesh editor stores. Grouping is two-level:
//!
//! 1. faces sharing a vertex form face groups (connected components)
//! 2. face groups touched by a common morph form morph groups
//!
//! A vertex belongs to exactly one face group, so looking at the first face
//! of each touched vertex is enough to find a morph's face groups.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Vec2, Vec3};
use hashbrown::{HashMap, HashSet};
use poly_common::{Document, Face, MeshObject, Morph, MorphTargetList};
use tracing::{debug, info, warn};

use crate::config::BlendShapePreset;

/// Squared length under which a flattened delta counts as zero
const ZERO_DELTA_EPSILON: f32 = 1e-12;

/// Face connectivity components of one object
#[derive(Debug, Clone, PartialEq)]
pub struct FaceGroups {
    /// Group of every face
    pub group_of_face: Vec<usize>,
    /// First face referencing every vertex, `None` for loose vertices
    pub first_face: Vec<Option<usize>>,
    pub count: usize,
}

impl FaceGroups {
    pub fn build(object: &MeshObject) -> Self {
        let mut faces_of_vertex: Vec<Vec<usize>> = vec![Vec::new(); object.vertices.len()];
        for (f, face) in object.faces.iter().enumerate() {
            for &v in &face.indices {
                if let Some(faces) = faces_of_vertex.get_mut(v) {
                    if faces.last() != Some(&f) {
                        faces.push(f);
                    }
                }
            }
        }

        let mut group_of_face = vec![usize::MAX; object.faces.len()];
        let mut count = 0;
        let mut stack = Vec::new();
        for start in 0..object.faces.len() {
            if group_of_face[start] != usize::MAX {
                continue;
            }
            group_of_face[start] = count;
            stack.push(start);
            while let Some(f) = stack.pop() {
                for &v in &object.faces[f].indices {
                    for &next in faces_of_vertex.get(v).into_iter().flatten() {
                        if group_of_face[next] == usize::MAX {
                            group_of_face[next] = count;
                            stack.push(next);
                        }
                    }
                }
            }
            count += 1;
        }

        let first_face = faces_of_vertex.iter().map(|faces| faces.first().copied()).collect();
        Self {
            group_of_face,
            first_face,
            count,
        }
    }

    /// Face groups touched by a morph, via the first face of each vertex
    pub fn touched_by(&self, morph: &Morph) -> BTreeSet<usize> {
        morph
            .touched_vertices()
            .filter_map(|v| self.first_face.get(v).copied().flatten())
            .map(|f| self.group_of_face[f])
            .collect()
    }
}

/// Morphs sharing face groups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MorphGroup {
    /// Face groups, ascending
    pub face_groups: Vec<usize>,
    /// Morph indices, ascending
    pub morphs: Vec<usize>,
}

/// Flood-fill the morph <-> face group touch relation
pub fn find_morph_groups(object: &MeshObject, face_groups: &FaceGroups) -> Vec<MorphGroup> {
    let touched: Vec<BTreeSet<usize>> = object.morphs.iter().map(|m| face_groups.touched_by(m)).collect();
    let mut morphs_of_group: HashMap<usize, Vec<usize>> = HashMap::new();
    for (m, groups) in touched.iter().enumerate() {
        for &g in groups {
            morphs_of_group.entry(g).or_default().push(m);
        }
    }

    let mut visited = vec![false; object.morphs.len()];
    let mut result = Vec::new();
    for start in 0..object.morphs.len() {
        if visited[start] || touched[start].is_empty() {
            continue;
        }
        visited[start] = true;
        let mut morphs = BTreeSet::from([start]);
        let mut groups = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(m) = stack.pop() {
            for &g in &touched[m] {
                if !groups.insert(g) {
                    continue;
                }
                for &other in morphs_of_group.get(&g).into_iter().flatten() {
                    if !visited[other] {
                        visited[other] = true;
                        morphs.insert(other);
                        stack.push(other);
                    }
                }
            }
        }
        result.push(MorphGroup {
            face_groups: groups.into_iter().collect(),
            morphs: morphs.into_iter().collect(),
        });
    }
    result
}

/// Pick `base`, or `base.N` for the smallest free N
fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    while taken.contains(&name) {
        name = format!("{base}.{n}");
        n += 1;
    }
    taken.insert(name.clone());
    name
}

/// Copy the given faces into a new object with compacted vertices
fn extract_faces(source: &MeshObject, faces: &[usize], name: String) -> (MeshObject, Vec<usize>) {
    let mut object = MeshObject::new(name);
    object.visible = source.visible;
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut sources = Vec::new();
    for &f in faces {
        let face = &source.faces[f];
        let indices = face
            .indices
            .iter()
            .map(|&v| {
                *remap.entry(v).or_insert_with(|| {
                    object.vertices.push(source.vertices[v].clone());
                    sources.push(v);
                    sources.len() - 1
                })
            })
            .collect();
        object.faces.push(Face {
            indices,
            ..face.clone()
        });
    }
    (object, sources)
}

/// Hidden copy of a base object with one morph applied
fn morph_clone(base: &MeshObject, sources: &[usize], morph: &Morph, name: String) -> MeshObject {
    let mut clone = base.clone();
    clone.name = name;
    clone.visible = false;

    let positions: HashMap<usize, Vec3> = morph.positions.iter().copied().collect();
    let uvs: HashMap<usize, Vec2> = morph.uvs.iter().copied().collect();
    for (vertex, source) in clone.vertices.iter_mut().zip(sources) {
        if let Some(delta) = positions.get(source) {
            vertex.position += *delta;
        }
    }

    if !uvs.is_empty() {
        for face in &mut clone.faces {
            let shifted: Vec<Option<Vec2>> = face
                .indices
                .iter()
                .map(|&v| uvs.get(&sources[v]).copied())
                .collect();
            if shifted.iter().all(Option::is_none) {
                continue;
            }
            let corners = (0..face.corner_count())
                .map(|c| {
                    let uv = face.corner_uv(c, &base.vertices).unwrap_or(Vec2::ZERO);
                    uv + shifted[c].unwrap_or(Vec2::ZERO)
                })
                .collect();
            face.uvs = Some(corners);
        }
    }
    clone
}

/// Split every morph-carrying object into base and target objects
///
/// Each morph group becomes a `MorphBase{n}` object plus one hidden clone per
/// morph, registered as a target list in the morph extension. Faces no morph
/// touches are regrouped per material. Returns the number of morph groups.
pub fn split_morph_groups(document: &mut Document) -> usize {
    let mut taken: HashSet<String> = document.objects.iter().map(|o| o.name.clone()).collect();
    let mut target_lists = Vec::new();
    let mut objects = Vec::with_capacity(document.objects.len());
    let mut next_base = 1;

    for mut object in std::mem::take(&mut document.objects) {
        if object.morphs.is_empty() {
            objects.push(object);
            continue;
        }
        let face_groups = FaceGroups::build(&object);
        let groups = find_morph_groups(&object, &face_groups);
        let morphs = std::mem::take(&mut object.morphs);

        let mut grouped = vec![None; face_groups.count];
        for (n, group) in groups.iter().enumerate() {
            for &g in &group.face_groups {
                grouped[g] = Some(n);
            }
        }
        let dropped = morphs.len() - groups.iter().map(|g| g.morphs.len()).sum::<usize>();
        if dropped > 0 {
            warn!(object = %object.name, dropped, "morphs touching no face dropped");
        }

        // Untouched faces, split per material
        let mut by_material: BTreeMap<Option<usize>, Vec<usize>> = BTreeMap::new();
        for (f, face) in object.faces.iter().enumerate() {
            if grouped[face_groups.group_of_face[f]].is_none() {
                by_material.entry(face.material).or_default().push(f);
            }
        }
        taken.remove(&object.name);
        let single = by_material.len() == 1;
        for (material, faces) in &by_material {
            let name = if single {
                object.name.clone()
            } else {
                let suffix = material
                    .and_then(|m| document.materials.get(m))
                    .map_or("none", |m| m.name.as_str());
                format!("{}.{suffix}", object.name)
            };
            let (plain, _) = extract_faces(&object, faces, unique_name(&name, &mut taken));
            objects.push(plain);
        }

        for group in &groups {
            let faces: Vec<usize> = (0..object.faces.len())
                .filter(|&f| {
                    group
                        .face_groups
                        .binary_search(&face_groups.group_of_face[f])
                        .is_ok()
                })
                .collect();
            let base_name = unique_name(&format!("MorphBase{next_base}"), &mut taken);
            next_base += 1;
            let (base, sources) = extract_faces(&object, &faces, base_name);

            let mut list = MorphTargetList::new(base.name.clone());
            let mut clones = Vec::with_capacity(group.morphs.len());
            for &m in &group.morphs {
                let name = unique_name(&morphs[m].name, &mut taken);
                list.push_target(name.clone());
                clones.push(morph_clone(&base, &sources, &morphs[m], name));
            }
            debug!(
                base = %base.name,
                targets = clones.len(),
                faces = base.faces.len(),
                "morph group"
            );
            objects.push(base);
            objects.extend(clones);
            target_lists.push(list);
        }
    }

    document.objects = objects;
    let count = target_lists.len();
    if count > 0 {
        document.extensions.morphs_or_insert().target_lists.extend(target_lists);
        info!(groups = count, "split morphs into target objects");
    }
    count
}

/// Turn duplicated target objects back into flat morphs on their base
///
/// Targets whose vertex count differs from the base are skipped with a
/// warning. Target objects are removed from the document either way.
/// Returns the number of morphs created.
pub fn flatten_target_lists(document: &mut Document) -> usize {
    let Some(set) = document.extensions.morphs_mut() else {
        return 0;
    };
    let lists = std::mem::take(&mut set.target_lists);

    let mut created = 0;
    let mut consumed: HashSet<String> = HashSet::new();
    for list in &lists {
        let Some(base_index) = document.object_index(&list.base) else {
            warn!(base = %list.base, "morph base object not found");
            continue;
        };
        let mut morphs = Vec::new();
        for target in &list.targets {
            consumed.insert(target.object.clone());
            let Some(object) = document.object(&target.object) else {
                warn!(target = %target.object, "morph target object not found");
                continue;
            };
            let base = &document.objects[base_index];
            if object.vertices.len() != base.vertices.len() {
                warn!(
                    base = %base.name,
                    target = %object.name,
                    base_vertices = base.vertices.len(),
                    target_vertices = object.vertices.len(),
                    "morph target vertex count differs, skipped"
                );
                continue;
            }
            morphs.push(target_delta(base, object));
        }
        created += morphs.len();
        document.objects[base_index].morphs.extend(morphs);
    }

    document.objects.retain(|o| !consumed.contains(&o.name));
    if created > 0 {
        debug!(morphs = created, "flattened morph target lists");
    }
    created
}

/// Deltas from `base` to `target`; the target's name becomes the morph name
fn target_delta(base: &MeshObject, target: &MeshObject) -> Morph {
    let mut morph = Morph::new(target.name.clone());
    for (v, (a, b)) in base.vertices.iter().zip(&target.vertices).enumerate() {
        let delta = b.position - a.position;
        if delta.length_squared() > ZERO_DELTA_EPSILON {
            morph.positions.push((v, delta));
        }
    }

    if base.faces.len() == target.faces.len() {
        let mut seen = HashSet::new();
        for (base_face, target_face) in base.faces.iter().zip(&target.faces) {
            for (c, &v) in base_face.indices.iter().enumerate() {
                if !seen.insert(v) {
                    continue;
                }
                let from = base_face.corner_uv(c, &base.vertices);
                let to = target_face.corner_uv(c, &target.vertices);
                if let (Some(from), Some(to)) = (from, to) {
                    let delta = to - from;
                    if delta.length_squared() > ZERO_DELTA_EPSILON {
                        morph.uvs.push((v, delta));
                    }
                }
            }
        }
    } else {
        warn!(target = %target.name, "face count differs from base, UV deltas ignored");
    }
    morph
}

/// Add one summed morph per blend shape preset to every object that has
/// at least one of the preset's source morphs
pub fn apply_blend_shape_presets(document: &mut Document, presets: &[BlendShapePreset]) -> usize {
    let mut added = 0;
    for preset in presets {
        let mut found = false;
        for object in &mut document.objects {
            let sources: Vec<&Morph> = object
                .morphs
                .iter()
                .filter(|m| preset.morphs.contains(&m.name))
                .collect();
            if sources.is_empty() {
                continue;
            }
            found = true;

            let mut positions: BTreeMap<usize, Vec3> = BTreeMap::new();
            let mut uvs: BTreeMap<usize, Vec2> = BTreeMap::new();
            for morph in sources {
                for &(v, d) in &morph.positions {
                    *positions.entry(v).or_insert(Vec3::ZERO) += d;
                }
                for &(v, d) in &morph.uvs {
                    *uvs.entry(v).or_insert(Vec2::ZERO) += d;
                }
            }
            object.morphs.push(Morph {
                name: preset.preset.clone(),
                positions: positions.into_iter().collect(),
                uvs: uvs.into_iter().collect(),
            });
            added += 1;
        }
        if !found {
            warn!(preset = %preset.preset, "no source morph found for blend shape");
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use poly_common::{Material, Vertex};

    /// Triangle A (0, 1, 2) and triangle B (3, 4, 5), no shared vertices
    fn two_triangles() -> MeshObject {
        let mut object = MeshObject::new("body");
        for x in [0.0, 10.0] {
            for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
                let mut vertex = Vertex::new(p + Vec3::new(x, 0.0, 0.0));
                vertex.uv = Some(Vec2::new(p.x, p.y));
                object.vertices.push(vertex);
            }
        }
        object.faces.push(Face::new(vec![0, 1, 2], Some(0)));
        object.faces.push(Face::new(vec![3, 4, 5], Some(0)));
        object
    }

    fn smile() -> Morph {
        Morph {
            name: "smile".into(),
            positions: vec![(1, Vec3::new(0.0, 0.5, 0.0))],
            uvs: vec![(2, Vec2::new(0.25, 0.0))],
        }
    }

    fn document(object: MeshObject) -> Document {
        let mut doc = Document::new();
        doc.materials.push(Material::new("skin"));
        doc.objects.push(object);
        doc
    }

    #[test]
    fn test_two_triangles_one_morph_group() {
        let mut object = two_triangles();
        object.morphs.push(smile());

        let face_groups = FaceGroups::build(&object);
        assert_eq!(face_groups.count, 2);

        let groups = find_morph_groups(&object, &face_groups);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].face_groups, vec![face_groups.group_of_face[0]]);
        assert_eq!(groups[0].morphs, vec![0]);
    }

    #[test]
    fn test_shared_vertex_joins_face_groups() {
        let mut object = two_triangles();
        object.faces.push(Face::new(vec![2, 3, 4], Some(0)));
        assert_eq!(FaceGroups::build(&object).count, 1);
    }

    #[test]
    fn test_morphs_sharing_a_face_group_merge() {
        let mut object = two_triangles();
        object.morphs.push(smile());
        object.morphs.push(Morph {
            name: "wide".into(),
            positions: vec![(0, Vec3::X), (4, Vec3::X)],
            uvs: Vec::new(),
        });
        object.morphs.push(Morph {
            name: "lone".into(),
            positions: vec![(5, Vec3::Y)],
            uvs: Vec::new(),
        });

        let groups = find_morph_groups(&object, &FaceGroups::build(&object));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].face_groups, vec![0, 1]);
        assert_eq!(groups[0].morphs, vec![0, 1, 2]);
    }

    #[test]
    fn test_split_creates_base_and_hidden_clone() {
        let mut object = two_triangles();
        object.morphs.push(smile());
        let mut doc = document(object);

        assert_eq!(split_morph_groups(&mut doc), 1);
        let names: Vec<&str> = doc.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["body", "MorphBase1", "smile"]);

        // Triangle B stays an ordinary object
        assert_eq!(doc.objects[0].faces.len(), 1);
        assert_eq!(doc.objects[0].vertices[0].position, Vec3::new(10.0, 0.0, 0.0));

        let clone = &doc.objects[2];
        assert!(!clone.visible);
        assert_eq!(clone.vertices[1].position, Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(clone.faces[0].uvs.as_ref().unwrap()[2], Vec2::new(0.25, 1.0));

        let list = doc.extensions.morphs().unwrap().list_for_base("MorphBase1").unwrap();
        assert_eq!(list.targets.len(), 1);
        assert_eq!(list.targets[0].object, "smile");
        doc.validate().unwrap();
    }

    #[test]
    fn test_split_then_flatten_restores_deltas() {
        let mut object = two_triangles();
        object.morphs.push(smile());
        let mut doc = document(object);
        split_morph_groups(&mut doc);

        assert_eq!(flatten_target_lists(&mut doc), 1);
        assert_eq!(doc.objects.len(), 2);
        let base = doc.object("MorphBase1").unwrap();
        let morph = &base.morphs[0];
        assert_eq!(morph.name, "smile");
        assert_eq!(morph.position_delta(1), Some(Vec3::new(0.0, 0.5, 0.0)));
        assert_eq!(morph.uv_delta(2), Some(Vec2::new(0.25, 0.0)));
    }

    #[test]
    fn test_flatten_skips_mismatched_target() {
        let mut doc = document(two_triangles());
        let mut target = two_triangles();
        target.name = "broken".into();
        target.vertices.pop();
        doc.objects.push(target);
        let mut list = MorphTargetList::new("body");
        list.push_target("broken");
        doc.extensions.morphs_or_insert().target_lists.push(list);

        assert_eq!(flatten_target_lists(&mut doc), 0);
        assert_eq!(doc.objects.len(), 1);
        assert!(doc.objects[0].morphs.is_empty());
    }

    #[test]
    fn test_blend_shape_preset_sums_sources() {
        let mut object = two_triangles();
        object.morphs.push(smile());
        object.morphs.push(Morph {
            name: "raise".into(),
            positions: vec![(1, Vec3::new(0.0, 0.25, 0.0))],
            uvs: Vec::new(),
        });
        let mut doc = document(object);
        let presets = vec![BlendShapePreset {
            preset: "joy".into(),
            morphs: vec!["smile".into(), "raise".into()],
        }];

        assert_eq!(apply_blend_shape_presets(&mut doc, &presets), 1);
        let joy = doc.objects[0].morphs.last().unwrap();
        assert_eq!(joy.name, "joy");
        assert_eq!(joy.position_delta(1), Some(Vec3::new(0.0, 0.75, 0.0)));
    }
}

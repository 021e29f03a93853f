//! Vertex-identity splitter
//!
//! Interchange formats carry one UV and one normal per vertex, so a shared
//! vertex on a UV seam has to become several output vertices. Corners of
//! the same shared vertex reuse an output vertex when their UVs match.

use glam::{Vec2, Vec3};
use hashbrown::HashMap;
use poly_common::{polygon_normal, triangulate, BoneWeight, Face, MeshObject};
use smallvec::SmallVec;

/// Default squared UV distance under which corners are merged
pub const DEFAULT_UV_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct SplitVertex {
    /// Index of the shared vertex this was emitted from
    pub source: usize,
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Option<Vec2>,
    pub weights: SmallVec<[BoneWeight; 4]>,
}

/// Triangle mesh with one attribute set per vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitMesh {
    pub vertices: Vec<SplitVertex>,
    pub triangles: Vec<[u32; 3]>,
}

impl SplitMesh {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Output vertex indices emitted from `source`
    pub fn emitted_from(&self, source: usize) -> impl Iterator<Item = usize> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(move |(_, v)| v.source == source)
            .map(|(i, _)| i)
    }

    pub fn has_uvs(&self) -> bool {
        self.vertices.iter().any(|v| v.uv.is_some())
    }
}

fn uv_matches(a: Option<Vec2>, b: Option<Vec2>, epsilon: f32) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.distance_squared(b) < epsilon,
        _ => false,
    }
}

/// Split and triangulate the given faces of an object
///
/// Corners without a normal get the face's flat normal. Faces that
/// reference missing vertices are skipped.
pub fn split_faces<'a>(
    object: &MeshObject,
    faces: impl IntoIterator<Item = &'a Face>,
    epsilon: f32,
) -> SplitMesh {
    let mut mesh = SplitMesh::default();
    let mut emitted: HashMap<usize, SmallVec<[u32; 2]>> = HashMap::new();

    for face in faces {
        if face.indices.iter().any(|&v| v >= object.vertices.len()) {
            continue;
        }
        let points: Vec<Vec3> = face.indices.iter().map(|&v| object.vertices[v].position).collect();
        let flat_normal = polygon_normal(&points).normalize_or(Vec3::Y);

        let corners: Vec<u32> = face
            .indices
            .iter()
            .enumerate()
            .map(|(corner, &source)| {
                let uv = face.corner_uv(corner, &object.vertices);
                let candidates = emitted.entry(source).or_default();
                if let Some(&existing) = candidates
                    .iter()
                    .find(|&&i| uv_matches(mesh.vertices[i as usize].uv, uv, epsilon))
                {
                    return existing;
                }
                let shared = &object.vertices[source];
                let index = mesh.vertices.len() as u32;
                mesh.vertices.push(SplitVertex {
                    source,
                    position: shared.position,
                    normal: face
                        .corner_normal(corner, &object.vertices)
                        .unwrap_or(flat_normal),
                    uv,
                    weights: shared.weights.clone(),
                });
                candidates.push(index);
                index
            })
            .collect();

        for [a, b, c] in triangulate(&points) {
            mesh.triangles.push([corners[a], corners[b], corners[c]]);
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use poly_common::Vertex;

    /// Unit quad split into two triangles sharing the 0-2 edge
    fn quad() -> MeshObject {
        let mut object = MeshObject::new("quad");
        for p in [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y] {
            let mut vertex = Vertex::new(p);
            vertex.uv = Some(Vec2::new(p.x, p.y));
            object.vertices.push(vertex);
        }
        object.faces.push(Face::new(vec![0, 1, 2], None));
        object.faces.push(Face::new(vec![0, 2, 3], None));
        object
    }

    #[test]
    fn test_shared_uvs_reuse_vertices() {
        let object = quad();
        let mesh = split_faces(&object, &object.faces, DEFAULT_UV_EPSILON);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_uv_seam_duplicates_vertex() {
        let mut object = quad();
        object.faces[1].uvs = Some(vec![Vec2::new(0.5, 0.0), Vec2::ONE, Vec2::Y]);
        let mesh = split_faces(&object, &object.faces, DEFAULT_UV_EPSILON);

        // Vertex 0 is on the seam, vertex 2 is not
        assert_eq!(mesh.vertices.len(), 5);
        assert_eq!(mesh.emitted_from(0).count(), 2);
        assert_eq!(mesh.emitted_from(2).count(), 1);
        assert_eq!(mesh.triangles[1], [3, 2, 4]);
    }

    #[test]
    fn test_uv_within_epsilon_merges() {
        let mut object = quad();
        object.faces[1].uvs = Some(vec![Vec2::new(0.001, 0.0), Vec2::ONE, Vec2::Y]);
        let mesh = split_faces(&object, &object.faces, DEFAULT_UV_EPSILON);
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn test_quad_face_triangulated_with_flat_normal() {
        let mut object = quad();
        object.faces = vec![Face::new(vec![0, 1, 2, 3], None)];
        let mesh = split_faces(&object, &object.faces, DEFAULT_UV_EPSILON);
        assert_eq!(mesh.triangles.len(), 2);
        assert!(mesh.vertices.iter().all(|v| v.normal == Vec3::Z));
    }

    #[test]
    fn test_weights_follow_source() {
        let mut object = quad();
        object.vertices[0].add_weight(3, 1.0);
        object.faces[1].uvs = Some(vec![Vec2::new(0.5, 0.0), Vec2::ONE, Vec2::Y]);
        let mesh = split_faces(&object, &object.faces, DEFAULT_UV_EPSILON);
        for i in mesh.emitted_from(0) {
            assert_eq!(mesh.vertices[i].weights[0].bone, 3);
        }
    }
}

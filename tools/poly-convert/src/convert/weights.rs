//! Moving skin weights between the two document representations
//!
//! The mesh editor sidecar stores weights as object-scoped
//! [`WeightRecord`]s; every other format stores them on the vertices.

use poly_common::{Document, WeightRecord};
use tracing::{debug, warn};

/// Attach the bone extension's weight records to vertex influence lists
///
/// Records naming an unknown object, vertex or bone are dropped with a
/// warning. Returns the number of records attached.
pub fn attach_weight_records(document: &mut Document) -> usize {
    let Some(bones) = document.extensions.bones_mut() else {
        return 0;
    };
    let records = std::mem::take(&mut bones.weights);
    let known: Vec<u32> = bones.bones.iter().map(|b| b.id).collect();

    let mut attached = 0usize;
    let mut dropped = 0usize;
    for record in &records {
        let target = (record.object as usize)
            .checked_sub(1)
            .and_then(|o| document.objects.get_mut(o))
            .and_then(|object| {
                (record.vertex as usize)
                    .checked_sub(1)
                    .and_then(|v| object.vertices.get_mut(v))
            });
        match target {
            Some(vertex) if known.contains(&record.bone) => {
                vertex.add_weight(record.bone, record.weight);
                attached += 1;
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(dropped, "weight records reference unknown objects, vertices or bones");
    }
    debug!(attached, "attached weight records");
    attached
}

/// Rebuild the bone extension's weight records from vertex influences
///
/// Object and vertex ids follow the current object order, so call this after
/// any step that reorders or splits objects.
pub fn collect_weight_records(document: &mut Document) -> usize {
    let mut records = Vec::new();
    for (object_index, object) in document.objects.iter().enumerate() {
        for (vertex_index, vertex) in object.vertices.iter().enumerate() {
            for influence in &vertex.weights {
                records.push(WeightRecord {
                    bone: influence.bone,
                    object: object_index as u32 + 1,
                    vertex: vertex_index as u32 + 1,
                    weight: influence.weight,
                });
            }
        }
    }
    let count = records.len();
    if count > 0 || document.extensions.bones().is_some() {
        document.extensions.bones_or_insert().weights = records;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use poly_common::{Bone, MeshObject, Vertex, ROOT_BONE_ID};

    fn document() -> Document {
        let mut doc = Document::new();
        let mut object = MeshObject::new("body");
        object.vertices = vec![Vertex::new(Vec3::ZERO), Vertex::new(Vec3::X)];
        doc.objects.push(object);
        let bones = doc.extensions.bones_or_insert();
        bones
            .insert(Bone::new(1, "root", ROOT_BONE_ID, Vec3::ZERO))
            .unwrap();
        doc
    }

    #[test]
    fn test_attach_drops_dangling_records() {
        let mut doc = document();
        doc.extensions.bones_or_insert().weights = vec![
            WeightRecord { bone: 1, object: 1, vertex: 2, weight: 0.5 },
            WeightRecord { bone: 1, object: 2, vertex: 1, weight: 1.0 },
            WeightRecord { bone: 9, object: 1, vertex: 1, weight: 1.0 },
            WeightRecord { bone: 1, object: 1, vertex: 3, weight: 1.0 },
        ];

        assert_eq!(attach_weight_records(&mut doc), 1);
        let vertices = &doc.objects[0].vertices;
        assert!(vertices[0].weights.is_empty());
        assert_eq!(vertices[1].weights[0].bone, 1);
        assert_eq!(vertices[1].weights[0].weight, 0.5);
        assert!(doc.extensions.bones().unwrap().weights.is_empty());
    }

    #[test]
    fn test_collect_then_attach_restores_weights() {
        let mut doc = document();
        doc.objects[0].vertices[0].add_weight(1, 1.0);
        let expected = doc.objects[0].vertices.clone();

        assert_eq!(collect_weight_records(&mut doc), 1);
        let record = doc.extensions.bones().unwrap().weights[0];
        assert_eq!((record.object, record.vertex), (1, 1));

        doc.objects[0].vertices[0].weights.clear();
        attach_weight_records(&mut doc);
        assert_eq!(doc.objects[0].vertices, expected);
    }
}

//! Mesh editor export
//!
//! Flat morphs are split into base and target objects, and vertex weights
//! are turned back into object-scoped weight records for the sidecar.

use std::path::Path;

use anyhow::{Context, Result};
use poly_common::Document;
use tracing::info;

use crate::convert::{collect_weight_records, split_morph_groups};
use crate::mqo::{write_mqo, write_mqx, MqxSidecar};

/// Text of the `.mqo` file and its optional `.mqx` sidecar
#[derive(Debug, Clone, PartialEq)]
pub struct MqoOutput {
    pub mqo: String,
    /// Sidecar file name and contents
    pub mqx: Option<(String, String)>,
}

/// Convert a document; `mqo_name` is the output file name the sidecar
/// refers back to
///
/// Skin weights are read from the vertices. Any weight records already on
/// the bone extension are replaced.
pub fn export_mqo(document: &Document, mqo_name: &str) -> Result<MqoOutput> {
    let mut document = document.clone();
    let groups = split_morph_groups(&mut document);
    let records = collect_weight_records(&mut document);

    let sidecar = MqxSidecar {
        bones: document.extensions.bones().filter(|b| !b.is_empty()).cloned(),
        morphs: document
            .extensions
            .morphs()
            .filter(|m| !m.target_lists.is_empty())
            .cloned(),
    };

    let mqx = if sidecar.bones.is_some() || sidecar.morphs.is_some() {
        let stem = Path::new(mqo_name)
            .file_stem()
            .map_or_else(|| "model".into(), |s| s.to_string_lossy());
        let name = format!("{stem}.mqx");
        let xml = write_mqx(&sidecar, mqo_name).context("Failed to write MQX sidecar")?;
        Some((name, xml))
    } else {
        None
    };

    let mqo = write_mqo(&document, mqx.as_ref().map(|(name, _)| name.as_str()));
    info!(
        objects = document.objects.len(),
        morph_groups = groups,
        weight_records = records,
        sidecar = mqx.is_some(),
        "Built MQO"
    );
    Ok(MqoOutput { mqo, mqx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqo::{parse_mqo, parse_mqx};
    use glam::Vec3;
    use poly_common::{Bone, Face, MeshObject, Morph, Vertex, ROOT_BONE_ID};

    fn triangle(name: &str, offset: Vec3) -> MeshObject {
        let mut object = MeshObject::new(name);
        for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            let mut vertex = Vertex::new(p + offset);
            vertex.add_weight(1, 1.0);
            object.vertices.push(vertex);
        }
        object.faces.push(Face::new(vec![0, 1, 2], None));
        object
    }

    #[test]
    fn test_plain_document_has_no_sidecar() {
        let mut doc = Document::new();
        let mut object = triangle("body", Vec3::ZERO);
        object.vertices.iter_mut().for_each(|v| v.weights.clear());
        doc.objects.push(object);

        let output = export_mqo(&doc, "body.mqo").unwrap();
        assert!(output.mqx.is_none());
        assert!(!output.mqo.contains("IncludeXml"));
    }

    #[test]
    fn test_stale_weight_records_replaced_by_vertex_weights() {
        let mut doc = Document::new();
        doc.objects.push(triangle("body", Vec3::ZERO));
        let bones = doc.extensions.bones_or_insert();
        bones.push_unchecked(Bone::new(1, "hips", ROOT_BONE_ID, Vec3::ZERO));
        bones.weights.push(poly_common::WeightRecord {
            bone: 1,
            object: 1,
            vertex: 1,
            weight: 1.0,
        });

        let output = export_mqo(&doc, "body.mqo").unwrap();
        let bones = parse_mqx(&output.mqx.unwrap().1).unwrap().bones.unwrap();
        assert_eq!(bones.weights.len(), 3);
        assert!(bones.weights.iter().all(|w| w.weight == 1.0));
    }

    #[test]
    fn test_morphs_and_weights_go_to_sidecar() {
        let mut doc = Document::new();
        let mut object = triangle("face", Vec3::ZERO);
        let mut smile = Morph::new("smile");
        smile.positions.push((2, Vec3::new(0.0, 0.5, 0.0)));
        object.morphs.push(smile);
        doc.objects.push(object);
        doc.extensions
            .bones_or_insert()
            .push_unchecked(Bone::new(1, "head", ROOT_BONE_ID, Vec3::Y));

        let output = export_mqo(&doc, "out/face.mqo").unwrap();
        let (name, xml) = output.mqx.unwrap();
        assert_eq!(name, "face.mqx");

        let scene = parse_mqo(&output.mqo).unwrap();
        assert_eq!(scene.include_xml.as_deref(), Some("face.mqx"));
        let names: Vec<_> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["MorphBase1", "smile"]);
        assert_eq!(scene.objects[1].vertices[2].position, Vec3::new(0.0, 1.5, 0.0));

        let sidecar = parse_mqx(&xml).unwrap();
        let bones = sidecar.bones.unwrap();
        // Three vertices on the base plus three on the hidden target
        assert_eq!(bones.weights.len(), 6);
        let lists = sidecar.morphs.unwrap().target_lists;
        assert_eq!(lists[0].base, "MorphBase1");
        assert_eq!(lists[0].targets[0].object, "smile");
    }
}

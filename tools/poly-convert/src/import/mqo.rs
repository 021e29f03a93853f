//! Mesh editor (`.mqo` + `.mqx`) import
//!
//! The `.mqo` text carries geometry and materials. Bones, weights and morph
//! target lists live in the `.mqx` sidecar named by `IncludeXml`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use poly_common::Document;

use crate::config::ConvertConfig;
use crate::convert::attach_weight_records;
use crate::mqo::{parse_mqo, parse_mqx, MqoScene, MqxSidecar};

/// Read and convert a `.mqo` file and its sidecar
pub fn import_mqo(path: &Path, config: &ConvertConfig) -> Result<Document> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read MQO: {:?}", path))?;
    let text = String::from_utf8_lossy(&data);
    let scene = parse_mqo(&text).with_context(|| format!("Failed to parse MQO: {:?}", path))?;

    let sidecar = match &scene.include_xml {
        Some(name) => {
            let sidecar_path = path.parent().unwrap_or(Path::new(".")).join(name);
            if sidecar_path.is_file() {
                let xml = std::fs::read_to_string(&sidecar_path)
                    .with_context(|| format!("Failed to read MQX: {:?}", sidecar_path))?;
                Some(
                    parse_mqx(&xml)
                        .with_context(|| format!("Failed to parse MQX: {:?}", sidecar_path))?,
                )
            } else {
                warn!(path = ?sidecar_path, "included sidecar not found, bones and morphs skipped");
                None
            }
        }
        None => None,
    };

    document_from_mqo(scene, sidecar, config)
}

/// Combine a parsed scene with its sidecar
pub fn document_from_mqo(
    scene: MqoScene,
    sidecar: Option<MqxSidecar>,
    config: &ConvertConfig,
) -> Result<Document> {
    let mut document = Document::new();
    document.materials = scene.materials;
    document.objects = scene.objects;

    if config.scale != 1.0 {
        for vertex in document.objects.iter_mut().flat_map(|o| o.vertices.iter_mut()) {
            vertex.position *= config.scale;
        }
    }

    if let Some(sidecar) = sidecar {
        if let Some(mut bones) = sidecar.bones {
            if config.scale != 1.0 {
                bones.bones.iter_mut().for_each(|b| b.position *= config.scale);
            }
            *document.extensions.bones_or_insert() = bones;
        }
        if let Some(morphs) = sidecar.morphs {
            *document.extensions.morphs_or_insert() = morphs;
        }
    }
    attach_weight_records(&mut document);

    document.validate().context("Converted MQO document is invalid")?;
    info!(
        objects = document.objects.len(),
        vertices = document.vertex_count(),
        faces = document.face_count(),
        bones = document.extensions.bones().map_or(0, |b| b.len()),
        "Imported MQO"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use poly_common::{Bone, BoneSet, MorphSet, MorphTargetList, WeightRecord, ROOT_BONE_ID};

    const SCENE: &str = "Metasequoia Document
Format Text Ver 1.1

IncludeXml \"body.mqx\"
Object \"MorphBase1\" {
\tvertex 3 {
\t\t0 0 0
\t\t1 0 0
\t\t0 1 0
\t}
\tface 1 {
\t\t3 V(0 1 2)
\t}
}
Object \"smile\" {
\tvisible 0
\tvertex 3 {
\t\t0 0 0
\t\t1 0 0
\t\t0 2 0
\t}
\tface 1 {
\t\t3 V(0 1 2)
\t}
}
Eof
";

    fn sidecar() -> MqxSidecar {
        let mut bones = BoneSet::new();
        bones.push_unchecked(Bone::new(1, "center", ROOT_BONE_ID, Vec3::Y));
        bones.weights.push(WeightRecord {
            bone: 1,
            object: 1,
            vertex: 3,
            weight: 1.0,
        });
        let mut list = MorphTargetList::new("MorphBase1");
        list.push_target("smile");
        MqxSidecar {
            bones: Some(bones),
            morphs: Some(MorphSet { target_lists: vec![list] }),
        }
    }

    #[test]
    fn test_sidecar_weights_attach_to_vertices() {
        let scene = parse_mqo(SCENE).unwrap();
        let doc = document_from_mqo(scene, Some(sidecar()), &ConvertConfig::default()).unwrap();
        let base = doc.object("MorphBase1").unwrap();
        assert_eq!(base.vertices[2].weights.len(), 1);
        assert_eq!(base.vertices[2].weights[0].bone, 1);
        assert!(base.vertices[0].weights.is_empty());
        assert!(doc.extensions.bones().unwrap().weights.is_empty());
        assert!(doc.extensions.morphs().unwrap().is_target("smile"));
    }

    #[test]
    fn test_scale_applies_to_bones() {
        let scene = parse_mqo(SCENE).unwrap();
        let config = ConvertConfig {
            scale: 2.0,
            ..Default::default()
        };
        let doc = document_from_mqo(scene, Some(sidecar()), &config).unwrap();
        assert_eq!(doc.objects[0].vertices[1].position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(doc.extensions.bones().unwrap().get(1).unwrap().position, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_missing_sidecar_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.mqo");
        std::fs::write(&path, SCENE).unwrap();
        let doc = import_mqo(&path, &ConvertConfig::default()).unwrap();
        assert_eq!(doc.objects.len(), 2);
        assert!(doc.extensions.bones().is_none());
    }
}

//! poly-convert library
//!
//! Reads PMX, FBX, glTF and MQO models into a [`poly_common::Document`],
//! rewrites it with the conversion engine and writes GLB or MQO.

pub mod config;
pub mod convert;
pub mod export;
pub mod import;
pub mod mqo;
pub mod texture;

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use poly_common::Document;
use tracing::info;

pub use config::{BlendShapePreset, ConvertConfig, MaterialOverride};

/// File formats known to the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pmx,
    Fbx,
    Gltf,
    Mqo,
}

impl Format {
    /// Detect a format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        Ok(match ext.as_str() {
            "pmx" => Self::Pmx,
            "fbx" => Self::Fbx,
            "gltf" | "glb" => Self::Gltf,
            "mqo" => Self::Mqo,
            _ => bail!(
                "Unsupported model format: {:?} (use .pmx, .fbx, .gltf, .glb or .mqo)",
                path
            ),
        })
    }
}

/// Read any supported input file
pub fn load_document(path: &Path, config: &ConvertConfig) -> Result<Document> {
    match Format::from_path(path)? {
        Format::Pmx => import::import_pmx(path, config),
        Format::Fbx => import::import_fbx(path, config),
        Format::Gltf => import::import_gltf(path, config),
        Format::Mqo => import::import_mqo(path, config),
    }
}

/// Write a document as `.glb` or `.mqo` (plus `.mqx` sidecar)
///
/// `texture_dir` resolves relative texture paths for embedding.
pub fn save_document(
    document: &Document,
    path: &Path,
    config: &ConvertConfig,
    texture_dir: Option<&Path>,
) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "glb" => {
            let glb = export::export_glb(document, config, texture_dir)?;
            std::fs::write(path, glb).with_context(|| format!("Failed to write GLB: {:?}", path))?;
        }
        "mqo" => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model.mqo".to_string());
            let output = export::export_mqo(document, &file_name)?;
            std::fs::write(path, output.mqo)
                .with_context(|| format!("Failed to write MQO: {:?}", path))?;
            if let Some((name, xml)) = output.mqx {
                let sidecar = path.with_file_name(name);
                std::fs::write(&sidecar, xml)
                    .with_context(|| format!("Failed to write MQX: {:?}", sidecar))?;
            }
        }
        _ => bail!("Unsupported output format: {:?} (use .glb or .mqo)", path),
    }
    Ok(())
}

/// Convert one file to another
pub fn convert_file(input: &Path, output: &Path, config: &ConvertConfig) -> Result<()> {
    info!("Converting {:?} -> {:?}", input, output);
    let document = load_document(input, config)?;
    save_document(&document, output, config, input.parent())
}

/// Human-readable summary of a document
pub fn describe(document: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} objects, {} vertices, {} faces, {} materials",
        document.objects.len(),
        document.vertex_count(),
        document.face_count(),
        document.materials.len()
    );
    for object in &document.objects {
        let _ = writeln!(
            out,
            "  object {:?}: {} vertices, {} faces, {} morphs{}",
            object.name,
            object.vertices.len(),
            object.faces.len(),
            object.morphs.len(),
            if object.visible { "" } else { " (hidden)" }
        );
    }
    for material in &document.materials {
        let _ = writeln!(
            out,
            "  material {:?}{}",
            material.name,
            material
                .texture
                .as_ref()
                .map(|t| format!(" texture {t:?}"))
                .unwrap_or_default()
        );
    }
    if let Some(bones) = document.extensions.bones() {
        let roots = bones.bones.iter().filter(|b| b.is_root()).count();
        let _ = writeln!(out, "  bones: {} ({} roots)", bones.len(), roots);
    }
    if let Some(morphs) = document.extensions.morphs() {
        let _ = writeln!(out, "  morph target lists: {}", morphs.target_lists.len());
    }
    if let Some(physics) = document.extensions.physics() {
        let _ = writeln!(
            out,
            "  physics: {} rigid bodies, {} joints",
            physics.bodies.len(),
            physics.joints.len()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path(Path::new("a/miku.PMX")).unwrap(), Format::Pmx);
        assert_eq!(Format::from_path(Path::new("scene.glb")).unwrap(), Format::Gltf);
        assert_eq!(Format::from_path(Path::new("scene.gltf")).unwrap(), Format::Gltf);
        assert_eq!(Format::from_path(Path::new("body.mqo")).unwrap(), Format::Mqo);
        assert!(Format::from_path(Path::new("notes.txt")).is_err());
        assert!(Format::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_unsupported_output_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_document(
            &Document::new(),
            &dir.path().join("out.pmx"),
            &ConvertConfig::default(),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_describe_lists_objects() {
        let mut doc = Document::new();
        doc.objects.push(poly_common::MeshObject::new("body"));
        let text = describe(&doc);
        assert!(text.starts_with("1 objects, 0 vertices"));
        assert!(text.contains("object \"body\""));
    }
}

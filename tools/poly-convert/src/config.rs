//! Conversion settings (`convert.toml`)
//!
//! Every field has a default, so an empty file (or no file) is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Conversion settings shared by every importer and exporter
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Uniform scale applied to positions on import
    pub scale: f32,

    /// Inherited-rotation influence above which a bone is re-parented
    /// to its inherit source
    pub inherit_threshold: f32,

    /// Inherit source names eligible for re-parenting
    pub inherit_whitelist: Vec<String>,

    /// Squared UV distance under which two corners share an output vertex
    pub split_uv_epsilon: f32,

    /// Humanoid bone name -> source bone name
    pub bone_map: BTreeMap<String, String>,

    #[serde(rename = "material_override")]
    pub material_overrides: Vec<MaterialOverride>,

    #[serde(rename = "blend_shape")]
    pub blend_shapes: Vec<BlendShapePreset>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            inherit_threshold: 0.5,
            inherit_whitelist: Vec::new(),
            split_uv_epsilon: 1e-4,
            bone_map: BTreeMap::new(),
            material_overrides: Vec::new(),
            blend_shapes: Vec::new(),
        }
    }
}

/// Replacement values for one material, matched by name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialOverride {
    pub name: String,
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub color: Option<[f32; 4]>,
    #[serde(default)]
    pub double_sided: Option<bool>,
}

/// Named blend shape built from one or more source morphs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlendShapePreset {
    pub preset: String,
    pub morphs: Vec<String>,
}

impl ConvertConfig {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Parse settings from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid conversion config")
    }

    /// Override entry for a material name
    pub fn material_override(&self, name: &str) -> Option<&MaterialOverride> {
        self.material_overrides.iter().find(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ConvertConfig::parse("").unwrap();
        assert_eq!(config.scale, 1.0);
        assert_eq!(config.inherit_threshold, 0.5);
        assert!(config.inherit_whitelist.is_empty());
        assert_eq!(config.split_uv_epsilon, 1e-4);
    }

    #[test]
    fn test_full_config() {
        let config = ConvertConfig::parse(
            r#"
scale = 0.08
inherit_threshold = 0.4
inherit_whitelist = ["左腕捩", "右腕捩"]

[bone_map]
hips = "センター"
head = "頭"

[[material_override]]
name = "face"
texture = "face_alt.png"
double_sided = true

[[blend_shape]]
preset = "blink"
morphs = ["まばたき"]
"#,
        )
        .unwrap();

        assert_eq!(config.scale, 0.08);
        assert_eq!(config.inherit_whitelist.len(), 2);
        assert_eq!(config.bone_map.get("hips").map(String::as_str), Some("センター"));
        let face = config.material_override("face").unwrap();
        assert_eq!(face.texture.as_deref(), Some("face_alt.png"));
        assert_eq!(face.double_sided, Some(true));
        assert!(face.color.is_none());
        assert_eq!(config.blend_shapes[0].morphs, vec!["まばたき".to_string()]);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ConvertConfig::parse("scale = \"big\"").is_err());
    }
}

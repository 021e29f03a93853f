//! Texture loading for embedding
//!
//! Any raster `image` can decode is re-encoded as PNG, the one format every
//! glTF reader accepts.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Load an image file and re-encode it as PNG
pub fn load_texture_png(path: &Path) -> Result<Vec<u8>> {
    let img =
        image::open(path).with_context(|| format!("Failed to load texture: {}", path.display()))?;
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .with_context(|| format!("Failed to encode texture: {}", path.display()))?;
    Ok(png)
}

/// Resolve a document texture path against the source directory
///
/// Source formats often store Windows separators.
pub fn resolve_texture_path(texture: &str, base_dir: Option<&Path>) -> PathBuf {
    let normalized = texture.replace('\\', "/");
    match base_dir {
        Some(dir) if Path::new(&normalized).is_relative() => dir.join(normalized),
        _ => PathBuf::from(normalized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_texture_reencodes_png() {
        let dir = tempdir().unwrap();
        let img_path = dir.path().join("skin.bmp");
        let img = image::RgbaImage::from_fn(2, 2, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 255, 0, 255])
            }
        });
        img.save(&img_path).unwrap();

        let png = load_texture_png(&img_path).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 2);
    }

    #[test]
    fn test_missing_texture_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_texture_png(&dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn test_resolve_texture_path() {
        let base = Path::new("/models/miku");
        assert_eq!(
            resolve_texture_path("tex\\body.png", Some(base)),
            PathBuf::from("/models/miku/tex/body.png")
        );
        assert_eq!(resolve_texture_path("body.png", None), PathBuf::from("body.png"));
    }
}

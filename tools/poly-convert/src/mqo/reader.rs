//! Line-oriented `.mqo` parser
//!
//! Only the chunks the document model needs are decoded (`Material`,
//! `Object` with its `vertex` and `face` blocks, `IncludeXml`). Every other
//! chunk is skipped by brace depth.

use glam::{Vec2, Vec3, Vec4};
use poly_common::{Face, Material, MeshObject, Vertex};
use tracing::{debug, warn};

use super::{MqoError, MQO_SIGNATURE};

/// Contents of one `.mqo` file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MqoScene {
    pub materials: Vec<Material>,
    pub objects: Vec<MeshObject>,
    /// Sidecar file named by `IncludeXml`
    pub include_xml: Option<String>,
}

/// One `name(args)` item of a chunk line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Item<'a> {
    name: &'a str,
    args: &'a str,
}

/// Bare tokens (quotes stripped) and `name(args)` items of one line
fn tokenize(line: &str) -> (Vec<&str>, Vec<Item<'_>>) {
    let bytes = line.as_bytes();
    let mut bare = Vec::new();
    let mut items = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if bytes[i] == b'"' {
            let end = line[i + 1..].find('"').map_or(line.len(), |e| i + 1 + e);
            bare.push(&line[i + 1..end]);
            i = end + 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'(' {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'(' {
            let name = &line[start..i];
            let args_start = i + 1;
            let mut in_quotes = false;
            i = args_start;
            while i < bytes.len() && (in_quotes || bytes[i] != b')') {
                if bytes[i] == b'"' {
                    in_quotes = !in_quotes;
                }
                i += 1;
            }
            items.push(Item {
                name,
                args: &line[args_start..i.min(line.len())],
            });
            i += 1;
        } else {
            bare.push(&line[start..i]);
        }
    }
    (bare, items)
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches('"')
}

struct LineReader<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
}

impl<'a> LineReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            line: 0,
        }
    }

    /// Next non-empty trimmed line
    fn next_line(&mut self) -> Option<&'a str> {
        for (n, line) in self.lines.by_ref() {
            let line = line.trim();
            if !line.is_empty() {
                self.line = n + 1;
                return Some(line);
            }
        }
        None
    }

    fn expect(&mut self, chunk: &'static str) -> Result<&'a str, MqoError> {
        self.next_line().ok_or(MqoError::UnexpectedEof {
            line: self.line,
            chunk,
        })
    }

    /// Skip the remainder of a chunk whose opening line was just read
    fn skip_block(&mut self, chunk: &'static str) -> Result<(), MqoError> {
        let mut depth = 1usize;
        while depth > 0 {
            let line = self.expect(chunk)?;
            depth += line.matches('{').count();
            depth = depth.saturating_sub(line.matches('}').count());
        }
        Ok(())
    }

    fn number<T: std::str::FromStr>(&self, text: &str) -> Result<T, MqoError> {
        text.parse().map_err(|_| MqoError::InvalidNumber {
            line: self.line,
            text: text.to_string(),
        })
    }

    fn numbers<T: std::str::FromStr>(&self, text: &str) -> Result<Vec<T>, MqoError> {
        text.split_whitespace().map(|t| self.number(t)).collect()
    }

    fn syntax(&self, message: impl Into<String>) -> MqoError {
        MqoError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }
}

/// Parse a text `.mqo` document
pub fn parse_mqo(text: &str) -> Result<MqoScene, MqoError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = LineReader::new(text);
    if reader.next_line() != Some(MQO_SIGNATURE) {
        return Err(MqoError::InvalidHeader);
    }
    match reader.next_line() {
        Some(format) if format.starts_with("Format Text Ver") => {}
        _ => return Err(MqoError::InvalidHeader),
    }

    let mut scene = MqoScene::default();
    while let Some(line) = reader.next_line() {
        let (bare, _) = tokenize(line);
        match bare.first().copied() {
            Some("Eof") => break,
            Some("IncludeXml") => scene.include_xml = bare.get(1).map(|s| s.to_string()),
            Some("Material") => parse_materials(&mut reader, &mut scene.materials)?,
            Some("Object") => {
                let name = bare.get(1).copied().unwrap_or_default();
                let object = parse_object(&mut reader, name, scene.materials.len())?;
                scene.objects.push(object);
            }
            Some(chunk) if line.ends_with('{') => {
                debug!(chunk, line = reader.line, "skipping chunk");
                reader.skip_block("chunk")?;
            }
            _ => {}
        }
    }

    debug!(
        materials = scene.materials.len(),
        objects = scene.objects.len(),
        "parsed MQO"
    );
    Ok(scene)
}

fn parse_materials(reader: &mut LineReader<'_>, materials: &mut Vec<Material>) -> Result<(), MqoError> {
    loop {
        let line = reader.expect("Material")?;
        if line == "}" {
            return Ok(());
        }
        let (bare, items) = tokenize(line);
        let mut material = Material::new(bare.first().copied().unwrap_or_default());
        for item in items {
            match item.name {
                "col" => {
                    let c: Vec<f32> = reader.numbers(item.args)?;
                    if c.len() != 4 {
                        return Err(reader.syntax("col() needs 4 components"));
                    }
                    material.color = Vec4::new(c[0], c[1], c[2], c[3]);
                }
                "dif" => material.diffuse = reader.number(item.args.trim())?,
                "amb" => material.ambient = reader.number(item.args.trim())?,
                "emi" => material.emissive = reader.number(item.args.trim())?,
                "spc" => material.specular = reader.number(item.args.trim())?,
                "power" => material.power = reader.number(item.args.trim())?,
                "tex" => {
                    let path = unquote(item.args);
                    if !path.is_empty() {
                        material.texture = Some(path.replace('\\', "/"));
                    }
                }
                "dbls" => material.double_sided = item.args.trim() != "0",
                _ => {}
            }
        }
        materials.push(material);
    }
}

fn parse_object(
    reader: &mut LineReader<'_>,
    name: &str,
    material_count: usize,
) -> Result<MeshObject, MqoError> {
    let mut object = MeshObject::new(name);
    loop {
        let line = reader.expect("Object")?;
        if line == "}" {
            return Ok(object);
        }
        let (bare, _) = tokenize(line);
        match bare.first().copied() {
            Some("visible") => {
                let value: u32 = reader.number(bare.get(1).copied().unwrap_or("15"))?;
                object.visible = value != 0;
            }
            Some("vertex") => parse_vertices(reader, &mut object)?,
            Some("face") => parse_faces(reader, &mut object, material_count)?,
            _ if line.ends_with('{') => reader.skip_block("Object")?,
            _ => {}
        }
    }
}

fn parse_vertices(reader: &mut LineReader<'_>, object: &mut MeshObject) -> Result<(), MqoError> {
    loop {
        let line = reader.expect("vertex")?;
        if line == "}" {
            return Ok(());
        }
        let p: Vec<f32> = reader.numbers(line)?;
        if p.len() != 3 {
            return Err(reader.syntax("vertex needs 3 coordinates"));
        }
        object.vertices.push(Vertex::new(Vec3::new(p[0], p[1], p[2])));
    }
}

fn parse_faces(
    reader: &mut LineReader<'_>,
    object: &mut MeshObject,
    material_count: usize,
) -> Result<(), MqoError> {
    let mut skipped = 0usize;
    loop {
        let line = reader.expect("face")?;
        if line == "}" {
            if skipped > 0 {
                debug!(object = %object.name, skipped, "line and point faces skipped");
            }
            return Ok(());
        }
        let (bare, items) = tokenize(line);
        let count: usize = reader.number(bare.first().copied().unwrap_or_default())?;

        let mut face = Face::default();
        for item in items {
            match item.name {
                "V" => face.indices = reader.numbers(item.args)?,
                "M" => {
                    let m: i64 = reader.number(item.args.trim())?;
                    face.material = usize::try_from(m).ok().filter(|&m| {
                        let known = m < material_count;
                        if !known {
                            warn!(object = %object.name, material = m, "face material out of range");
                        }
                        known
                    });
                }
                "UV" => {
                    let uv: Vec<f32> = reader.numbers(item.args)?;
                    face.uvs = Some(uv.chunks_exact(2).map(|c| Vec2::new(c[0], c[1])).collect());
                }
                _ => {}
            }
        }

        if face.indices.len() != count {
            return Err(reader.syntax(format!(
                "face declares {count} corners but V() lists {}",
                face.indices.len()
            )));
        }
        if face.uvs.as_ref().is_some_and(|uvs| uvs.len() != count) {
            return Err(reader.syntax("UV() corner count differs from V()"));
        }
        if let Some(&bad) = face.indices.iter().find(|&&v| v >= object.vertices.len()) {
            return Err(reader.syntax(format!("vertex index {bad} out of range")));
        }
        if count < 3 {
            skipped += 1;
            continue;
        }
        object.faces.push(face);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_SIDE: &str = r#"Metasequoia Document
Format Text Ver 1.1

CodePage utf8
IncludeXml "side.mqx"
Scene {
	pos 0.0000 0.0000 1500.0000
	amb 0.250 0.250 0.250
	dirlights 1 {
		light {
			dir 0.408 0.408 0.816
		}
	}
}
Material 2 {
	"skin" shader(3) col(1.000 0.800 0.700 1.000) dif(0.800) amb(0.600) emi(0.000) spc(0.000) power(5.00) tex("tex\skin (1).png")
	"cloth" col(0.200 0.200 0.900 0.500) dif(1.000) amb(0.500) emi(0.100) spc(0.300) power(30.00) dbls(1)
}
Object "side" {
	depth 0
	visible 15
	shading 1
	vertex 4 {
		0.0000 0.0000 0.0000
		1.0000 0.0000 0.0000
		1.0000 1.0000 0.0000
		0.0000 1.0000 0.0000
	}
	vertexattr {
		uid {
			1
			2
		}
	}
	face 3 {
		2 V(0 1)
		4 V(0 1 2 3) M(0) UV(0.0000 1.0000 1.0000 1.0000 1.0000 0.0000 0.0000 0.0000)
		3 V(0 2 3) M(1)
	}
}
Object "hidden" {
	visible 0
	vertex 0 {
	}
	face 0 {
	}
}
Eof
"#;

    #[test]
    fn test_tokenize() {
        let (bare, items) = tokenize(r#""a b" col(1 2) tex("x (1).png") 7"#);
        assert_eq!(bare, vec!["a b", "7"]);
        assert_eq!(items[0], Item { name: "col", args: "1 2" });
        assert_eq!(items[1].args, r#""x (1).png""#);
    }

    #[test]
    fn test_parse_scene() {
        let scene = parse_mqo(CUBE_SIDE).unwrap();
        assert_eq!(scene.include_xml.as_deref(), Some("side.mqx"));

        assert_eq!(scene.materials.len(), 2);
        let skin = &scene.materials[0];
        assert_eq!(skin.name, "skin");
        assert_eq!(skin.color, Vec4::new(1.0, 0.8, 0.7, 1.0));
        assert_eq!(skin.texture.as_deref(), Some("tex/skin (1).png"));
        assert!(scene.materials[1].double_sided);
        assert_eq!(scene.materials[1].power, 30.0);

        assert_eq!(scene.objects.len(), 2);
        let side = &scene.objects[0];
        assert_eq!(side.vertices.len(), 4);
        // The 2-corner line face is dropped
        assert_eq!(side.faces.len(), 2);
        assert_eq!(side.faces[0].material, Some(0));
        assert_eq!(side.faces[0].uvs.as_ref().unwrap()[2], Vec2::new(1.0, 0.0));
        assert_eq!(side.faces[1].material, Some(1));
        assert!(!scene.objects[1].visible);
    }

    #[test]
    fn test_invalid_header() {
        assert!(matches!(parse_mqo("Hello\n"), Err(MqoError::InvalidHeader)));
    }

    #[test]
    fn test_corner_count_mismatch() {
        let text = "Metasequoia Document\nFormat Text Ver 1.1\nObject \"o\" {\n\tvertex 3 {\n\t\t0 0 0\n\t\t1 0 0\n\t\t0 1 0\n\t}\n\tface 1 {\n\t\t4 V(0 1 2)\n\t}\n}\nEof\n";
        assert!(matches!(parse_mqo(text), Err(MqoError::Syntax { line: 10, .. })));
    }

    #[test]
    fn test_truncated_object() {
        let text = "Metasequoia Document\nFormat Text Ver 1.1\nObject \"o\" {\n\tvertex 3 {\n\t\t0 0 0\n";
        assert!(matches!(
            parse_mqo(text),
            Err(MqoError::UnexpectedEof { chunk: "vertex", .. })
        ));
    }
}

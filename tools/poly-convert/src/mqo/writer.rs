//! `.mqo` text writer

use std::fmt::Write;

use poly_common::Document;
use tracing::warn;

use super::{MQO_FORMAT_LINE, MQO_SIGNATURE};

/// Names are written quoted; embedded quotes would end the token early
fn quoted(name: &str) -> String {
    if name.contains('"') {
        let replaced = name.replace('"', "'");
        warn!(name, written = %replaced, "double quotes in name written as single quotes");
        format!("\"{replaced}\"")
    } else {
        format!("\"{name}\"")
    }
}

/// Serialize materials and objects; `include_xml` names the sidecar
pub fn write_mqo(document: &Document, include_xml: Option<&str>) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_document(&mut out, document, include_xml);
    out
}

fn write_document(out: &mut String, document: &Document, include_xml: Option<&str>) -> std::fmt::Result {
    writeln!(out, "{MQO_SIGNATURE}")?;
    writeln!(out, "{MQO_FORMAT_LINE}")?;
    writeln!(out)?;
    writeln!(out, "CodePage utf8")?;
    if let Some(sidecar) = include_xml {
        writeln!(out, "IncludeXml {}", quoted(sidecar))?;
    }

    if !document.materials.is_empty() {
        writeln!(out, "Material {} {{", document.materials.len())?;
        for m in &document.materials {
            write!(
                out,
                "\t{} col({:.3} {:.3} {:.3} {:.3}) dif({:.3}) amb({:.3}) emi({:.3}) spc({:.3}) power({:.2})",
                quoted(&m.name),
                m.color.x,
                m.color.y,
                m.color.z,
                m.color.w,
                m.diffuse,
                m.ambient,
                m.emissive,
                m.specular,
                m.power
            )?;
            if let Some(texture) = &m.texture {
                write!(out, " tex({})", quoted(texture))?;
            }
            if m.double_sided {
                write!(out, " dbls(1)")?;
            }
            writeln!(out)?;
        }
        writeln!(out, "}}")?;
    }

    for object in &document.objects {
        writeln!(out, "Object {} {{", quoted(&object.name))?;
        writeln!(out, "\tvisible {}", if object.visible { 15 } else { 0 })?;
        writeln!(out, "\tshading 1")?;

        writeln!(out, "\tvertex {} {{", object.vertices.len())?;
        for v in &object.vertices {
            writeln!(out, "\t\t{:.6} {:.6} {:.6}", v.position.x, v.position.y, v.position.z)?;
        }
        writeln!(out, "\t}}")?;

        writeln!(out, "\tface {} {{", object.faces.len())?;
        for face in &object.faces {
            let indices: Vec<String> = face.indices.iter().map(usize::to_string).collect();
            write!(out, "\t\t{} V({})", face.indices.len(), indices.join(" "))?;
            if let Some(material) = face.material {
                write!(out, " M({material})")?;
            }
            let uvs: Vec<_> = (0..face.corner_count())
                .map(|c| face.corner_uv(c, &object.vertices))
                .collect();
            if uvs.iter().any(Option::is_some) {
                let uvs: Vec<String> = uvs
                    .into_iter()
                    .map(|uv| {
                        let uv = uv.unwrap_or_default();
                        format!("{:.6} {:.6}", uv.x, uv.y)
                    })
                    .collect();
                write!(out, " UV({})", uvs.join(" "))?;
            }
            writeln!(out)?;
        }
        writeln!(out, "\t}}")?;
        writeln!(out, "}}")?;
    }

    writeln!(out, "Eof")
}

//! Vertex and face sections

use tracing::warn;

use super::helpers::PmxReader;
use crate::error::PmxError;
use crate::model::{Header, Vertex, Weight};

/// position + normal + uv + weight tag + one bone + edge scale
const MIN_VERTEX_LEN: usize = 12 + 12 + 8 + 1 + 1 + 4;

pub(super) fn parse_vertices(
    reader: &mut PmxReader,
    header: &Header,
) -> Result<Vec<Vertex>, PmxError> {
    let count = reader.count("vertex")?;
    let mut vertices = Vec::with_capacity(reader.capacity(count, MIN_VERTEX_LEN));
    for index in 0..count {
        vertices.push(parse_vertex(reader, header, index)?);
    }
    Ok(vertices)
}

fn parse_vertex(reader: &mut PmxReader, header: &Header, index: usize) -> Result<Vertex, PmxError> {
    let position = reader.vec3()?;
    let normal = reader.vec3()?;
    let uv = reader.vec2()?;
    let additional_uvs = (0..header.additional_uvs)
        .map(|_| reader.vec4())
        .collect::<Result<Vec<_>, _>>()?;
    let weight = parse_weight(reader, header, index)?;
    let edge_scale = reader.f32()?;
    Ok(Vertex {
        position,
        normal,
        uv,
        additional_uvs,
        weight,
        edge_scale,
    })
}

fn parse_weight(reader: &mut PmxReader, header: &Header, vertex: usize) -> Result<Weight, PmxError> {
    let width = header.bone_index;
    let tag = reader.u8()?;
    let weight = match tag {
        0 => Weight::Bdef1 {
            bone: reader.index(width)?,
        },
        1 => Weight::Bdef2 {
            bones: [reader.index(width)?, reader.index(width)?],
            weight: reader.f32()?,
        },
        2 | 4 => {
            if tag == 4 && !header.is_2_1() {
                return Err(PmxError::UnknownWeightType { vertex, tag });
            }
            let bones = [
                reader.index(width)?,
                reader.index(width)?,
                reader.index(width)?,
                reader.index(width)?,
            ];
            let weights = [reader.f32()?, reader.f32()?, reader.f32()?, reader.f32()?];
            if tag == 2 {
                Weight::Bdef4 { bones, weights }
            } else {
                Weight::Qdef { bones, weights }
            }
        }
        3 => Weight::Sdef {
            bones: [reader.index(width)?, reader.index(width)?],
            weight: reader.f32()?,
            c: reader.vec3()?,
            r0: reader.vec3()?,
            r1: reader.vec3()?,
        },
        _ => return Err(PmxError::UnknownWeightType { vertex, tag }),
    };
    Ok(weight)
}

/// Face section: an index count followed by the vertex indices
pub(super) fn parse_faces(
    reader: &mut PmxReader,
    header: &Header,
    vertex_count: usize,
) -> Result<Vec<u32>, PmxError> {
    let count = reader.count("face index")?;
    let width = header.vertex_index;
    let mut indices = Vec::with_capacity(reader.capacity(count, width.bytes()));
    let mut out_of_range = 0usize;
    for _ in 0..count {
        let index = reader.vertex_index(width)?;
        match u32::try_from(index) {
            Ok(i) if (i as usize) < vertex_count => indices.push(i),
            _ => {
                out_of_range += 1;
                indices.push(0);
            }
        }
    }
    if out_of_range > 0 {
        warn!(out_of_range, "face indices outside the vertex range, clamped to 0");
    }
    if count % 3 != 0 {
        warn!(count, "face index count is not a multiple of 3");
    }
    Ok(indices)
}

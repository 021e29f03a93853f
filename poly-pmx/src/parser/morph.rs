//! Morph and display frame sections

use tracing::debug;

use super::helpers::PmxReader;
use crate::error::PmxError;
use crate::model::{
    BoneOffset, DisplayFrame, FrameItem, GroupOffset, Header, ImpulseOffset, MaterialOffset,
    Morph, MorphOffsets, UvOffset, VertexOffset,
};

pub(super) fn parse_morphs(reader: &mut PmxReader, header: &Header) -> Result<Vec<Morph>, PmxError> {
    let count = reader.count("morph")?;
    let mut morphs = Vec::with_capacity(reader.capacity(count, 14));
    for index in 0..count {
        morphs.push(parse_morph(reader, header, index)?);
    }
    debug!(morphs = morphs.len(), "PMX morphs");
    Ok(morphs)
}

fn parse_morph(reader: &mut PmxReader, header: &Header, index: usize) -> Result<Morph, PmxError> {
    let name = reader.text(header.encoding)?;
    let name_en = reader.text(header.encoding)?;
    let panel = reader.u8()?;
    let kind = reader.u8()?;
    let count = reader.count("morph offset")?;

    let offsets = match kind {
        0 => MorphOffsets::Group(read_n(reader, count, |r| group_offset(r, header))?),
        1 => MorphOffsets::Vertex(read_n(reader, count, |r| {
            Ok(VertexOffset {
                vertex: r.vertex_index(header.vertex_index)?,
                offset: r.vec3()?,
            })
        })?),
        2 => MorphOffsets::Bone(read_n(reader, count, |r| {
            Ok(BoneOffset {
                bone: r.index(header.bone_index)?,
                translation: r.vec3()?,
                rotation: r.vec4()?,
            })
        })?),
        3..=7 => MorphOffsets::Uv {
            channel: kind - 3,
            offsets: read_n(reader, count, |r| {
                Ok(UvOffset {
                    vertex: r.vertex_index(header.vertex_index)?,
                    offset: r.vec4()?,
                })
            })?,
        },
        8 => MorphOffsets::Material(read_n(reader, count, |r| material_offset(r, header))?),
        9 if header.is_2_1() => {
            MorphOffsets::Flip(read_n(reader, count, |r| group_offset(r, header))?)
        }
        10 if header.is_2_1() => MorphOffsets::Impulse(read_n(reader, count, |r| {
            Ok(ImpulseOffset {
                rigid_body: r.index(header.rigid_body_index)?,
                local: r.u8()? != 0,
                velocity: r.vec3()?,
                torque: r.vec3()?,
            })
        })?),
        _ => return Err(PmxError::UnknownMorphType { morph: index, kind }),
    };

    Ok(Morph {
        name,
        name_en,
        panel,
        offsets,
    })
}

fn read_n<'a, T>(
    reader: &mut PmxReader<'a>,
    count: usize,
    mut read: impl FnMut(&mut PmxReader<'a>) -> Result<T, PmxError>,
) -> Result<Vec<T>, PmxError> {
    let mut items = Vec::with_capacity(reader.capacity(count, 5));
    for _ in 0..count {
        items.push(read(reader)?);
    }
    Ok(items)
}

fn group_offset(reader: &mut PmxReader, header: &Header) -> Result<GroupOffset, PmxError> {
    Ok(GroupOffset {
        morph: reader.index(header.morph_index)?,
        factor: reader.f32()?,
    })
}

fn material_offset(reader: &mut PmxReader, header: &Header) -> Result<MaterialOffset, PmxError> {
    Ok(MaterialOffset {
        material: reader.index(header.material_index)?,
        operation: reader.u8()?,
        diffuse: reader.vec4()?,
        specular: reader.vec3()?,
        specular_strength: reader.f32()?,
        ambient: reader.vec3()?,
        edge_color: reader.vec4()?,
        edge_size: reader.f32()?,
        texture_tint: reader.vec4()?,
        sphere_tint: reader.vec4()?,
        toon_tint: reader.vec4()?,
    })
}

pub(super) fn parse_display_frames(
    reader: &mut PmxReader,
    header: &Header,
) -> Result<Vec<DisplayFrame>, PmxError> {
    let count = reader.count("display frame")?;
    let mut frames = Vec::with_capacity(reader.capacity(count, 13));
    for _ in 0..count {
        let name = reader.text(header.encoding)?;
        let name_en = reader.text(header.encoding)?;
        let special = reader.u8()? != 0;
        let item_count = reader.count("display frame item")?;
        let items = read_n(reader, item_count, |r| {
            Ok(match r.u8()? {
                0 => FrameItem::Bone(r.index(header.bone_index)?),
                _ => FrameItem::Morph(r.index(header.morph_index)?),
            })
        })?;
        frames.push(DisplayFrame {
            name,
            name_en,
            special,
            items,
        });
    }
    Ok(frames)
}

//! Texture table and material section

use super::helpers::PmxReader;
use crate::error::PmxError;
use crate::model::{Header, Material, MaterialFlags, Toon};

pub(super) fn parse_textures(
    reader: &mut PmxReader,
    header: &Header,
) -> Result<Vec<String>, PmxError> {
    let count = reader.count("texture")?;
    let mut textures = Vec::with_capacity(reader.capacity(count, 4));
    for _ in 0..count {
        // Paths use backslashes regardless of platform
        textures.push(reader.text(header.encoding)?.replace('\\', "/"));
    }
    Ok(textures)
}

pub(super) fn parse_materials(
    reader: &mut PmxReader,
    header: &Header,
) -> Result<Vec<Material>, PmxError> {
    let count = reader.count("material")?;
    let mut materials = Vec::with_capacity(reader.capacity(count, 64));
    for _ in 0..count {
        materials.push(parse_material(reader, header)?);
    }
    Ok(materials)
}

fn parse_material(reader: &mut PmxReader, header: &Header) -> Result<Material, PmxError> {
    let name = reader.text(header.encoding)?;
    let name_en = reader.text(header.encoding)?;
    let diffuse = reader.vec4()?;
    let specular = reader.vec3()?;
    let specular_strength = reader.f32()?;
    let ambient = reader.vec3()?;
    let flags = MaterialFlags::from_bits_retain(reader.u8()?);
    let edge_color = reader.vec4()?;
    let edge_size = reader.f32()?;
    let texture = reader.index(header.texture_index)?;
    let sphere_texture = reader.index(header.texture_index)?;
    let sphere_mode = reader.u8()?;
    let toon = match reader.u8()? {
        0 => Toon::Texture(reader.index(header.texture_index)?),
        _ => Toon::Shared(reader.u8()?),
    };
    let memo = reader.text(header.encoding)?;
    let index_count = reader.count("material index")?;

    Ok(Material {
        name,
        name_en,
        diffuse,
        specular,
        specular_strength,
        ambient,
        flags,
        edge_color,
        edge_size,
        texture,
        sphere_texture,
        sphere_mode,
        toon,
        memo,
        index_count,
    })
}

//! PMX file parser

use tracing::{debug, info};

use crate::error::PmxError;
use crate::model::{Header, IndexWidth, ModelInfo, PmxModel, TextEncoding};
use crate::{MAX_ADDITIONAL_UVS, PMD_MAGIC, PMX_MAGIC};

mod bone;
mod helpers;
mod material;
mod morph;
mod physics;
mod vertex;

use bone::parse_bones;
use helpers::PmxReader;
use material::{parse_materials, parse_textures};
use morph::{parse_display_frames, parse_morphs};
use physics::{parse_joints, parse_rigid_bodies};
use vertex::{parse_faces, parse_vertices};

/// Smallest possible file: magic, version, globals count, 8 globals
const MIN_FILE_LEN: usize = 4 + 4 + 1 + 8;

/// Parse a complete PMX 2.0 or 2.1 file
///
/// Sections are read in file order; any malformed record aborts the parse.
pub fn parse_pmx(data: &[u8]) -> Result<PmxModel, PmxError> {
    if data.starts_with(PMD_MAGIC) {
        return Err(PmxError::LegacyPmd);
    }
    if data.len() < MIN_FILE_LEN {
        return Err(PmxError::TooSmall(data.len()));
    }
    if !data.starts_with(PMX_MAGIC) {
        return Err(PmxError::InvalidMagic);
    }

    let mut reader = PmxReader::new(data);
    reader.skip(PMX_MAGIC.len())?;
    let header = parse_header(&mut reader)?;
    let info = parse_info(&mut reader, &header)?;

    let vertices = parse_vertices(&mut reader, &header)?;
    let indices = parse_faces(&mut reader, &header, vertices.len())?;
    let textures = parse_textures(&mut reader, &header)?;
    let materials = parse_materials(&mut reader, &header)?;
    let bones = parse_bones(&mut reader, &header)?;
    let morphs = parse_morphs(&mut reader, &header)?;
    let display_frames = parse_display_frames(&mut reader, &header)?;
    let rigid_bodies = parse_rigid_bodies(&mut reader, &header)?;
    let joints = parse_joints(&mut reader, &header)?;

    if reader.remaining() > 0 {
        // 2.1 soft bodies follow the joints
        debug!(bytes = reader.remaining(), "ignoring trailing PMX data");
    }

    let model = PmxModel {
        header,
        info,
        vertices,
        indices,
        textures,
        materials,
        bones,
        morphs,
        display_frames,
        rigid_bodies,
        joints,
    };
    info!(
        name = %model.info.name,
        version = model.header.version,
        vertices = model.vertices.len(),
        faces = model.indices.len() / 3,
        materials = model.materials.len(),
        bones = model.bones.len(),
        morphs = model.morphs.len(),
        rigid_bodies = model.rigid_bodies.len(),
        "parsed PMX"
    );
    Ok(model)
}

fn parse_header(reader: &mut PmxReader) -> Result<Header, PmxError> {
    let version = reader.f32()?;
    if !(2.0 - 1e-4..=2.1 + 1e-4).contains(&version) {
        return Err(PmxError::UnsupportedVersion(version));
    }

    let globals = reader.u8()?;
    if globals < 8 {
        return Err(PmxError::ShortHeader(globals));
    }
    let encoding = match reader.u8()? {
        0 => TextEncoding::Utf16Le,
        1 => TextEncoding::Utf8,
        other => return Err(PmxError::InvalidEncoding(other)),
    };
    let additional_uvs = reader.u8()?;
    if additional_uvs > MAX_ADDITIONAL_UVS {
        return Err(PmxError::TooManyAdditionalUvs(additional_uvs));
    }

    let mut width = |field: &'static str| -> Result<IndexWidth, PmxError> {
        let width = reader.u8()?;
        IndexWidth::from_byte(width).ok_or(PmxError::InvalidIndexWidth { field, width })
    };
    let header = Header {
        version,
        encoding,
        additional_uvs,
        vertex_index: width("vertex")?,
        texture_index: width("texture")?,
        material_index: width("material")?,
        bone_index: width("bone")?,
        morph_index: width("morph")?,
        rigid_body_index: width("rigid body")?,
    };

    // Globals beyond the eight known ones
    reader.skip(globals as usize - 8)?;
    debug!(?header, "PMX header");
    Ok(header)
}

fn parse_info(reader: &mut PmxReader, header: &Header) -> Result<ModelInfo, PmxError> {
    Ok(ModelInfo {
        name: reader.text(header.encoding)?,
        name_en: reader.text(header.encoding)?,
        comment: reader.text(header.encoding)?,
        comment_en: reader.text(header.encoding)?,
    })
}

//! Bone section

use tracing::debug;

use super::helpers::PmxReader;
use crate::error::PmxError;
use crate::model::{Bone, BoneFlags, BoneTail, Header, Ik, IkLink, Inherit};

pub(super) fn parse_bones(reader: &mut PmxReader, header: &Header) -> Result<Vec<Bone>, PmxError> {
    let count = reader.count("bone")?;
    let mut bones = Vec::with_capacity(reader.capacity(count, 32));
    for index in 0..count {
        bones.push(parse_bone(reader, header, index)?);
    }
    debug!(
        bones = bones.len(),
        ik = bones.iter().filter(|b| b.ik.is_some()).count(),
        "PMX bones"
    );
    Ok(bones)
}

fn parse_bone(reader: &mut PmxReader, header: &Header, index: usize) -> Result<Bone, PmxError> {
    let width = header.bone_index;
    let name = reader.text(header.encoding)?;
    let name_en = reader.text(header.encoding)?;
    let position = reader.vec3()?;
    let parent = reader.index(width)?;
    let layer = reader.i32()?;

    let raw_flags = reader.u16()?;
    let flags = BoneFlags::from_bits(raw_flags).ok_or(PmxError::UnsupportedBoneFlags {
        bone: index,
        flags: raw_flags & !BoneFlags::all().bits(),
    })?;

    let tail = if flags.contains(BoneFlags::INDEXED_TAIL) {
        BoneTail::Bone(reader.index(width)?)
    } else {
        BoneTail::Offset(reader.vec3()?)
    };

    let inherit = if flags.intersects(BoneFlags::INHERIT_ROTATION | BoneFlags::INHERIT_TRANSLATION) {
        Some(Inherit {
            parent: reader.index(width)?,
            influence: reader.f32()?,
        })
    } else {
        None
    };

    let fixed_axis = if flags.contains(BoneFlags::FIXED_AXIS) {
        Some(reader.vec3()?)
    } else {
        None
    };
    let local_axes = if flags.contains(BoneFlags::LOCAL_AXES) {
        Some((reader.vec3()?, reader.vec3()?))
    } else {
        None
    };
    let external_parent = if flags.contains(BoneFlags::EXTERNAL_PARENT) {
        Some(reader.i32()?)
    } else {
        None
    };

    let ik = if flags.contains(BoneFlags::IK) {
        Some(parse_ik(reader, header)?)
    } else {
        None
    };

    Ok(Bone {
        name,
        name_en,
        position,
        parent,
        layer,
        flags,
        tail,
        inherit,
        fixed_axis,
        local_axes,
        external_parent,
        ik,
    })
}

fn parse_ik(reader: &mut PmxReader, header: &Header) -> Result<Ik, PmxError> {
    let width = header.bone_index;
    let target = reader.index(width)?;
    let loop_count = reader.i32()?;
    let limit_angle = reader.f32()?;
    let link_count = reader.count("IK link")?;
    let mut links = Vec::with_capacity(reader.capacity(link_count, width.bytes() + 1));
    for _ in 0..link_count {
        let bone = reader.index(width)?;
        let limits = if reader.u8()? != 0 {
            Some((reader.vec3()?, reader.vec3()?))
        } else {
            None
        };
        links.push(IkLink { bone, limits });
    }
    Ok(Ik {
        target,
        loop_count,
        limit_angle,
        links,
    })
}

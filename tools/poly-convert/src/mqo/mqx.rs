//! `.mqx` XML sidecar: bones, weights and morph target lists
//!
//! ```xml
//! <MetasequoiaDocument>
//!   <IncludedBy>model.mqo</IncludedBy>
//!   <BoneSet>
//!     <Bone id="1" name="center" rtX="0" rtY="8" rtZ="0">
//!       <P id="0"/>
//!       <W oi="1" vi="3" w="1.0"/>
//!     </Bone>
//!   </BoneSet>
//!   <MorphSet>
//!     <TargetList base="MorphBase1">
//!       <Target name="smile" param="0"/>
//!     </TargetList>
//!   </MorphSet>
//! </MetasequoiaDocument>
//! ```

use std::io::Cursor;
use std::str::FromStr;

use glam::Vec3;
use poly_common::{
    Bone, BoneFlags, BoneSet, MorphSet, MorphTarget, MorphTargetList, WeightRecord, ROOT_BONE_ID,
};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use super::MqoError;

/// Sidecar contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MqxSidecar {
    pub bones: Option<BoneSet>,
    pub morphs: Option<MorphSet>,
}

fn xml_error(e: impl std::fmt::Display) -> MqoError {
    MqoError::Xml(e.to_string())
}

/// Attribute value parsed as `T`, `None` if absent
fn attribute<T: FromStr>(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<T>, MqoError> {
    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() != key {
            continue;
        }
        let value = attr.unescape_value().map_err(xml_error)?;
        return value.trim().parse().map(Some).map_err(|_| {
            MqoError::Xml(format!(
                "invalid {} value '{value}'",
                String::from_utf8_lossy(key)
            ))
        });
    }
    Ok(None)
}

fn required<T: FromStr>(element: &BytesStart<'_>, key: &[u8]) -> Result<T, MqoError> {
    attribute(element, key)?.ok_or_else(|| {
        MqoError::Xml(format!(
            "<{}> without {}",
            String::from_utf8_lossy(element.local_name().as_ref()),
            String::from_utf8_lossy(key)
        ))
    })
}

fn parse_bone(element: &BytesStart<'_>) -> Result<Bone, MqoError> {
    let id: u32 = required(element, b"id")?;
    let name: String = attribute(element, b"name")?.unwrap_or_default();
    let position = Vec3::new(
        attribute(element, b"rtX")?.unwrap_or(0.0),
        attribute(element, b"rtY")?.unwrap_or(0.0),
        attribute(element, b"rtZ")?.unwrap_or(0.0),
    );
    let mut bone = Bone::new(id, name, ROOT_BONE_ID, position);
    if attribute::<u8>(element, b"isDummy")?.unwrap_or(0) != 0 {
        bone.flags |= BoneFlags::DUMMY;
    }
    if attribute::<u8>(element, b"isHide")?.unwrap_or(0) != 0 {
        bone.flags.remove(BoneFlags::VISIBLE);
    }
    Ok(bone)
}

/// Parse a sidecar; bone parents may reference bones declared later
pub fn parse_mqx(text: &str) -> Result<MqxSidecar, MqoError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut sidecar = MqxSidecar::default();
    let mut bone: Option<Bone> = None;
    let mut list: Option<MorphTargetList> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"BoneSet" => {
                    sidecar.bones.get_or_insert_with(BoneSet::new);
                }
                b"MorphSet" => {
                    sidecar.morphs.get_or_insert_with(MorphSet::default);
                }
                b"Bone" => bone = Some(parse_bone(e)?),
                b"TargetList" => {
                    list = Some(MorphTargetList::new(
                        attribute::<String>(e, b"base")?.unwrap_or_default(),
                    ))
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"Bone" => {
                    let bones = sidecar.bones.get_or_insert_with(BoneSet::new);
                    bones.push_unchecked(parse_bone(e)?);
                }
                b"P" => {
                    if let Some(bone) = bone.as_mut() {
                        bone.parent = required(e, b"id")?;
                    }
                }
                b"W" => {
                    if let Some(current) = &bone {
                        let record = WeightRecord {
                            bone: current.id,
                            object: required(e, b"oi")?,
                            vertex: required(e, b"vi")?,
                            weight: required(e, b"w")?,
                        };
                        sidecar.bones.get_or_insert_with(BoneSet::new).weights.push(record);
                    }
                }
                b"Target" => {
                    if let Some(list) = list.as_mut() {
                        list.targets.push(MorphTarget {
                            object: required(e, b"name")?,
                            param: attribute(e, b"param")?.unwrap_or(0.0),
                        });
                    }
                }
                b"TargetList" => {
                    let base: String = attribute(e, b"base")?.unwrap_or_default();
                    sidecar
                        .morphs
                        .get_or_insert_with(MorphSet::default)
                        .target_lists
                        .push(MorphTargetList::new(base));
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"Bone" => {
                    if let Some(done) = bone.take() {
                        sidecar.bones.get_or_insert_with(BoneSet::new).push_unchecked(done);
                    }
                }
                b"TargetList" => {
                    if let Some(done) = list.take() {
                        sidecar
                            .morphs
                            .get_or_insert_with(MorphSet::default)
                            .target_lists
                            .push(done);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(MqoError::Xml(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    if let Some(bones) = &sidecar.bones {
        bones.validate().map_err(xml_error)?;
        debug!(bones = bones.len(), weights = bones.weights.len(), "parsed MQX bones");
    }
    Ok(sidecar)
}

/// Serialize a sidecar; `included_by` names the owning `.mqo` file
pub fn write_mqx(sidecar: &MqxSidecar, included_by: &str) -> Result<String, MqoError> {
    let mut buffer = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("MetasequoiaDocument")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("IncludedBy")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(included_by)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("IncludedBy")))
        .map_err(xml_error)?;

    if let Some(bones) = &sidecar.bones {
        writer
            .write_event(Event::Start(BytesStart::new("BoneSet")))
            .map_err(xml_error)?;
        for bone in &bones.bones {
            let mut element = BytesStart::new("Bone");
            element.push_attribute(("id", bone.id.to_string().as_str()));
            element.push_attribute(("name", bone.name.as_str()));
            element.push_attribute(("rtX", bone.position.x.to_string().as_str()));
            element.push_attribute(("rtY", bone.position.y.to_string().as_str()));
            element.push_attribute(("rtZ", bone.position.z.to_string().as_str()));
            if bone.flags.contains(BoneFlags::DUMMY) {
                element.push_attribute(("isDummy", "1"));
            }
            if !bone.flags.contains(BoneFlags::VISIBLE) {
                element.push_attribute(("isHide", "1"));
            }
            writer.write_event(Event::Start(element)).map_err(xml_error)?;

            let mut parent = BytesStart::new("P");
            parent.push_attribute(("id", bone.parent.to_string().as_str()));
            writer.write_event(Event::Empty(parent)).map_err(xml_error)?;

            for record in bones.weights.iter().filter(|w| w.bone == bone.id) {
                let mut weight = BytesStart::new("W");
                weight.push_attribute(("oi", record.object.to_string().as_str()));
                weight.push_attribute(("vi", record.vertex.to_string().as_str()));
                weight.push_attribute(("w", record.weight.to_string().as_str()));
                writer.write_event(Event::Empty(weight)).map_err(xml_error)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("Bone")))
                .map_err(xml_error)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("BoneSet")))
            .map_err(xml_error)?;
    }

    if let Some(morphs) = &sidecar.morphs {
        writer
            .write_event(Event::Start(BytesStart::new("MorphSet")))
            .map_err(xml_error)?;
        for list in &morphs.target_lists {
            let mut element = BytesStart::new("TargetList");
            element.push_attribute(("base", list.base.as_str()));
            writer.write_event(Event::Start(element)).map_err(xml_error)?;
            for target in &list.targets {
                let mut element = BytesStart::new("Target");
                element.push_attribute(("name", target.object.as_str()));
                element.push_attribute(("param", target.param.to_string().as_str()));
                writer.write_event(Event::Empty(element)).map_err(xml_error)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("TargetList")))
                .map_err(xml_error)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("MorphSet")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("MetasequoiaDocument")))
        .map_err(xml_error)?;

    String::from_utf8(buffer).map_err(xml_error)
}

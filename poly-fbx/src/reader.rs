//! Binary record reader
//!
//! Records are `[end_offset][property_count][property_list_len][name_len:u8]`
//! followed by the name, the properties and the child records. The three
//! leading fields are `u32` before version 7500 and `u64` from then on. A
//! record list ends with an all-zero header.

use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use tracing::{debug, info, warn};

use crate::error::FbxError;
use crate::node::{FbxDocument, Node, Property};
use crate::{record_header_len, FBX_MAGIC, LARGE_HEADER_VERSION, PROLOGUE_LEN};

/// Parse a complete binary FBX file
pub fn parse_fbx(data: &[u8]) -> Result<FbxDocument, FbxError> {
    if data.len() < PROLOGUE_LEN {
        return Err(FbxError::TooSmall(data.len()));
    }
    if &data[..FBX_MAGIC.len()] != FBX_MAGIC {
        return Err(FbxError::InvalidMagic);
    }
    let version = LittleEndian::read_u32(&data[FBX_MAGIC.len()..PROLOGUE_LEN]);

    let mut reader = RecordReader::new(data, version);
    reader.cursor.set_position(PROLOGUE_LEN as u64);
    let nodes = reader.read_records(data.len() as u64)?;

    let document = FbxDocument { version, nodes };
    info!(
        version,
        top_level = document.nodes.len(),
        records = document.record_count(),
        skipped = reader.skipped,
        "parsed FBX"
    );
    Ok(document)
}

enum Record {
    Node(Node),
    /// Implausible record skipped via its end offset
    Skipped,
    /// Null record terminating a list
    End,
}

struct RecordReader<'a> {
    cursor: Cursor<&'a [u8]>,
    wide_header: bool,
    header_len: u64,
    skipped: usize,
}

impl<'a> RecordReader<'a> {
    fn new(data: &'a [u8], version: u32) -> Self {
        Self {
            cursor: Cursor::new(data),
            wide_header: version >= LARGE_HEADER_VERSION,
            header_len: record_header_len(version) as u64,
            skipped: 0,
        }
    }

    fn data(&self) -> &'a [u8] {
        *self.cursor.get_ref()
    }

    fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn data_len(&self) -> u64 {
        self.data().len() as u64
    }

    fn eof(&self) -> FbxError {
        FbxError::UnexpectedEof(self.position())
    }

    fn read_records(&mut self, limit: u64) -> Result<Vec<Node>, FbxError> {
        let mut nodes = Vec::new();
        while self.position() + self.header_len <= limit {
            match self.read_record()? {
                Record::Node(node) => nodes.push(node),
                Record::Skipped => {}
                Record::End => break,
            }
        }
        Ok(nodes)
    }

    fn read_header_field(&mut self) -> Result<u64, FbxError> {
        let value = if self.wide_header {
            self.cursor.read_u64::<LittleEndian>()
        } else {
            self.cursor.read_u32::<LittleEndian>().map(u64::from)
        };
        value.map_err(|_| self.eof())
    }

    fn read_record(&mut self) -> Result<Record, FbxError> {
        let start = self.position();
        let end_offset = self.read_header_field()?;
        let property_count = self.read_header_field()?;
        let property_list_len = self.read_header_field()?;
        let name_len = self.cursor.read_u8().map_err(|_| self.eof())?;

        if end_offset == 0 && property_count == 0 && property_list_len == 0 && name_len == 0 {
            return Ok(Record::End);
        }
        if end_offset <= start || end_offset > self.data_len() {
            return Err(FbxError::Desync {
                offset: start,
                end_offset,
            });
        }

        let name = self.read_name(name_len as usize)?;
        let properties_start = self.position();
        let properties_end = properties_start.saturating_add(property_list_len);

        // Every property takes at least two bytes (type code + payload)
        if property_count.saturating_mul(2) > property_list_len || properties_end > end_offset {
            warn!(
                record = %name,
                offset = start,
                property_count,
                property_list_len,
                "implausible property header, skipping record"
            );
            return self.skip_to(end_offset);
        }

        let mut properties = Vec::with_capacity(property_count as usize);
        for _ in 0..property_count {
            match self.read_property() {
                Ok(property) => properties.push(property),
                Err(e) => {
                    warn!(record = %name, offset = start, "{e}, skipping record");
                    return self.skip_to(end_offset);
                }
            }
        }
        if self.position() != properties_end {
            warn!(
                record = %name,
                expected = properties_end,
                actual = self.position(),
                "property list length mismatch"
            );
            self.cursor.set_position(properties_end);
        }

        let children = if self.position() < end_offset {
            self.read_records(end_offset)?
        } else {
            Vec::new()
        };
        self.cursor.set_position(end_offset);

        debug!(
            record = %name,
            properties = properties.len(),
            children = children.len(),
            "read record"
        );
        Ok(Record::Node(Node {
            name,
            properties,
            children,
        }))
    }

    fn skip_to(&mut self, end_offset: u64) -> Result<Record, FbxError> {
        self.skipped += 1;
        self.cursor.set_position(end_offset);
        Ok(Record::Skipped)
    }

    fn read_name(&mut self, len: usize) -> Result<String, FbxError> {
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Borrow the next `len` bytes and advance past them
    fn take(&mut self, len: usize) -> Result<&'a [u8], FbxError> {
        let start = self.position() as usize;
        let end = start.checked_add(len).ok_or_else(|| self.eof())?;
        let bytes = self.data().get(start..end).ok_or_else(|| self.eof())?;
        self.cursor.set_position(end as u64);
        Ok(bytes)
    }

    fn read_property(&mut self) -> Result<Property, FbxError> {
        let offset = self.position();
        let code = self.cursor.read_u8().map_err(|_| self.eof())?;
        let c = &mut self.cursor;
        let property = match code {
            b'C' => Property::Bool(c.read_u8()? != 0),
            b'Y' => Property::I16(c.read_i16::<LittleEndian>()?),
            b'I' => Property::I32(c.read_i32::<LittleEndian>()?),
            b'L' => Property::I64(c.read_i64::<LittleEndian>()?),
            b'F' => Property::F32(c.read_f32::<LittleEndian>()?),
            b'D' => Property::F64(c.read_f64::<LittleEndian>()?),
            b'S' => {
                let len = c.read_u32::<LittleEndian>()? as usize;
                Property::String(String::from_utf8_lossy(self.take(len)?).into_owned())
            }
            b'R' => {
                let len = c.read_u32::<LittleEndian>()? as usize;
                Property::Raw(self.take(len)?.to_vec())
            }
            b'b' => Property::BoolArray(self.read_array(1)?.iter().map(|&b| b != 0).collect()),
            b'i' => Property::I32Array(decode(&self.read_array(4)?, LittleEndian::read_i32)),
            b'l' => Property::I64Array(decode(&self.read_array(8)?, LittleEndian::read_i64)),
            b'f' => Property::F32Array(decode(&self.read_array(4)?, LittleEndian::read_f32)),
            b'd' => Property::F64Array(decode(&self.read_array(8)?, LittleEndian::read_f64)),
            other => return Err(FbxError::UnknownPropertyType { code: other, offset }),
        };
        Ok(property)
    }

    /// Raw little-endian element bytes of an array property
    ///
    /// A payload that fails to decode yields an empty array; the cursor always
    /// ends up past the declared payload length so later siblings stay aligned.
    fn read_array(&mut self, element_size: usize) -> Result<Vec<u8>, FbxError> {
        let count = self.cursor.read_u32::<LittleEndian>()? as usize;
        let encoding = self.cursor.read_u32::<LittleEndian>()?;
        let stored_len = self.cursor.read_u32::<LittleEndian>()? as usize;
        let offset = self.position();
        let payload = self.take(stored_len)?;
        let expected = count.saturating_mul(element_size);

        let decoded = match encoding {
            0 => (payload.len() == expected).then(|| payload.to_vec()),
            _ => inflate(payload, expected),
        };
        Ok(decoded.unwrap_or_else(|| {
            warn!(
                offset,
                count, encoding, stored_len, "failed to decode array property, using empty array"
            );
            Vec::new()
        }))
    }
}

/// Upper bound on zlib output per input byte
const MAX_DEFLATE_RATIO: usize = 1032;

fn inflate(payload: &[u8], expected: usize) -> Option<Vec<u8>> {
    // The declared count is untrusted; no stream this short can expand that far
    if expected > payload.len().saturating_mul(MAX_DEFLATE_RATIO) {
        return None;
    }
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(payload)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .ok()?;
    (out.len() == expected).then_some(out)
}

fn decode<T>(bytes: &[u8], read: fn(&[u8]) -> T) -> Vec<T> {
    let size = std::mem::size_of::<T>();
    bytes.chunks_exact(size).map(read).collect()
}

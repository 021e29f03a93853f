//! Primitive readers shared by the section parsers

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Vec2, Vec3, Vec4};

use crate::error::PmxError;
use crate::model::{IndexWidth, TextEncoding};

/// Little-endian cursor that maps short reads to [`PmxError::UnexpectedEof`]
pub(crate) struct PmxReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PmxReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub(crate) fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub(crate) fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.position()) as usize
    }

    fn eof(&self) -> PmxError {
        PmxError::UnexpectedEof(self.position())
    }

    pub(crate) fn skip(&mut self, bytes: usize) -> Result<(), PmxError> {
        if bytes > self.remaining() {
            return Err(self.eof());
        }
        self.cursor.set_position(self.position() + bytes as u64);
        Ok(())
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], PmxError> {
        if len > self.remaining() {
            return Err(self.eof());
        }
        let start = self.position() as usize;
        self.cursor.set_position((start + len) as u64);
        let data: &'a [u8] = *self.cursor.get_ref();
        Ok(&data[start..start + len])
    }

    pub(crate) fn u8(&mut self) -> Result<u8, PmxError> {
        self.cursor.read_u8().map_err(|_| self.eof())
    }

    pub(crate) fn u16(&mut self) -> Result<u16, PmxError> {
        self.cursor.read_u16::<LittleEndian>().map_err(|_| self.eof())
    }

    pub(crate) fn i32(&mut self) -> Result<i32, PmxError> {
        self.cursor.read_i32::<LittleEndian>().map_err(|_| self.eof())
    }

    pub(crate) fn f32(&mut self) -> Result<f32, PmxError> {
        self.cursor.read_f32::<LittleEndian>().map_err(|_| self.eof())
    }

    pub(crate) fn vec2(&mut self) -> Result<Vec2, PmxError> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    pub(crate) fn vec3(&mut self) -> Result<Vec3, PmxError> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub(crate) fn vec4(&mut self) -> Result<Vec4, PmxError> {
        Ok(Vec4::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    /// `i32` byte length followed by text in the model's encoding
    pub(crate) fn text(&mut self, encoding: TextEncoding) -> Result<String, PmxError> {
        let len = self.i32()?;
        if len < 0 {
            return Err(PmxError::NegativeCount {
                section: "text",
                count: len,
            });
        }
        let bytes = self.bytes(len as usize)?;
        Ok(decode_text(bytes, encoding))
    }

    /// Signed index; all-ones means "none" at every width
    pub(crate) fn index(&mut self, width: IndexWidth) -> Result<i32, PmxError> {
        Ok(match width {
            IndexWidth::One => self.cursor.read_i8().map_err(|_| self.eof())? as i32,
            IndexWidth::Two => self.cursor.read_i16::<LittleEndian>().map_err(|_| self.eof())? as i32,
            IndexWidth::Four => self.i32()?,
        })
    }

    /// Vertex indices are unsigned at widths 1 and 2
    pub(crate) fn vertex_index(&mut self, width: IndexWidth) -> Result<i32, PmxError> {
        Ok(match width {
            IndexWidth::One => self.u8()? as i32,
            IndexWidth::Two => self.u16()? as i32,
            IndexWidth::Four => self.i32()?,
        })
    }

    /// Section element count
    pub(crate) fn count(&mut self, section: &'static str) -> Result<usize, PmxError> {
        let count = self.i32()?;
        usize::try_from(count).map_err(|_| PmxError::NegativeCount { section, count })
    }

    /// Capacity hint that never exceeds what the remaining bytes could hold
    pub(crate) fn capacity(&self, count: usize, min_record_len: usize) -> usize {
        count.min(self.remaining() / min_record_len.max(1))
    }
}

/// Decode a text field; invalid sequences are replaced rather than rejected
pub(crate) fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Utf16Le => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

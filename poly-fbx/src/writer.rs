//! Binary record writer
//!
//! Mirrors the reader layout. Record headers are written with placeholder
//! offsets and patched once the record's children are in place.

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::FbxError;
use crate::node::{FbxDocument, Node, Property};
use crate::{record_header_len, FBX_MAGIC, LARGE_HEADER_VERSION};

/// Footer block identifier following the top-level null record
const FOOTER_ID: [u8; 16] = [
    0xfa, 0xbc, 0xab, 0x09, 0xd0, 0xc8, 0xd4, 0x66, 0xb1, 0x76, 0xfb, 0x83, 0x1c, 0xf7, 0x26, 0x7e,
];

/// Trailing magic at the very end of the file
const FOOTER_MAGIC: [u8; 16] = [
    0xf8, 0x5a, 0x8c, 0x6a, 0xde, 0xf5, 0xd9, 0x7e, 0xec, 0xe9, 0x0c, 0xe3, 0x75, 0x8f, 0x29, 0x0b,
];

/// When array properties are deflated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayCompression {
    Never,
    Always,
    /// Compress arrays whose raw payload is at least this many bytes
    AtLeast(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub compression: ArrayCompression,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: ArrayCompression::AtLeast(128),
        }
    }
}

/// Serialize a document with the given options
pub fn write_fbx(document: &FbxDocument, options: WriteOptions) -> Result<Vec<u8>, FbxError> {
    FbxWriter::new(document.version, options).write_document(document)
}

/// Incremental writer for one file
pub struct FbxWriter {
    buffer: Vec<u8>,
    version: u32,
    options: WriteOptions,
}

impl FbxWriter {
    pub fn new(version: u32, options: WriteOptions) -> Self {
        Self {
            buffer: Vec::new(),
            version,
            options,
        }
    }

    fn wide_header(&self) -> bool {
        self.version >= LARGE_HEADER_VERSION
    }

    pub fn write_document(mut self, document: &FbxDocument) -> Result<Vec<u8>, FbxError> {
        self.buffer.extend_from_slice(FBX_MAGIC);
        self.buffer.write_u32::<LittleEndian>(self.version)?;

        for node in &document.nodes {
            self.write_node(node)?;
        }
        self.write_null_record();
        self.write_footer()?;

        debug!(
            version = self.version,
            bytes = self.buffer.len(),
            "wrote FBX"
        );
        Ok(self.buffer)
    }

    fn write_null_record(&mut self) {
        let len = record_header_len(self.version);
        self.buffer.resize(self.buffer.len() + len, 0);
    }

    fn write_footer(&mut self) -> Result<(), FbxError> {
        self.buffer.extend_from_slice(&FOOTER_ID);
        let padding = match self.buffer.len() % 16 {
            0 => 16,
            rem => 16 - rem,
        };
        self.buffer.resize(self.buffer.len() + padding, 0);
        self.buffer.write_u32::<LittleEndian>(self.version)?;
        self.buffer.resize(self.buffer.len() + 120, 0);
        self.buffer.extend_from_slice(&FOOTER_MAGIC);
        Ok(())
    }

    fn write_node(&mut self, node: &Node) -> Result<(), FbxError> {
        let name = node.name.as_bytes();
        if name.len() > u8::MAX as usize {
            return Err(FbxError::NameTooLong(name.len()));
        }

        let header_start = self.buffer.len();
        self.write_null_record();
        let name_len_pos = self.buffer.len() - 1;
        self.buffer[name_len_pos] = name.len() as u8;
        self.buffer.extend_from_slice(name);

        let properties_start = self.buffer.len();
        for property in &node.properties {
            self.write_property(property)?;
        }
        let properties_len = self.buffer.len() - properties_start;

        // Records with children, or with nothing at all, end with a null record
        if !node.children.is_empty() || node.properties.is_empty() {
            for child in &node.children {
                self.write_node(child)?;
            }
            self.write_null_record();
        }

        let end_offset = self.buffer.len();
        self.patch_header(
            header_start,
            [end_offset, node.properties.len(), properties_len],
        )
    }

    fn patch_header(&mut self, at: usize, fields: [usize; 3]) -> Result<(), FbxError> {
        if self.wide_header() {
            for (i, value) in fields.into_iter().enumerate() {
                let pos = at + i * 8;
                LittleEndian::write_u64(&mut self.buffer[pos..pos + 8], value as u64);
            }
        } else {
            for (i, value) in fields.into_iter().enumerate() {
                let value = u32::try_from(value).map_err(|_| FbxError::FileTooLarge)?;
                let pos = at + i * 4;
                LittleEndian::write_u32(&mut self.buffer[pos..pos + 4], value);
            }
        }
        Ok(())
    }

    fn write_property(&mut self, property: &Property) -> Result<(), FbxError> {
        self.buffer.push(property.type_code());
        let out = &mut self.buffer;
        match property {
            Property::Bool(v) => out.push(u8::from(*v)),
            Property::I16(v) => out.write_i16::<LittleEndian>(*v)?,
            Property::I32(v) => out.write_i32::<LittleEndian>(*v)?,
            Property::I64(v) => out.write_i64::<LittleEndian>(*v)?,
            Property::F32(v) => out.write_f32::<LittleEndian>(*v)?,
            Property::F64(v) => out.write_f64::<LittleEndian>(*v)?,
            Property::String(s) => write_blob(out, s.as_bytes())?,
            Property::Raw(bytes) => write_blob(out, bytes)?,
            Property::BoolArray(v) => {
                let raw: Vec<u8> = v.iter().map(|&b| u8::from(b)).collect();
                self.write_array(v.len(), &raw)?;
            }
            Property::I32Array(v) => self.write_array(v.len(), &encode(v, LittleEndian::write_i32))?,
            Property::I64Array(v) => self.write_array(v.len(), &encode(v, LittleEndian::write_i64))?,
            Property::F32Array(v) => self.write_array(v.len(), &encode(v, LittleEndian::write_f32))?,
            Property::F64Array(v) => self.write_array(v.len(), &encode(v, LittleEndian::write_f64))?,
        }
        Ok(())
    }

    fn write_array(&mut self, count: usize, raw: &[u8]) -> Result<(), FbxError> {
        let count = u32::try_from(count).map_err(|_| FbxError::ArrayTooLong(count))?;
        let compress = match self.options.compression {
            ArrayCompression::Never => false,
            ArrayCompression::Always => true,
            ArrayCompression::AtLeast(threshold) => raw.len() >= threshold,
        };

        self.buffer.write_u32::<LittleEndian>(count)?;
        if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(raw)?;
            let compressed = encoder.finish()?;
            self.buffer.write_u32::<LittleEndian>(1)?;
            write_blob(&mut self.buffer, &compressed)?;
        } else {
            self.buffer.write_u32::<LittleEndian>(0)?;
            write_blob(&mut self.buffer, raw)?;
        }
        Ok(())
    }
}

/// `u32` length prefix followed by the bytes
fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), FbxError> {
    let len = u32::try_from(bytes.len()).map_err(|_| FbxError::FileTooLarge)?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(bytes);
    Ok(())
}

fn encode<T: Copy>(values: &[T], write: fn(&mut [u8], T)) -> Vec<u8> {
    let size = std::mem::size_of::<T>();
    let mut out = vec![0u8; values.len() * size];
    for (chunk, &value) in out.chunks_exact_mut(size).zip(values) {
        write(chunk, value);
    }
    out
}

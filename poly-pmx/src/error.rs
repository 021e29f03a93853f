//! Error types for PMX parsing

use std::io;

use thiserror::Error;

/// Errors that can occur when parsing a PMX file
///
/// Every variant is fatal: PMX sections carry no end offsets, so a record
/// that cannot be decoded leaves the rest of the stream unreadable.
#[derive(Debug, Error)]
pub enum PmxError {
    #[error("file too small to be a PMX model ({0} bytes)")]
    TooSmall(usize),
    #[error("invalid magic bytes (expected 'PMX ')")]
    InvalidMagic,
    #[error("legacy PMD models are not supported")]
    LegacyPmd,
    #[error("unsupported PMX version {0}")]
    UnsupportedVersion(f32),
    #[error("header declares {0} info bytes, at least 8 required")]
    ShortHeader(u8),
    #[error("unknown text encoding {0}")]
    InvalidEncoding(u8),
    #[error("too many additional UV channels: {0} (max 4)")]
    TooManyAdditionalUvs(u8),
    #[error("invalid {field} index width {width} (expected 1, 2 or 4)")]
    InvalidIndexWidth { field: &'static str, width: u8 },
    #[error("vertex {vertex}: unknown weight type {tag}")]
    UnknownWeightType { vertex: usize, tag: u8 },
    #[error("bone {bone}: unsupported flag bits 0x{flags:04X}")]
    UnsupportedBoneFlags { bone: usize, flags: u16 },
    #[error("morph {morph}: unknown morph type {kind}")]
    UnknownMorphType { morph: usize, kind: u8 },
    #[error("negative {section} count {count}")]
    NegativeCount { section: &'static str, count: i32 },
    #[error("unexpected end of file at offset {0}")]
    UnexpectedEof(u64),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

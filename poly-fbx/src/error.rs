//! Error types for FBX reading and writing

use std::io;

use thiserror::Error;

/// Errors that abort reading or writing an FBX stream
///
/// Recoverable problems (a record with an implausible property header, an
/// array that fails to inflate) are logged and skipped instead.
#[derive(Debug, Error)]
pub enum FbxError {
    /// Input shorter than the 27-byte prologue
    #[error("file too small to be a binary FBX ({0} bytes)")]
    TooSmall(usize),
    /// Missing "Kaydara FBX Binary" magic
    #[error("invalid magic bytes (expected 'Kaydara FBX Binary')")]
    InvalidMagic,
    /// Data ended inside a record header or a value
    #[error("unexpected end of data at offset {0}")]
    UnexpectedEof(u64),
    /// Property type byte is not one of `CYILFDSRbilfd`
    #[error("unknown property type code 0x{code:02X} at offset {offset}")]
    UnknownPropertyType { code: u8, offset: u64 },
    /// A record's end offset cannot be used to resynchronise
    #[error("record stream desynchronized at offset {offset} (end offset {end_offset})")]
    Desync { offset: u64, end_offset: u64 },
    /// Record names are limited to 255 bytes
    #[error("record name too long: {0} bytes (max 255)")]
    NameTooLong(usize),
    /// Array element count does not fit the 32-bit count field
    #[error("array too long: {0} elements")]
    ArrayTooLong(usize),
    /// Offsets exceed the 32-bit header fields of the target version
    #[error("file exceeds 4 GiB, write version 7500 or later")]
    FileTooLarge,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

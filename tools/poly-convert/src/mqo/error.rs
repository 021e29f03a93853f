//! Error types for the mesh editor format

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqoError {
    #[error("not a Metasequoia text document")]
    InvalidHeader,
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: invalid number '{text}'")]
    InvalidNumber { line: usize, text: String },
    #[error("line {line}: unexpected end of file inside {chunk}")]
    UnexpectedEof { line: usize, chunk: &'static str },
    #[error("MQX sidecar: {0}")]
    Xml(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

//! Metasequoia mesh editor format
//!
//! The `.mqo` text file holds materials and objects. Bones, weights and
//! morph target lists live in an XML `.mqx` sidecar named by `IncludeXml`.
//! Coordinates are used as stored, with no axis conversion.

mod error;
mod mqx;
mod reader;
mod writer;

pub use error::MqoError;
pub use mqx::{parse_mqx, write_mqx, MqxSidecar};
pub use reader::{parse_mqo, MqoScene};
pub use writer::write_mqo;

/// First line of every text document
pub const MQO_SIGNATURE: &str = "Metasequoia Document";

/// Format line written by [`write_mqo`]
pub const MQO_FORMAT_LINE: &str = "Format Text Ver 1.1";

//! Document writers

pub mod glb;
pub mod mqo;

pub use glb::export_glb;
pub use mqo::{export_mqo, MqoOutput};

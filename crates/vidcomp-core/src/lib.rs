#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod config;
pub mod error;

// ---- Stable re-exports ----
pub use error::{gl_error_name, EngineError, ShaderStage, SlotKind};

pub use config::{load_typed_json, parse_typed_json, shader_source_or, CompositorConfig};

//! vidcomp runtime (glow/OpenGL backend)
//
// This crate contains the GPU side of the compositor:
// - shader programs with introspected attribute/uniform slots
// - per-source video textures
// - the compositor that draws them through a passthrough or effect program
//
// It does NOT contain windowing, decoding, or config file discovery.
#![allow(clippy::missing_safety_doc)]
#![deny(missing_debug_implementations)]

pub mod check;
pub mod compositor;
pub mod gl;
pub mod program;
pub mod quad;
pub mod session;
pub mod shaders;
pub mod slot;
pub mod source;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use check::check_gl_error;
pub use compositor::{Compositor, FrameReport};
pub use gl::{ActiveVariable, Gl, SAMPLER_EXTERNAL_OES, TEXTURE_EXTERNAL_OES};
pub use program::{compile_program, ShaderProgram};
pub use shaders::ShaderSource;
pub use slot::{Attribute, SamplerBinding, Uniform, UniformKind};
pub use source::VideoSource;

pub use vidcomp_core::EngineError;
pub use vidcomp_runtime::{EffectKind, TransitionRamp};

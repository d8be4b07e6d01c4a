//! Attribute and uniform slots of a linked program.
//!
//! A slot is created from GL introspection, receives CPU-side values from the caller, and pushes
//! them to GL when bound. Slots never touch GL outside of `bind`/`release`.

use glow::{NativeBuffer, NativeTexture, NativeUniformLocation};
use vidcomp_core::{EngineError, SlotKind};

use crate::check::check_gl_error;
use crate::gl::{Gl, SAMPLER_EXTERNAL_2D_Y2Y_EXT, SAMPLER_EXTERNAL_OES, TEXTURE_EXTERNAL_OES};

/// Value shape of a uniform, derived from its GL type at link time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vector2,
    Vector3,
    Vector4,
    Matrix3,
    Matrix4,
    Sampler2D,
    SamplerExternalOES,
}

impl UniformKind {
    /// Map a GL type enum to a kind. Anything outside the supported set fails construction.
    pub fn from_gl(name: &str, gl_type: u32) -> Result<Self, EngineError> {
        let kind = match gl_type {
            glow::FLOAT => UniformKind::Float,
            glow::FLOAT_VEC2 => UniformKind::Vector2,
            glow::FLOAT_VEC3 => UniformKind::Vector3,
            glow::FLOAT_VEC4 => UniformKind::Vector4,
            glow::FLOAT_MAT3 => UniformKind::Matrix3,
            glow::FLOAT_MAT4 => UniformKind::Matrix4,
            glow::SAMPLER_2D => UniformKind::Sampler2D,
            SAMPLER_EXTERNAL_OES | SAMPLER_EXTERNAL_2D_Y2Y_EXT => UniformKind::SamplerExternalOES,
            other => {
                return Err(EngineError::UnsupportedUniformType {
                    name: name.to_string(),
                    gl_type: other,
                })
            }
        };
        Ok(kind)
    }

    /// Number of floats the slot holds (0 for samplers).
    pub fn components(self) -> usize {
        match self {
            UniformKind::Float => 1,
            UniformKind::Vector2 => 2,
            UniformKind::Vector3 => 3,
            UniformKind::Vector4 => 4,
            UniformKind::Matrix3 => 9,
            UniformKind::Matrix4 => 16,
            UniformKind::Sampler2D | UniformKind::SamplerExternalOES => 0,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, UniformKind::Sampler2D | UniformKind::SamplerExternalOES)
    }

    /// Texture target a sampler of this kind binds to.
    pub fn texture_target(self) -> Option<u32> {
        match self {
            UniformKind::Sampler2D => Some(glow::TEXTURE_2D),
            UniformKind::SamplerExternalOES => Some(TEXTURE_EXTERNAL_OES),
            _ => None,
        }
    }

    pub fn glsl_name(self) -> &'static str {
        match self {
            UniformKind::Float => "float",
            UniformKind::Vector2 => "vec2",
            UniformKind::Vector3 => "vec3",
            UniformKind::Vector4 => "vec4",
            UniformKind::Matrix3 => "mat3",
            UniformKind::Matrix4 => "mat4",
            UniformKind::Sampler2D => "sampler2D",
            UniformKind::SamplerExternalOES => "samplerExternalOES",
        }
    }
}

impl std::fmt::Display for UniformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.glsl_name())
    }
}

// -------------------------------------------------------------------------------------------------
// Attributes
// -------------------------------------------------------------------------------------------------

/// A per-vertex input.
///
/// Values are uploaded into a slot-owned array buffer the first time the slot is bound after they
/// change; rebinding unchanged values only re-issues the pointer setup.
#[derive(Debug)]
pub struct Attribute {
    name: String,
    index: u32,
    location: Option<u32>,
    values: Option<Vec<f32>>,
    components: usize,
    buffer: Option<NativeBuffer>,
    dirty: bool,
}

impl Attribute {
    pub(crate) fn new(name: String, index: u32, location: Option<u32>) -> Self {
        Self {
            name,
            index,
            location,
            values: None,
            components: 0,
            buffer: None,
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the program's active-attribute list.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Location reported by `glGetAttribLocation`.
    pub fn location(&self) -> Option<u32> {
        self.location
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn values(&self) -> Option<&[f32]> {
        self.values.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.values.is_some()
    }

    pub(crate) fn set_buffer(&mut self, values: &[f32], components: usize) -> Result<(), EngineError> {
        if !(1..=4).contains(&components) {
            return Err(self.mismatch(format!("{components} components per vertex (expected 1..=4)")));
        }
        if values.is_empty() || values.len() % components != 0 {
            return Err(self.mismatch(format!(
                "{} values is not a whole number of {components}-component vertices",
                values.len()
            )));
        }

        self.values = Some(values.to_vec());
        self.components = components;
        self.dirty = true;
        Ok(())
    }

    fn mismatch(&self, detail: String) -> EngineError {
        EngineError::TypeMismatch {
            name: self.name.clone(),
            kind: SlotKind::Attribute,
            detail,
        }
    }

    /// Upload (if changed) and point the attribute at its buffer. Expects the owning program's
    /// vertex array to be bound.
    pub(crate) unsafe fn bind<G: Gl + ?Sized>(&mut self, gl: &G) -> Result<(), EngineError> {
        let Some(values) = self.values.as_deref() else {
            return Err(EngineError::UnsetSlot {
                name: self.name.clone(),
            });
        };
        let Some(location) = self.location else {
            return Ok(());
        };

        let buffer = match self.buffer {
            Some(b) => b,
            None => {
                let b = gl
                    .create_buffer()
                    .map_err(|e| EngineError::GlCreate(format!("create_buffer failed: {e:?}")))?;
                self.buffer = Some(b);
                self.dirty = true;
                b
            }
        };

        gl.bind_array_buffer(Some(buffer));
        if self.dirty {
            gl.array_buffer_data_f32(values);
            self.dirty = false;
        }
        gl.vertex_attrib_pointer_f32(location, self.components as i32);
        gl.enable_vertex_attrib_array(location);
        gl.bind_array_buffer(None);

        check_gl_error(gl, &format!("bind attribute '{}'", self.name))
    }

    pub(crate) unsafe fn release<G: Gl + ?Sized>(&mut self, gl: &G) {
        if let Some(b) = self.buffer.take() {
            gl.delete_buffer(b);
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Uniforms
// -------------------------------------------------------------------------------------------------

/// Texture assignment of a sampler uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    pub texture: NativeTexture,
    pub unit: u32,
}

/// A program-wide input.
///
/// Numeric uniforms start zeroed; samplers must be assigned before binding.
#[derive(Debug)]
pub struct Uniform {
    name: String,
    location: Option<NativeUniformLocation>,
    kind: UniformKind,
    value: [f32; 16],
    sampler: Option<SamplerBinding>,
}

impl Uniform {
    pub(crate) fn new(name: String, location: Option<NativeUniformLocation>, kind: UniformKind) -> Self {
        Self {
            name,
            location,
            kind,
            value: [0.0; 16],
            sampler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UniformKind {
        self.kind
    }

    pub fn location(&self) -> Option<&NativeUniformLocation> {
        self.location.as_ref()
    }

    /// CPU-side value (`kind().components()` floats; empty for samplers).
    pub fn value(&self) -> &[f32] {
        &self.value[..self.kind.components()]
    }

    pub fn sampler(&self) -> Option<SamplerBinding> {
        self.sampler
    }

    pub(crate) fn set_floats(&mut self, values: &[f32]) -> Result<(), EngineError> {
        if self.kind.is_sampler() {
            return Err(self.mismatch(format!("{} is a sampler; assign a texture instead", self.kind)));
        }
        let capacity = self.kind.components();
        if values.is_empty() || values.len() > capacity {
            return Err(self.mismatch(format!(
                "{} values written to a {} ({capacity} components)",
                values.len(),
                self.kind
            )));
        }

        self.value[..values.len()].copy_from_slice(values);
        Ok(())
    }

    pub(crate) fn set_sampler(&mut self, texture: NativeTexture, unit: u32) -> Result<(), EngineError> {
        if !self.kind.is_sampler() {
            return Err(self.mismatch(format!("texture assigned to a {}", self.kind)));
        }
        if glow::TEXTURE0.checked_add(unit).is_none() || i32::try_from(unit).is_err() {
            return Err(self.mismatch(format!("texture unit {unit} is out of range")));
        }
        self.sampler = Some(SamplerBinding { texture, unit });
        Ok(())
    }

    fn mismatch(&self, detail: String) -> EngineError {
        EngineError::TypeMismatch {
            name: self.name.clone(),
            kind: SlotKind::Uniform,
            detail,
        }
    }

    /// Push the value into the currently used program.
    pub(crate) unsafe fn bind<G: Gl + ?Sized>(&self, gl: &G) -> Result<(), EngineError> {
        if let Some(target) = self.kind.texture_target() {
            self.bind_sampler(gl, target)?;
        } else if let Some(loc) = self.location.as_ref() {
            let v = &self.value;
            match self.kind {
                UniformKind::Float => gl.uniform_1_f32_slice(loc, &v[..1]),
                UniformKind::Vector2 => gl.uniform_2_f32_slice(loc, &v[..2]),
                UniformKind::Vector3 => gl.uniform_3_f32_slice(loc, &v[..3]),
                UniformKind::Vector4 => gl.uniform_4_f32_slice(loc, &v[..4]),
                UniformKind::Matrix3 => gl.uniform_matrix_3_f32_slice(loc, false, &v[..9]),
                UniformKind::Matrix4 => gl.uniform_matrix_4_f32_slice(loc, false, &v[..16]),
                UniformKind::Sampler2D | UniformKind::SamplerExternalOES => {}
            }
        }

        check_gl_error(gl, &format!("bind uniform '{}'", self.name))
    }

    unsafe fn bind_sampler<G: Gl + ?Sized>(&self, gl: &G, target: u32) -> Result<(), EngineError> {
        let Some(SamplerBinding { texture, unit }) = self.sampler else {
            return Err(EngineError::UnsetSlot {
                name: self.name.clone(),
            });
        };

        let max_units = gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS);
        if i64::from(unit) >= i64::from(max_units) {
            return Err(self.mismatch(format!(
                "texture unit {unit} exceeds the driver's {max_units} combined units"
            )));
        }

        // `set_sampler` keeps `unit` within `i32` and `TEXTURE0 + unit` within `u32`.
        gl.active_texture(glow::TEXTURE0 + unit);
        gl.bind_texture(target, Some(texture));
        gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        if let Some(loc) = self.location.as_ref() {
            gl.uniform_1_i32(loc, unit as i32);
        }
        Ok(())
    }
}

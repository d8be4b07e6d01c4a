use std::collections::HashMap;

use glow::{NativeProgram, NativeTexture, NativeVertexArray};
use vidcomp_core::{EngineError, ShaderStage};

use crate::check::check_gl_error;
use crate::gl::Gl;
use crate::slot::{Attribute, Uniform, UniformKind};

/// Compile both stages and link them. Intermediate objects are released on every exit path.
pub unsafe fn compile_program<G: Gl + ?Sized>(
    gl: &G,
    vert_src: &str,
    frag_src: &str,
) -> Result<NativeProgram, EngineError> {
    let vs = gl
        .create_shader(glow::VERTEX_SHADER)
        .map_err(|e| EngineError::GlCreate(format!("create_shader(VS) failed: {e:?}")))?;
    gl.shader_source(vs, vert_src);
    gl.compile_shader(vs);
    if !gl.get_shader_compile_status(vs) {
        let log = gl.get_shader_info_log(vs);
        gl.delete_shader(vs);
        return Err(EngineError::ShaderCompile {
            stage: ShaderStage::Vertex,
            log,
        });
    }

    let fs = match gl.create_shader(glow::FRAGMENT_SHADER) {
        Ok(fs) => fs,
        Err(e) => {
            gl.delete_shader(vs);
            return Err(EngineError::GlCreate(format!("create_shader(FS) failed: {e:?}")));
        }
    };
    gl.shader_source(fs, frag_src);
    gl.compile_shader(fs);
    if !gl.get_shader_compile_status(fs) {
        let log = gl.get_shader_info_log(fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        return Err(EngineError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log,
        });
    }

    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(EngineError::GlCreate(format!("create_program failed: {e:?}")));
        }
    };
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(EngineError::ShaderLink(log));
    }

    Ok(program)
}

/// A linked program plus the attribute and uniform slots discovered on it.
///
/// Lifecycle: `new` -> (`use_program` -> set values -> `bind_all` -> draw)* -> `delete`.
/// Every operation after `delete` fails with `EngineError::ProgramDeleted`.
#[derive(Debug)]
pub struct ShaderProgram {
    program: Option<NativeProgram>,
    vao: Option<NativeVertexArray>,
    attributes: Vec<Attribute>,
    uniforms: Vec<Uniform>,
    attribute_index: HashMap<String, usize>,
    uniform_index: HashMap<String, usize>,
}

impl ShaderProgram {
    /// Compile, link and introspect. On any failure nothing is left allocated.
    pub unsafe fn new<G: Gl + ?Sized>(
        gl: &G,
        vert_src: &str,
        frag_src: &str,
    ) -> Result<Self, EngineError> {
        let program = compile_program(gl, vert_src, frag_src)?;

        let (attributes, uniforms) = match introspect(gl, program) {
            Ok(slots) => slots,
            Err(e) => {
                gl.delete_program(program);
                return Err(e);
            }
        };

        let vao = match gl.create_vertex_array() {
            Ok(v) => v,
            Err(e) => {
                gl.delete_program(program);
                return Err(EngineError::GlCreate(format!("create_vertex_array failed: {e:?}")));
            }
        };

        if let Err(e) = check_gl_error(gl, "link program") {
            gl.delete_vertex_array(vao);
            gl.delete_program(program);
            return Err(e);
        }

        let attribute_index = attributes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name().to_string(), i))
            .collect();
        let uniform_index = uniforms
            .iter()
            .enumerate()
            .map(|(i, u)| (u.name().to_string(), i))
            .collect();

        tracing::debug!(
            attributes = ?attributes.iter().map(Attribute::name).collect::<Vec<_>>(),
            uniforms = ?uniforms.iter().map(Uniform::name).collect::<Vec<_>>(),
            "linked shader program"
        );

        Ok(Self {
            program: Some(program),
            vao: Some(vao),
            attributes,
            uniforms,
            attribute_index,
            uniform_index,
        })
    }

    pub fn handle(&self) -> Option<NativeProgram> {
        self.program
    }

    pub fn is_deleted(&self) -> bool {
        self.program.is_none()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &[Uniform] {
        &self.uniforms
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_index.contains_key(name)
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniform_index.contains_key(name)
    }

    pub fn attribute(&self, name: &str) -> Result<&Attribute, EngineError> {
        self.attribute_index
            .get(name)
            .map(|&i| &self.attributes[i])
            .ok_or_else(|| EngineError::unknown_attribute(name))
    }

    pub fn uniform(&self, name: &str) -> Result<&Uniform, EngineError> {
        self.uniform_index
            .get(name)
            .map(|&i| &self.uniforms[i])
            .ok_or_else(|| EngineError::unknown_uniform(name))
    }

    pub fn uniform_kind(&self, name: &str) -> Result<UniformKind, EngineError> {
        self.uniform(name).map(Uniform::kind)
    }

    // ---- configure ----

    /// Store per-vertex data for `name`; `components` floats per vertex (1..=4).
    pub fn set_buffer_attribute(
        &mut self,
        name: &str,
        values: &[f32],
        components: usize,
    ) -> Result<(), EngineError> {
        self.live()?;
        let i = *self
            .attribute_index
            .get(name)
            .ok_or_else(|| EngineError::unknown_attribute(name))?;
        self.attributes[i].set_buffer(values, components)
    }

    pub fn set_float_uniform(&mut self, name: &str, value: f32) -> Result<(), EngineError> {
        self.set_floats_uniform(name, &[value])
    }

    /// Write the leading `values.len()` components of a numeric uniform.
    pub fn set_floats_uniform(&mut self, name: &str, values: &[f32]) -> Result<(), EngineError> {
        self.live()?;
        self.uniform_mut(name)?.set_floats(values)
    }

    /// Assign `texture` to a sampler uniform on texture unit `unit` (0-based).
    pub fn set_sampler_uniform(
        &mut self,
        name: &str,
        texture: NativeTexture,
        unit: u32,
    ) -> Result<(), EngineError> {
        self.live()?;
        self.uniform_mut(name)?.set_sampler(texture, unit)
    }

    fn uniform_mut(&mut self, name: &str) -> Result<&mut Uniform, EngineError> {
        let i = *self
            .uniform_index
            .get(name)
            .ok_or_else(|| EngineError::unknown_uniform(name))?;
        Ok(&mut self.uniforms[i])
    }

    fn live(&self) -> Result<NativeProgram, EngineError> {
        self.program.ok_or(EngineError::ProgramDeleted)
    }

    // ---- GL ----

    /// Make this program current.
    pub unsafe fn use_program<G: Gl + ?Sized>(&self, gl: &G) -> Result<(), EngineError> {
        let program = self.live()?;
        gl.use_program(Some(program));
        check_gl_error(gl, "glUseProgram")
    }

    /// Bind the program's vertex array, then push every attribute and uniform to GL. Requires
    /// `use_program` first, and every attribute and sampler to have been given a value.
    ///
    /// Binding twice without intervening writes produces the same GL state.
    pub unsafe fn bind_all<G: Gl + ?Sized>(&mut self, gl: &G) -> Result<(), EngineError> {
        self.live()?;
        gl.bind_vertex_array(self.vao);
        check_gl_error(gl, "glBindVertexArray")?;
        for attribute in &mut self.attributes {
            attribute.bind(gl)?;
        }
        for uniform in &self.uniforms {
            uniform.bind(gl)?;
        }
        Ok(())
    }

    /// Release the program and its slot buffers. Safe to call more than once.
    pub unsafe fn delete<G: Gl + ?Sized>(&mut self, gl: &G) {
        let Some(program) = self.program.take() else {
            return;
        };
        for attribute in &mut self.attributes {
            attribute.release(gl);
        }
        if let Some(vao) = self.vao.take() {
            gl.delete_vertex_array(vao);
        }
        gl.delete_program(program);
    }
}

unsafe fn introspect<G: Gl + ?Sized>(
    gl: &G,
    program: NativeProgram,
) -> Result<(Vec<Attribute>, Vec<Uniform>), EngineError> {
    let mut attributes = Vec::new();
    for index in 0..gl.get_active_attributes(program) {
        let active = gl.get_active_attribute(program, index).ok_or_else(|| {
            EngineError::Introspection(format!("active attribute {index} could not be queried"))
        })?;
        // Built-ins such as gl_VertexID are reported by some drivers.
        if active.name.starts_with("gl_") {
            continue;
        }
        if attributes.iter().any(|a: &Attribute| a.name() == active.name) {
            return Err(EngineError::Introspection(format!(
                "attribute '{}' reported twice",
                active.name
            )));
        }
        let location = gl.get_attrib_location(program, &active.name);
        attributes.push(Attribute::new(active.name, index, location));
    }

    let mut uniforms = Vec::new();
    for index in 0..gl.get_active_uniforms(program) {
        let active = gl.get_active_uniform(program, index).ok_or_else(|| {
            EngineError::Introspection(format!("active uniform {index} could not be queried"))
        })?;
        let name = active
            .name
            .strip_suffix("[0]")
            .unwrap_or(&active.name)
            .to_string();
        if uniforms.iter().any(|u: &Uniform| u.name() == name) {
            return Err(EngineError::Introspection(format!("uniform '{name}' reported twice")));
        }
        let kind = UniformKind::from_gl(&name, active.gl_type)?;
        let location = gl.get_uniform_location(program, &active.name);
        uniforms.push(Uniform::new(name, location, kind));
    }

    Ok((attributes, uniforms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGl;
    use vidcomp_core::SlotKind;

    const VS: &str = "#version 330 core
in vec4 aPosition;
uniform mat4 uMVPMatrix;
void main() { gl_Position = uMVPMatrix * aPosition; }
";

    const FS: &str = "#version 330 core
uniform vec4 uColor;
out vec4 fragColor;
void main() { fragColor = uColor; }
";

    fn program(gl: &FakeGl) -> ShaderProgram {
        unsafe { ShaderProgram::new(gl, VS, FS) }.unwrap()
    }

    #[test]
    fn introspection_discovers_every_active_variable() {
        let gl = FakeGl::new();
        let p = program(&gl);

        let attrs: Vec<_> = p.attributes().iter().map(|a| a.name()).collect();
        assert_eq!(attrs, ["aPosition"]);
        assert_eq!(p.uniform_kind("uMVPMatrix").unwrap(), UniformKind::Matrix4);
        assert_eq!(p.uniform_kind("uColor").unwrap(), UniformKind::Vector4);
        assert_eq!(p.uniforms().len(), 2);
    }

    #[test]
    fn unused_declarations_are_not_slots() {
        let gl = FakeGl::new();
        let fs = "#version 330 core
uniform vec4 uColor;
uniform float uUnused;
out vec4 fragColor;
void main() { fragColor = uColor; }
";
        let p = unsafe { ShaderProgram::new(&gl, VS, fs) }.unwrap();
        assert!(!p.has_uniform("uUnused"));
        assert!(matches!(
            p.uniform("uUnused").unwrap_err(),
            EngineError::UnknownSlot { kind: SlotKind::Uniform, .. }
        ));
    }

    #[test]
    fn compile_failure_names_the_stage_and_leaks_nothing() {
        let gl = FakeGl::new();
        let bad = "#version 330 core\n#error broken on purpose\nvoid main() {}\n";

        let err = unsafe { ShaderProgram::new(&gl, VS, bad) }.unwrap_err();
        match err {
            EngineError::ShaderCompile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("broken on purpose"), "{log}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gl.live_shaders(), 0);
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn link_failure_deletes_the_program() {
        let gl = FakeGl::new();
        gl.fail_next_link("missing varying");

        let err = unsafe { ShaderProgram::new(&gl, VS, FS) }.unwrap_err();
        assert!(matches!(err, EngineError::ShaderLink(ref log) if log.contains("missing varying")));
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_shaders(), 0);
    }

    #[test]
    fn unsupported_uniform_type_fails_construction() {
        let gl = FakeGl::new();
        let fs = "#version 330 core
uniform int uMode;
out vec4 fragColor;
void main() { fragColor = vec4(float(uMode)); }
";
        let err = unsafe { ShaderProgram::new(&gl, VS, fs) }.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedUniformType { ref name, .. } if name == "uMode"));
        assert_eq!(gl.live_programs(), 0);
    }

    #[test]
    fn bind_pushes_values_to_the_current_program() {
        let gl = FakeGl::new();
        let mut p = program(&gl);
        let quad = [-1.0, -1.0, 0.0, 1.0, 1.0, -1.0, 0.0, 1.0, -1.0, 1.0, 0.0, 1.0];

        unsafe { p.use_program(&gl) }.unwrap();
        p.set_buffer_attribute("aPosition", &quad, 4).unwrap();
        p.set_floats_uniform("uColor", &[1.0, 0.5, 0.25, 1.0]).unwrap();
        unsafe { p.bind_all(&gl) }.unwrap();

        let handle = p.handle().unwrap();
        assert_eq!(gl.uniform_value(handle, "uColor").unwrap(), [1.0, 0.5, 0.25, 1.0]);

        let loc = p.attribute("aPosition").unwrap().location().unwrap();
        let pointer = gl.attrib_pointer(loc).unwrap();
        assert_eq!(pointer.components, 4);
        assert!(pointer.enabled);
        assert_eq!(gl.buffer_contents(pointer.buffer).unwrap(), quad);
    }

    #[test]
    fn bind_is_idempotent() {
        let gl = FakeGl::new();
        let mut p = program(&gl);
        unsafe { p.use_program(&gl) }.unwrap();
        p.set_buffer_attribute("aPosition", &[0.0; 8], 2).unwrap();
        p.set_floats_uniform("uColor", &[0.1, 0.2, 0.3, 0.4]).unwrap();

        unsafe { p.bind_all(&gl) }.unwrap();
        let first = gl.snapshot();
        unsafe { p.bind_all(&gl) }.unwrap();
        assert_eq!(gl.snapshot(), first);
    }

    #[test]
    fn driver_error_during_bind_surfaces_immediately() {
        let gl = FakeGl::new();
        let mut p = program(&gl);
        unsafe { p.use_program(&gl) }.unwrap();
        p.set_buffer_attribute("aPosition", &[0.0; 8], 2).unwrap();

        gl.push_error(glow::INVALID_OPERATION);
        let err = unsafe { p.bind_all(&gl) }.unwrap_err();
        assert!(
            matches!(err, EngineError::GpuState { code, .. } if code == glow::INVALID_OPERATION),
            "{err}"
        );
        assert!(gl.draw_calls().is_empty());
    }

    #[test]
    fn vertex_array_is_bound_by_bind_all() {
        let gl = FakeGl::new();
        let mut p = program(&gl);
        unsafe { p.use_program(&gl) }.unwrap();
        assert_eq!(unsafe { gl.get_parameter_i32(glow::VERTEX_ARRAY_BINDING) }, 0);

        p.set_buffer_attribute("aPosition", &[0.0; 8], 2).unwrap();
        unsafe { p.bind_all(&gl) }.unwrap();
        assert_ne!(unsafe { gl.get_parameter_i32(glow::VERTEX_ARRAY_BINDING) }, 0);
    }

    #[test]
    fn legacy_qualifiers_do_not_compile_under_core_profile() {
        let gl = FakeGl::new();
        let vs = "#version 330 core
attribute vec4 aPosition;
void main() { gl_Position = aPosition; }
";
        let err = unsafe { ShaderProgram::new(&gl, vs, FS) }.unwrap_err();
        match err {
            EngineError::ShaderCompile { stage, log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(log.contains("attribute"), "{log}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gl.live_shaders(), 0);
    }

    #[test]
    fn unset_attribute_fails_bind() {
        let gl = FakeGl::new();
        let mut p = program(&gl);
        unsafe { p.use_program(&gl) }.unwrap();
        let err = unsafe { p.bind_all(&gl) }.unwrap_err();
        assert!(matches!(err, EngineError::UnsetSlot { ref name } if name == "aPosition"));
    }

    #[test]
    fn unknown_names_are_loud() {
        let gl = FakeGl::new();
        let mut p = program(&gl);
        assert!(matches!(
            p.set_float_uniform("uMissing", 1.0).unwrap_err(),
            EngineError::UnknownSlot { kind: SlotKind::Uniform, .. }
        ));
        assert!(matches!(
            p.set_buffer_attribute("aMissing", &[0.0; 3], 3).unwrap_err(),
            EngineError::UnknownSlot { kind: SlotKind::Attribute, .. }
        ));
    }

    #[test]
    fn delete_is_idempotent_and_final() {
        let gl = FakeGl::new();
        let mut p = program(&gl);
        unsafe { p.use_program(&gl) }.unwrap();
        p.set_buffer_attribute("aPosition", &[0.0; 8], 2).unwrap();
        unsafe { p.bind_all(&gl) }.unwrap();

        unsafe { p.delete(&gl) };
        unsafe { p.delete(&gl) };
        assert!(p.is_deleted());
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_buffers(), 0);

        assert!(matches!(unsafe { p.use_program(&gl) }, Err(EngineError::ProgramDeleted)));
        assert!(matches!(
            p.set_float_uniform("uColor", 1.0),
            Err(EngineError::ProgramDeleted)
        ));
    }
}

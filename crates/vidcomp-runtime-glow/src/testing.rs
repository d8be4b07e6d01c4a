//! Recording GL backend for tests.
//!
//! `FakeGl` implements `Gl` without a driver. Shader "compilation" parses GLSL declarations so
//! introspection reports the `in`/`attribute` and `uniform` variables a real linker would keep
//! (a declared name counts as active when it is referenced somewhere besides its declaration).
//! Uniform writes, texture bindings, buffer contents and attribute pointers are recorded and can
//! be inspected. Misuse that a real driver flags (wrong uniform setter, no current program,
//! no bound buffer) is queued as a GL error.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::num::NonZeroU32;

use glow::{
    NativeBuffer, NativeProgram, NativeShader, NativeTexture, NativeUniformLocation,
    NativeVertexArray,
};
use vidcomp_input_video::{FrameProducer, VideoFrame, IDENTITY_TRANSFORM};

use crate::gl::{
    ActiveVariable, Gl, SAMPLER_EXTERNAL_2D_Y2Y_EXT, SAMPLER_EXTERNAL_OES,
    TEXTURE_BINDING_EXTERNAL_OES, TEXTURE_EXTERNAL_OES,
};

/// Combined texture image units the fake driver reports.
pub const TEXTURE_UNITS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribPointer {
    pub buffer: NativeBuffer,
    pub components: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    name: String,
    gl_type: u32,
    array_len: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct FakeShader {
    stage: u32,
    source: String,
    compiled: bool,
    log: String,
    inputs: Vec<Declaration>,
    uniforms: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
struct FakeVariable {
    decl: Declaration,
    location: u32,
}

impl FakeVariable {
    fn active_name(&self) -> String {
        match self.decl.array_len {
            Some(_) => format!("{}[0]", self.decl.name),
            None => self.decl.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct FakeProgram {
    attached: Vec<u32>,
    linked: bool,
    log: String,
    attributes: Vec<FakeVariable>,
    uniforms: Vec<FakeVariable>,
    floats: BTreeMap<u32, Vec<f32>>,
    ints: BTreeMap<u32, i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct FakeTexture {
    size: Option<(i32, i32)>,
    uploads: usize,
    params: BTreeMap<u32, i32>,
}

/// Complete recorded state; compared by `snapshot()`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FakeGlState {
    next_id: u32,
    shaders: BTreeMap<u32, FakeShader>,
    programs: BTreeMap<u32, FakeProgram>,
    current_program: Option<u32>,
    buffers: BTreeMap<u32, Option<Vec<f32>>>,
    array_buffer: Option<u32>,
    vertex_arrays: BTreeSet<u32>,
    vertex_array: Option<u32>,
    pointers: BTreeMap<(u32, u32), (u32, i32)>,
    enabled: BTreeSet<(u32, u32)>,
    textures: BTreeMap<u32, FakeTexture>,
    active_unit: u32,
    bindings: BTreeMap<(u32, u32), u32>,
    viewport: (i32, i32, i32, i32),
    clears: usize,
    draws: Vec<(u32, i32, i32)>,
    errors: VecDeque<u32>,
    fail_next_link: Option<String>,
}

impl FakeGlState {
    fn alloc(&mut self) -> Result<NonZeroU32, String> {
        self.next_id += 1;
        NonZeroU32::new(self.next_id).ok_or_else(|| "handle space exhausted".to_string())
    }

    fn error(&mut self, code: u32) {
        self.errors.push_back(code);
    }

    fn current_mut(&mut self) -> Option<&mut FakeProgram> {
        let id = self.current_program?;
        self.programs.get_mut(&id)
    }

    fn bound_texture_mut(&mut self, target: u32) -> Option<&mut FakeTexture> {
        let id = *self.bindings.get(&(self.active_unit, target))?;
        self.textures.get_mut(&id)
    }

    fn vao_key(&self) -> u32 {
        self.vertex_array.unwrap_or(0)
    }

    fn write_floats(&mut self, location: &NativeUniformLocation, accepted: &[u32], v: &[f32]) {
        let Some(program) = self.current_mut() else {
            self.error(glow::INVALID_OPERATION);
            return;
        };
        let Some(var) = program.uniforms.iter().find(|u| u.location == location.0) else {
            self.error(glow::INVALID_OPERATION);
            return;
        };
        if !accepted.contains(&var.decl.gl_type) {
            self.error(glow::INVALID_OPERATION);
            return;
        }
        let n = components_of(var.decl.gl_type).min(v.len());
        let loc = var.location;
        program.floats.insert(loc, v[..n].to_vec());
    }
}

#[derive(Debug, Default)]
pub struct FakeGl {
    state: RefCell<FakeGlState>,
}

impl FakeGl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next `get_error`.
    pub fn push_error(&self, code: u32) {
        self.state.borrow_mut().error(code);
    }

    /// Make the next `link_program` fail with `log`.
    pub fn fail_next_link(&self, log: &str) {
        self.state.borrow_mut().fail_next_link = Some(log.to_string());
    }

    pub fn snapshot(&self) -> FakeGlState {
        self.state.borrow().clone()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn current_program(&self) -> Option<NativeProgram> {
        self.state
            .borrow()
            .current_program
            .and_then(NonZeroU32::new)
            .map(NativeProgram)
    }

    /// Last float value written to `name` on `program` (zeros before any write).
    pub fn uniform_value(&self, program: NativeProgram, name: &str) -> Option<Vec<f32>> {
        let st = self.state.borrow();
        let p = st.programs.get(&program.0.get())?;
        let var = find_variable(&p.uniforms, name)?;
        p.floats.get(&var.location).cloned()
    }

    /// Last integer (sampler unit) written to `name` on `program`.
    pub fn uniform_int(&self, program: NativeProgram, name: &str) -> Option<i32> {
        let st = self.state.borrow();
        let p = st.programs.get(&program.0.get())?;
        let var = find_variable(&p.uniforms, name)?;
        p.ints.get(&var.location).copied()
    }

    /// Pointer state of `location` in the currently bound vertex array.
    pub fn attrib_pointer(&self, location: u32) -> Option<AttribPointer> {
        let st = self.state.borrow();
        let key = (st.vao_key(), location);
        let &(buffer, components) = st.pointers.get(&key)?;
        Some(AttribPointer {
            buffer: NativeBuffer(NonZeroU32::new(buffer)?),
            components,
            enabled: st.enabled.contains(&key),
        })
    }

    pub fn buffer_contents(&self, buffer: NativeBuffer) -> Option<Vec<f32>> {
        self.state.borrow().buffers.get(&buffer.0.get()).cloned().flatten()
    }

    /// Texture bound to `target` on texture unit `unit` (0-based).
    pub fn bound_texture(&self, unit: u32, target: u32) -> Option<NativeTexture> {
        let st = self.state.borrow();
        let id = *st.bindings.get(&(unit, target))?;
        NonZeroU32::new(id).map(NativeTexture)
    }

    pub fn texture_size(&self, texture: NativeTexture) -> Option<(i32, i32)> {
        self.state.borrow().textures.get(&texture.0.get())?.size
    }

    /// Pixel uploads into `texture` (allocations without data are not counted).
    pub fn texture_uploads(&self, texture: NativeTexture) -> usize {
        self.state
            .borrow()
            .textures
            .get(&texture.0.get())
            .map(|t| t.uploads)
            .unwrap_or(0)
    }

    pub fn texture_parameter(&self, texture: NativeTexture, parameter: u32) -> Option<i32> {
        let st = self.state.borrow();
        st.textures.get(&texture.0.get())?.params.get(&parameter).copied()
    }

    pub fn last_viewport(&self) -> (i32, i32, i32, i32) {
        self.state.borrow().viewport
    }

    pub fn clear_count(&self) -> usize {
        self.state.borrow().clears
    }

    pub fn draw_calls(&self) -> Vec<(u32, i32, i32)> {
        self.state.borrow().draws.clone()
    }
}

fn find_variable<'a>(vars: &'a [FakeVariable], name: &str) -> Option<&'a FakeVariable> {
    vars.iter()
        .find(|v| v.decl.name == name || v.active_name() == name)
}

// -------------------------------------------------------------------------------------------------
// GLSL declaration scanning
// -------------------------------------------------------------------------------------------------

fn gl_type_of(glsl: &str) -> Option<u32> {
    let t = match glsl {
        "float" => glow::FLOAT,
        "vec2" => glow::FLOAT_VEC2,
        "vec3" => glow::FLOAT_VEC3,
        "vec4" => glow::FLOAT_VEC4,
        "mat2" => glow::FLOAT_MAT2,
        "mat3" => glow::FLOAT_MAT3,
        "mat4" => glow::FLOAT_MAT4,
        "int" => glow::INT,
        "ivec2" => glow::INT_VEC2,
        "bool" => glow::BOOL,
        "sampler2D" => glow::SAMPLER_2D,
        "sampler3D" => glow::SAMPLER_3D,
        "samplerCube" => glow::SAMPLER_CUBE,
        "samplerExternalOES" => SAMPLER_EXTERNAL_OES,
        "__samplerExternal2DY2YEXT" => SAMPLER_EXTERNAL_2D_Y2Y_EXT,
        _ => return None,
    };
    Some(t)
}

fn components_of(gl_type: u32) -> usize {
    match gl_type {
        glow::FLOAT_VEC2 | glow::INT_VEC2 => 2,
        glow::FLOAT_VEC3 => 3,
        glow::FLOAT_VEC4 | glow::FLOAT_MAT2 => 4,
        glow::FLOAT_MAT3 => 9,
        glow::FLOAT_MAT4 => 16,
        _ => 1,
    }
}

fn is_sampler_type(gl_type: u32) -> bool {
    matches!(
        gl_type,
        glow::SAMPLER_2D
            | glow::SAMPLER_3D
            | glow::SAMPLER_CUBE
            | SAMPLER_EXTERNAL_OES
            | SAMPLER_EXTERNAL_2D_Y2Y_EXT
    )
}

fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map(|i| &after[i..]).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map(|i| &after[i + 2..]).unwrap_or("");
            out.push(' ');
        } else {
            let c = rest.chars().next().unwrap_or(' ');
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// `attribute`/`varying` exist in desktop GLSL before 1.30 and in GLSL ES 1.00 only.
fn allows_legacy_qualifiers(version: &str) -> bool {
    let mut parts = version.split_whitespace();
    let number = parts.next().and_then(|n| n.parse::<u32>().ok()).unwrap_or(110);
    match parts.next() {
        Some("es") => number < 300,
        _ => number < 130,
    }
}

/// Parse a shader body into (stage inputs, uniforms), or an info log on failure.
fn scan_shader(stage: u32, src: &str) -> Result<(Vec<Declaration>, Vec<Declaration>), String> {
    let src = strip_comments(src);
    let mut body = String::with_capacity(src.len());
    let mut legacy_qualifiers = true;
    for (n, line) in src.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(msg) = trimmed.strip_prefix("#error") {
            return Err(format!("ERROR: 0:{}: '#error' : {}", n + 1, msg.trim()));
        }
        if let Some(version) = trimmed.strip_prefix("#version") {
            legacy_qualifiers = allows_legacy_qualifiers(version);
        }
        if !trimmed.starts_with('#') {
            body.push_str(line);
            body.push('\n');
        }
    }
    if !body.contains("void main") {
        return Err("ERROR: 0:0: '' : missing entry point main()".to_string());
    }

    let mut inputs = Vec::new();
    let mut uniforms = Vec::new();
    for statement in body.split(|c| c == ';' || c == '{' || c == '}') {
        let mut tokens: Vec<&str> = statement.split_whitespace().collect();
        if tokens.first().is_some_and(|t| t.starts_with("layout")) {
            let close = tokens.iter().position(|t| t.ends_with(')')).unwrap_or(0);
            tokens.drain(..=close);
        }
        tokens.retain(|t| !matches!(*t, "lowp" | "mediump" | "highp" | "flat" | "smooth"));

        if let Some(&qualifier @ ("attribute" | "varying")) = tokens.first() {
            if !legacy_qualifiers {
                return Err(format!(
                    "ERROR: 0:0: '{qualifier}' : not supported in this GLSL version"
                ));
            }
        }

        let target = match tokens.first().copied() {
            Some("uniform") => &mut uniforms,
            Some("in") | Some("attribute") if stage == glow::VERTEX_SHADER => &mut inputs,
            _ => continue,
        };
        if tokens.len() < 3 {
            continue; // uniform block header
        }
        let gl_type = gl_type_of(tokens[1])
            .ok_or_else(|| format!("ERROR: '{}' : unknown type", tokens[1]))?;

        let declarators = tokens[2..].join(" ");
        for declarator in declarators.split(',') {
            let declarator = declarator.replace(' ', "");
            let (name, array_len) = match declarator.split_once('[') {
                Some((name, rest)) => {
                    let len = rest
                        .trim_end_matches(']')
                        .parse::<usize>()
                        .map_err(|_| format!("ERROR: '{declarator}' : bad array size"))?;
                    (name.to_string(), Some(len))
                }
                None => (declarator, None),
            };
            if !name.is_empty() {
                target.push(Declaration {
                    name,
                    gl_type,
                    array_len,
                });
            }
        }
    }
    Ok((inputs, uniforms))
}

/// Whole-identifier occurrences of `name` in `src`.
fn mentions(src: &str, name: &str) -> usize {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    src.match_indices(name)
        .filter(|&(i, _)| {
            let before = src[..i].chars().next_back();
            let after = src[i + name.len()..].chars().next();
            !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
        })
        .count()
}

fn link(state: &mut FakeGlState, id: u32) -> Result<(Vec<FakeVariable>, Vec<FakeVariable>), String> {
    if let Some(log) = state.fail_next_link.take() {
        return Err(log);
    }
    let program = state.programs.get(&id).ok_or("no such program")?;
    let shaders: Vec<&FakeShader> = program
        .attached
        .iter()
        .filter_map(|s| state.shaders.get(s))
        .collect();
    if shaders.iter().any(|s| !s.compiled) {
        return Err("ERROR: attached shader is not compiled".into());
    }
    let vertex = shaders.iter().find(|s| s.stage == glow::VERTEX_SHADER);
    let fragment = shaders.iter().find(|s| s.stage == glow::FRAGMENT_SHADER);
    let (Some(vertex), Some(_)) = (vertex, fragment) else {
        return Err("ERROR: program needs a vertex and a fragment shader".into());
    };

    let all_source: String = shaders.iter().map(|s| s.source.as_str()).collect::<Vec<_>>().join("\n");
    let active = |d: &Declaration| mentions(&all_source, &d.name) >= 2;

    let live_inputs: Vec<&Declaration> = vertex.inputs.iter().filter(|d| active(*d)).collect();
    // Locations run in reverse declaration order, unlike active indices.
    let attributes = live_inputs
        .iter()
        .enumerate()
        .map(|(i, d)| FakeVariable {
            decl: (*d).clone(),
            location: (live_inputs.len() - 1 - i) as u32,
        })
        .collect();

    let mut uniforms: Vec<FakeVariable> = Vec::new();
    for decl in shaders.iter().flat_map(|s| s.uniforms.iter()) {
        if let Some(existing) = uniforms.iter().find(|u| u.decl.name == decl.name) {
            if existing.decl.gl_type != decl.gl_type {
                return Err(format!("ERROR: uniform '{}' declared with different types", decl.name));
            }
            continue;
        }
        if active(decl) {
            let location = uniforms.len() as u32;
            uniforms.push(FakeVariable {
                decl: decl.clone(),
                location,
            });
        }
    }
    Ok((attributes, uniforms))
}

fn to_active(v: &FakeVariable) -> ActiveVariable {
    ActiveVariable {
        name: v.active_name(),
        gl_type: v.decl.gl_type,
        size: v.decl.array_len.unwrap_or(1) as i32,
    }
}

// -------------------------------------------------------------------------------------------------
// Gl impl
// -------------------------------------------------------------------------------------------------

impl Gl for FakeGl {
    unsafe fn create_shader(&self, shader_type: u32) -> Result<NativeShader, String> {
        let mut st = self.state.borrow_mut();
        let id = st.alloc()?;
        st.shaders.insert(
            id.get(),
            FakeShader {
                stage: shader_type,
                source: String::new(),
                compiled: false,
                log: String::new(),
                inputs: Vec::new(),
                uniforms: Vec::new(),
            },
        );
        Ok(NativeShader(id))
    }

    unsafe fn shader_source(&self, shader: NativeShader, source: &str) {
        let mut st = self.state.borrow_mut();
        match st.shaders.get_mut(&shader.0.get()) {
            Some(s) => s.source = source.to_string(),
            None => st.error(glow::INVALID_VALUE),
        }
    }

    unsafe fn compile_shader(&self, shader: NativeShader) {
        let mut st = self.state.borrow_mut();
        let Some(s) = st.shaders.get_mut(&shader.0.get()) else {
            st.error(glow::INVALID_VALUE);
            return;
        };
        match scan_shader(s.stage, &s.source) {
            Ok((inputs, uniforms)) => {
                s.compiled = true;
                s.log.clear();
                s.inputs = inputs;
                s.uniforms = uniforms;
            }
            Err(log) => {
                s.compiled = false;
                s.log = log;
            }
        }
    }

    unsafe fn get_shader_compile_status(&self, shader: NativeShader) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader.0.get())
            .map(|s| s.compiled)
            .unwrap_or(false)
    }

    unsafe fn get_shader_info_log(&self, shader: NativeShader) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader.0.get())
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    unsafe fn delete_shader(&self, shader: NativeShader) {
        self.state.borrow_mut().shaders.remove(&shader.0.get());
    }

    unsafe fn create_program(&self) -> Result<NativeProgram, String> {
        let mut st = self.state.borrow_mut();
        let id = st.alloc()?;
        st.programs.insert(id.get(), FakeProgram::default());
        Ok(NativeProgram(id))
    }

    unsafe fn attach_shader(&self, program: NativeProgram, shader: NativeShader) {
        let mut st = self.state.borrow_mut();
        match st.programs.get_mut(&program.0.get()) {
            Some(p) => p.attached.push(shader.0.get()),
            None => st.error(glow::INVALID_VALUE),
        }
    }

    unsafe fn detach_shader(&self, program: NativeProgram, shader: NativeShader) {
        let mut st = self.state.borrow_mut();
        if let Some(p) = st.programs.get_mut(&program.0.get()) {
            p.attached.retain(|&s| s != shader.0.get());
        }
    }

    unsafe fn link_program(&self, program: NativeProgram) {
        let mut st = self.state.borrow_mut();
        let id = program.0.get();
        let result = link(&mut st, id);
        let Some(p) = st.programs.get_mut(&id) else {
            st.error(glow::INVALID_VALUE);
            return;
        };
        match result {
            Ok((attributes, uniforms)) => {
                p.floats = uniforms
                    .iter()
                    .filter(|u| !is_sampler_type(u.decl.gl_type))
                    .map(|u| (u.location, vec![0.0; components_of(u.decl.gl_type)]))
                    .collect();
                p.ints = uniforms
                    .iter()
                    .filter(|u| is_sampler_type(u.decl.gl_type))
                    .map(|u| (u.location, 0))
                    .collect();
                p.attributes = attributes;
                p.uniforms = uniforms;
                p.linked = true;
                p.log.clear();
            }
            Err(log) => {
                p.linked = false;
                p.log = log;
            }
        }
    }

    unsafe fn get_program_link_status(&self, program: NativeProgram) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program.0.get())
            .map(|p| p.linked)
            .unwrap_or(false)
    }

    unsafe fn get_program_info_log(&self, program: NativeProgram) -> String {
        self.state
            .borrow()
            .programs
            .get(&program.0.get())
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    unsafe fn delete_program(&self, program: NativeProgram) {
        self.state.borrow_mut().programs.remove(&program.0.get());
    }

    unsafe fn use_program(&self, program: Option<NativeProgram>) {
        let mut st = self.state.borrow_mut();
        match program {
            None => st.current_program = None,
            Some(p) => match st.programs.get(&p.0.get()) {
                Some(fp) if fp.linked => st.current_program = Some(p.0.get()),
                _ => st.error(glow::INVALID_OPERATION),
            },
        }
    }

    unsafe fn get_active_attributes(&self, program: NativeProgram) -> u32 {
        self.state
            .borrow()
            .programs
            .get(&program.0.get())
            .map(|p| p.attributes.len() as u32)
            .unwrap_or(0)
    }

    unsafe fn get_active_attribute(
        &self,
        program: NativeProgram,
        index: u32,
    ) -> Option<ActiveVariable> {
        let st = self.state.borrow();
        st.programs
            .get(&program.0.get())?
            .attributes
            .get(index as usize)
            .map(to_active)
    }

    unsafe fn get_attrib_location(&self, program: NativeProgram, name: &str) -> Option<u32> {
        let st = self.state.borrow();
        let p = st.programs.get(&program.0.get())?;
        find_variable(&p.attributes, name).map(|v| v.location)
    }

    unsafe fn get_active_uniforms(&self, program: NativeProgram) -> u32 {
        self.state
            .borrow()
            .programs
            .get(&program.0.get())
            .map(|p| p.uniforms.len() as u32)
            .unwrap_or(0)
    }

    unsafe fn get_active_uniform(
        &self,
        program: NativeProgram,
        index: u32,
    ) -> Option<ActiveVariable> {
        let st = self.state.borrow();
        st.programs
            .get(&program.0.get())?
            .uniforms
            .get(index as usize)
            .map(to_active)
    }

    unsafe fn get_uniform_location(
        &self,
        program: NativeProgram,
        name: &str,
    ) -> Option<NativeUniformLocation> {
        let st = self.state.borrow();
        let p = st.programs.get(&program.0.get())?;
        find_variable(&p.uniforms, name).map(|v| NativeUniformLocation(v.location))
    }

    unsafe fn create_buffer(&self) -> Result<NativeBuffer, String> {
        let mut st = self.state.borrow_mut();
        let id = st.alloc()?;
        st.buffers.insert(id.get(), None);
        Ok(NativeBuffer(id))
    }

    unsafe fn delete_buffer(&self, buffer: NativeBuffer) {
        let mut st = self.state.borrow_mut();
        let id = buffer.0.get();
        st.buffers.remove(&id);
        if st.array_buffer == Some(id) {
            st.array_buffer = None;
        }
    }

    unsafe fn bind_array_buffer(&self, buffer: Option<NativeBuffer>) {
        let mut st = self.state.borrow_mut();
        match buffer {
            None => st.array_buffer = None,
            Some(b) if st.buffers.contains_key(&b.0.get()) => st.array_buffer = Some(b.0.get()),
            Some(_) => st.error(glow::INVALID_OPERATION),
        }
    }

    unsafe fn array_buffer_data_f32(&self, data: &[f32]) {
        let mut st = self.state.borrow_mut();
        match st.array_buffer {
            Some(id) => {
                st.buffers.insert(id, Some(data.to_vec()));
            }
            None => st.error(glow::INVALID_OPERATION),
        }
    }

    unsafe fn create_vertex_array(&self) -> Result<NativeVertexArray, String> {
        let mut st = self.state.borrow_mut();
        let id = st.alloc()?;
        st.vertex_arrays.insert(id.get());
        Ok(NativeVertexArray(id))
    }

    unsafe fn delete_vertex_array(&self, vertex_array: NativeVertexArray) {
        let mut st = self.state.borrow_mut();
        let id = vertex_array.0.get();
        st.vertex_arrays.remove(&id);
        st.pointers.retain(|&(vao, _), _| vao != id);
        st.enabled.retain(|&(vao, _)| vao != id);
        if st.vertex_array == Some(id) {
            st.vertex_array = None;
        }
    }

    unsafe fn bind_vertex_array(&self, vertex_array: Option<NativeVertexArray>) {
        let mut st = self.state.borrow_mut();
        match vertex_array {
            None => st.vertex_array = None,
            Some(v) if st.vertex_arrays.contains(&v.0.get()) => st.vertex_array = Some(v.0.get()),
            Some(_) => st.error(glow::INVALID_OPERATION),
        }
    }

    unsafe fn vertex_attrib_pointer_f32(&self, location: u32, components: i32) {
        let mut st = self.state.borrow_mut();
        let Some(buffer) = st.array_buffer else {
            st.error(glow::INVALID_OPERATION);
            return;
        };
        if !(1..=4).contains(&components) {
            st.error(glow::INVALID_VALUE);
            return;
        }
        let key = (st.vao_key(), location);
        st.pointers.insert(key, (buffer, components));
    }

    unsafe fn enable_vertex_attrib_array(&self, location: u32) {
        let mut st = self.state.borrow_mut();
        let key = (st.vao_key(), location);
        st.enabled.insert(key);
    }

    unsafe fn uniform_1_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        self.state
            .borrow_mut()
            .write_floats(location, &[glow::FLOAT], v)
    }

    unsafe fn uniform_2_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        self.state
            .borrow_mut()
            .write_floats(location, &[glow::FLOAT_VEC2], v)
    }

    unsafe fn uniform_3_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        self.state
            .borrow_mut()
            .write_floats(location, &[glow::FLOAT_VEC3], v)
    }

    unsafe fn uniform_4_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        self.state
            .borrow_mut()
            .write_floats(location, &[glow::FLOAT_VEC4], v)
    }

    unsafe fn uniform_matrix_3_f32_slice(
        &self,
        location: &NativeUniformLocation,
        _transpose: bool,
        v: &[f32],
    ) {
        self.state
            .borrow_mut()
            .write_floats(location, &[glow::FLOAT_MAT3], v)
    }

    unsafe fn uniform_matrix_4_f32_slice(
        &self,
        location: &NativeUniformLocation,
        _transpose: bool,
        v: &[f32],
    ) {
        self.state
            .borrow_mut()
            .write_floats(location, &[glow::FLOAT_MAT4], v)
    }

    unsafe fn uniform_1_i32(&self, location: &NativeUniformLocation, x: i32) {
        let mut st = self.state.borrow_mut();
        let Some(program) = st.current_mut() else {
            st.error(glow::INVALID_OPERATION);
            return;
        };
        let accepted = program.uniforms.iter().any(|u| {
            u.location == location.0
                && (is_sampler_type(u.decl.gl_type)
                    || matches!(u.decl.gl_type, glow::INT | glow::BOOL))
        });
        if accepted {
            program.ints.insert(location.0, x);
        } else {
            st.error(glow::INVALID_OPERATION);
        }
    }

    unsafe fn get_uniform_f32(
        &self,
        program: NativeProgram,
        location: &NativeUniformLocation,
        v: &mut [f32],
    ) {
        let st = self.state.borrow();
        let Some(p) = st.programs.get(&program.0.get()) else {
            return;
        };
        if let Some(values) = p.floats.get(&location.0) {
            let n = values.len().min(v.len());
            v[..n].copy_from_slice(&values[..n]);
        } else if let Some(&i) = p.ints.get(&location.0) {
            if let Some(first) = v.first_mut() {
                *first = i as f32;
            }
        }
    }

    unsafe fn create_texture(&self) -> Result<NativeTexture, String> {
        let mut st = self.state.borrow_mut();
        let id = st.alloc()?;
        st.textures.insert(id.get(), FakeTexture::default());
        Ok(NativeTexture(id))
    }

    unsafe fn delete_texture(&self, texture: NativeTexture) {
        let mut st = self.state.borrow_mut();
        let id = texture.0.get();
        st.textures.remove(&id);
        st.bindings.retain(|_, &mut t| t != id);
    }

    unsafe fn active_texture(&self, unit: u32) {
        let mut st = self.state.borrow_mut();
        match unit.checked_sub(glow::TEXTURE0) {
            Some(n) if n < TEXTURE_UNITS => st.active_unit = n,
            _ => st.error(glow::INVALID_ENUM),
        }
    }

    unsafe fn bind_texture(&self, target: u32, texture: Option<NativeTexture>) {
        let mut st = self.state.borrow_mut();
        if target != glow::TEXTURE_2D && target != TEXTURE_EXTERNAL_OES {
            st.error(glow::INVALID_ENUM);
            return;
        }
        let key = (st.active_unit, target);
        match texture {
            None => {
                st.bindings.remove(&key);
            }
            Some(t) if st.textures.contains_key(&t.0.get()) => {
                st.bindings.insert(key, t.0.get());
            }
            Some(_) => st.error(glow::INVALID_OPERATION),
        }
    }

    unsafe fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        let mut st = self.state.borrow_mut();
        match st.bound_texture_mut(target) {
            Some(t) => {
                t.params.insert(parameter, value);
            }
            None => st.error(glow::INVALID_OPERATION),
        }
    }

    unsafe fn tex_image_2d_rgba(&self, target: u32, width: i32, height: i32, pixels: Option<&[u8]>) {
        let mut st = self.state.borrow_mut();
        if width <= 0 || height <= 0 {
            st.error(glow::INVALID_VALUE);
            return;
        }
        if pixels.is_some_and(|p| p.len() != (width * height * 4) as usize) {
            st.error(glow::INVALID_VALUE);
            return;
        }
        match st.bound_texture_mut(target) {
            Some(t) => {
                t.size = Some((width, height));
                if pixels.is_some() {
                    t.uploads += 1;
                }
            }
            None => st.error(glow::INVALID_OPERATION),
        }
    }

    unsafe fn tex_sub_image_2d_rgba(&self, target: u32, width: i32, height: i32, pixels: &[u8]) {
        let mut st = self.state.borrow_mut();
        let expected = (width.max(0) * height.max(0) * 4) as usize;
        match st.bound_texture_mut(target) {
            Some(t) if t.size == Some((width, height)) && pixels.len() == expected => {
                t.uploads += 1;
            }
            Some(_) => st.error(glow::INVALID_VALUE),
            None => st.error(glow::INVALID_OPERATION),
        }
    }

    unsafe fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.state.borrow_mut().viewport = (x, y, width, height);
    }

    unsafe fn clear_color(&self, _red: f32, _green: f32, _blue: f32, _alpha: f32) {}

    unsafe fn clear(&self, _mask: u32) {
        self.state.borrow_mut().clears += 1;
    }

    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        let mut st = self.state.borrow_mut();
        if st.current_program.is_none() {
            st.error(glow::INVALID_OPERATION);
            return;
        }
        st.draws.push((mode, first, count));
    }

    unsafe fn get_error(&self) -> u32 {
        self.state
            .borrow_mut()
            .errors
            .pop_front()
            .unwrap_or(glow::NO_ERROR)
    }

    unsafe fn get_parameter_i32(&self, parameter: u32) -> i32 {
        let st = self.state.borrow();
        let id = match parameter {
            glow::CURRENT_PROGRAM => st.current_program,
            glow::ARRAY_BUFFER_BINDING => st.array_buffer,
            glow::VERTEX_ARRAY_BINDING => st.vertex_array,
            glow::TEXTURE_BINDING_2D => st.bindings.get(&(st.active_unit, glow::TEXTURE_2D)).copied(),
            TEXTURE_BINDING_EXTERNAL_OES => st
                .bindings
                .get(&(st.active_unit, TEXTURE_EXTERNAL_OES))
                .copied(),
            glow::ACTIVE_TEXTURE => Some(glow::TEXTURE0 + st.active_unit),
            glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS => Some(TEXTURE_UNITS),
            _ => None,
        };
        id.unwrap_or(0) as i32
    }
}

// -------------------------------------------------------------------------------------------------
// Frame producer
// -------------------------------------------------------------------------------------------------

/// A `FrameProducer` that hands out queued frames in order.
#[derive(Debug)]
pub struct ScriptedProducer {
    size: (u32, u32),
    frames: VecDeque<VideoFrame>,
    transform: [f32; 16],
    position: f32,
    seq: u64,
}

impl ScriptedProducer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            frames: VecDeque::new(),
            transform: IDENTITY_TRANSFORM,
            position: 0.0,
            seq: 0,
        }
    }

    pub fn push_frame(&mut self, frame: VideoFrame) {
        self.frames.push_back(frame);
    }

    /// Queue a frame filled with one RGBA colour.
    pub fn push_solid_frame(&mut self, width: u32, height: u32, rgba: [u8; 4]) {
        self.seq += 1;
        let bytes = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        self.frames.push_back(VideoFrame {
            width,
            height,
            bytes,
            seq: self.seq,
        });
    }

    pub fn set_transform(&mut self, transform: [f32; 16]) {
        self.transform = transform;
    }

    pub fn set_position(&mut self, secs: f32) {
        self.position = secs;
    }
}

impl FrameProducer for ScriptedProducer {
    fn take_frame(&mut self) -> Option<VideoFrame> {
        self.frames.pop_front()
    }

    fn position_secs(&self) -> f32 {
        self.position
    }

    fn sample_transform(&self) -> [f32; 16] {
        self.transform
    }

    fn frame_size(&self) -> (u32, u32) {
        self.size
    }
}

//! The GL surface the runtime depends on.
//!
//! `Gl` is the narrow slice of OpenGL (ES) that shader programs and the compositor actually
//! issue. It is implemented for `glow::Context`; `testing::FakeGl` implements it for tests.
//! Method names and argument order follow `glow::HasContext` so call sites read the same.

use glow::{
    HasContext, NativeBuffer, NativeProgram, NativeShader, NativeTexture, NativeUniformLocation,
    NativeVertexArray,
};

/// `GL_TEXTURE_EXTERNAL_OES` (OES_EGL_image_external).
pub const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;
/// `GL_SAMPLER_EXTERNAL_OES`.
pub const SAMPLER_EXTERNAL_OES: u32 = 0x8D66;
/// `GL_TEXTURE_BINDING_EXTERNAL_OES`.
pub const TEXTURE_BINDING_EXTERNAL_OES: u32 = 0x8D67;
/// `GL_SAMPLER_EXTERNAL_2D_Y2Y_EXT` (EXT_YUV_target).
pub const SAMPLER_EXTERNAL_2D_Y2Y_EXT: u32 = 0x8BE7;

/// One entry of `glGetActiveAttrib` / `glGetActiveUniform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVariable {
    pub name: String,
    /// GL type enum (`GL_FLOAT_VEC4`, `GL_SAMPLER_2D`, ...).
    pub gl_type: u32,
    /// Array length (1 for non-arrays).
    pub size: i32,
}

#[allow(clippy::missing_safety_doc)]
pub trait Gl {
    // ---- shaders / programs ----
    unsafe fn create_shader(&self, shader_type: u32) -> Result<NativeShader, String>;
    unsafe fn shader_source(&self, shader: NativeShader, source: &str);
    unsafe fn compile_shader(&self, shader: NativeShader);
    unsafe fn get_shader_compile_status(&self, shader: NativeShader) -> bool;
    unsafe fn get_shader_info_log(&self, shader: NativeShader) -> String;
    unsafe fn delete_shader(&self, shader: NativeShader);

    unsafe fn create_program(&self) -> Result<NativeProgram, String>;
    unsafe fn attach_shader(&self, program: NativeProgram, shader: NativeShader);
    unsafe fn detach_shader(&self, program: NativeProgram, shader: NativeShader);
    unsafe fn link_program(&self, program: NativeProgram);
    unsafe fn get_program_link_status(&self, program: NativeProgram) -> bool;
    unsafe fn get_program_info_log(&self, program: NativeProgram) -> String;
    unsafe fn delete_program(&self, program: NativeProgram);
    unsafe fn use_program(&self, program: Option<NativeProgram>);

    // ---- introspection ----
    unsafe fn get_active_attributes(&self, program: NativeProgram) -> u32;
    unsafe fn get_active_attribute(
        &self,
        program: NativeProgram,
        index: u32,
    ) -> Option<ActiveVariable>;
    unsafe fn get_attrib_location(&self, program: NativeProgram, name: &str) -> Option<u32>;
    unsafe fn get_active_uniforms(&self, program: NativeProgram) -> u32;
    unsafe fn get_active_uniform(&self, program: NativeProgram, index: u32)
        -> Option<ActiveVariable>;
    unsafe fn get_uniform_location(
        &self,
        program: NativeProgram,
        name: &str,
    ) -> Option<NativeUniformLocation>;

    // ---- vertex input ----
    unsafe fn create_buffer(&self) -> Result<NativeBuffer, String>;
    unsafe fn delete_buffer(&self, buffer: NativeBuffer);
    unsafe fn bind_array_buffer(&self, buffer: Option<NativeBuffer>);
    /// `glBufferData(GL_ARRAY_BUFFER, data, GL_STATIC_DRAW)` on the bound array buffer.
    unsafe fn array_buffer_data_f32(&self, data: &[f32]);
    unsafe fn create_vertex_array(&self) -> Result<NativeVertexArray, String>;
    unsafe fn delete_vertex_array(&self, vertex_array: NativeVertexArray);
    unsafe fn bind_vertex_array(&self, vertex_array: Option<NativeVertexArray>);
    /// Tightly packed, non-normalized `GL_FLOAT` data at offset 0 of the bound array buffer.
    unsafe fn vertex_attrib_pointer_f32(&self, location: u32, components: i32);
    unsafe fn enable_vertex_attrib_array(&self, location: u32);

    // ---- uniforms ----
    unsafe fn uniform_1_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]);
    unsafe fn uniform_2_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]);
    unsafe fn uniform_3_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]);
    unsafe fn uniform_4_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]);
    unsafe fn uniform_matrix_3_f32_slice(
        &self,
        location: &NativeUniformLocation,
        transpose: bool,
        v: &[f32],
    );
    unsafe fn uniform_matrix_4_f32_slice(
        &self,
        location: &NativeUniformLocation,
        transpose: bool,
        v: &[f32],
    );
    unsafe fn uniform_1_i32(&self, location: &NativeUniformLocation, x: i32);
    unsafe fn get_uniform_f32(
        &self,
        program: NativeProgram,
        location: &NativeUniformLocation,
        v: &mut [f32],
    );

    // ---- textures ----
    unsafe fn create_texture(&self) -> Result<NativeTexture, String>;
    unsafe fn delete_texture(&self, texture: NativeTexture);
    /// `unit` is the full enum (`GL_TEXTURE0 + n`), as in `glActiveTexture`.
    unsafe fn active_texture(&self, unit: u32);
    unsafe fn bind_texture(&self, target: u32, texture: Option<NativeTexture>);
    unsafe fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    /// Allocate RGBA8 storage for the bound texture, optionally with initial pixels.
    unsafe fn tex_image_2d_rgba(&self, target: u32, width: i32, height: i32, pixels: Option<&[u8]>);
    /// Replace the whole RGBA8 image of the bound texture.
    unsafe fn tex_sub_image_2d_rgba(&self, target: u32, width: i32, height: i32, pixels: &[u8]);

    // ---- frame ----
    unsafe fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    unsafe fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    unsafe fn clear(&self, mask: u32);
    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    // ---- state ----
    unsafe fn get_error(&self) -> u32;
    unsafe fn get_parameter_i32(&self, parameter: u32) -> i32;
}

impl Gl for glow::Context {
    unsafe fn create_shader(&self, shader_type: u32) -> Result<NativeShader, String> {
        HasContext::create_shader(self, shader_type)
    }
    unsafe fn shader_source(&self, shader: NativeShader, source: &str) {
        HasContext::shader_source(self, shader, source)
    }
    unsafe fn compile_shader(&self, shader: NativeShader) {
        HasContext::compile_shader(self, shader)
    }
    unsafe fn get_shader_compile_status(&self, shader: NativeShader) -> bool {
        HasContext::get_shader_compile_status(self, shader)
    }
    unsafe fn get_shader_info_log(&self, shader: NativeShader) -> String {
        HasContext::get_shader_info_log(self, shader)
    }
    unsafe fn delete_shader(&self, shader: NativeShader) {
        HasContext::delete_shader(self, shader)
    }

    unsafe fn create_program(&self) -> Result<NativeProgram, String> {
        HasContext::create_program(self)
    }
    unsafe fn attach_shader(&self, program: NativeProgram, shader: NativeShader) {
        HasContext::attach_shader(self, program, shader)
    }
    unsafe fn detach_shader(&self, program: NativeProgram, shader: NativeShader) {
        HasContext::detach_shader(self, program, shader)
    }
    unsafe fn link_program(&self, program: NativeProgram) {
        HasContext::link_program(self, program)
    }
    unsafe fn get_program_link_status(&self, program: NativeProgram) -> bool {
        HasContext::get_program_link_status(self, program)
    }
    unsafe fn get_program_info_log(&self, program: NativeProgram) -> String {
        HasContext::get_program_info_log(self, program)
    }
    unsafe fn delete_program(&self, program: NativeProgram) {
        HasContext::delete_program(self, program)
    }
    unsafe fn use_program(&self, program: Option<NativeProgram>) {
        HasContext::use_program(self, program)
    }

    unsafe fn get_active_attributes(&self, program: NativeProgram) -> u32 {
        HasContext::get_active_attributes(self, program)
    }
    unsafe fn get_active_attribute(
        &self,
        program: NativeProgram,
        index: u32,
    ) -> Option<ActiveVariable> {
        HasContext::get_active_attribute(self, program, index).map(|a| ActiveVariable {
            name: a.name,
            gl_type: a.atype,
            size: a.size,
        })
    }
    unsafe fn get_attrib_location(&self, program: NativeProgram, name: &str) -> Option<u32> {
        HasContext::get_attrib_location(self, program, name)
    }
    unsafe fn get_active_uniforms(&self, program: NativeProgram) -> u32 {
        HasContext::get_active_uniforms(self, program)
    }
    unsafe fn get_active_uniform(
        &self,
        program: NativeProgram,
        index: u32,
    ) -> Option<ActiveVariable> {
        HasContext::get_active_uniform(self, program, index).map(|u| ActiveVariable {
            name: u.name,
            gl_type: u.utype,
            size: u.size,
        })
    }
    unsafe fn get_uniform_location(
        &self,
        program: NativeProgram,
        name: &str,
    ) -> Option<NativeUniformLocation> {
        HasContext::get_uniform_location(self, program, name)
    }

    unsafe fn create_buffer(&self) -> Result<NativeBuffer, String> {
        HasContext::create_buffer(self)
    }
    unsafe fn delete_buffer(&self, buffer: NativeBuffer) {
        HasContext::delete_buffer(self, buffer)
    }
    unsafe fn bind_array_buffer(&self, buffer: Option<NativeBuffer>) {
        HasContext::bind_buffer(self, glow::ARRAY_BUFFER, buffer)
    }
    unsafe fn array_buffer_data_f32(&self, data: &[f32]) {
        HasContext::buffer_data_u8_slice(
            self,
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(data),
            glow::STATIC_DRAW,
        )
    }
    unsafe fn create_vertex_array(&self) -> Result<NativeVertexArray, String> {
        HasContext::create_vertex_array(self)
    }
    unsafe fn delete_vertex_array(&self, vertex_array: NativeVertexArray) {
        HasContext::delete_vertex_array(self, vertex_array)
    }
    unsafe fn bind_vertex_array(&self, vertex_array: Option<NativeVertexArray>) {
        HasContext::bind_vertex_array(self, vertex_array)
    }
    unsafe fn vertex_attrib_pointer_f32(&self, location: u32, components: i32) {
        HasContext::vertex_attrib_pointer_f32(self, location, components, glow::FLOAT, false, 0, 0)
    }
    unsafe fn enable_vertex_attrib_array(&self, location: u32) {
        HasContext::enable_vertex_attrib_array(self, location)
    }

    unsafe fn uniform_1_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        HasContext::uniform_1_f32_slice(self, Some(location), v)
    }
    unsafe fn uniform_2_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        HasContext::uniform_2_f32_slice(self, Some(location), v)
    }
    unsafe fn uniform_3_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        HasContext::uniform_3_f32_slice(self, Some(location), v)
    }
    unsafe fn uniform_4_f32_slice(&self, location: &NativeUniformLocation, v: &[f32]) {
        HasContext::uniform_4_f32_slice(self, Some(location), v)
    }
    unsafe fn uniform_matrix_3_f32_slice(
        &self,
        location: &NativeUniformLocation,
        transpose: bool,
        v: &[f32],
    ) {
        HasContext::uniform_matrix_3_f32_slice(self, Some(location), transpose, v)
    }
    unsafe fn uniform_matrix_4_f32_slice(
        &self,
        location: &NativeUniformLocation,
        transpose: bool,
        v: &[f32],
    ) {
        HasContext::uniform_matrix_4_f32_slice(self, Some(location), transpose, v)
    }
    unsafe fn uniform_1_i32(&self, location: &NativeUniformLocation, x: i32) {
        HasContext::uniform_1_i32(self, Some(location), x)
    }
    unsafe fn get_uniform_f32(
        &self,
        program: NativeProgram,
        location: &NativeUniformLocation,
        v: &mut [f32],
    ) {
        HasContext::get_uniform_f32(self, program, location, v)
    }

    unsafe fn create_texture(&self) -> Result<NativeTexture, String> {
        HasContext::create_texture(self)
    }
    unsafe fn delete_texture(&self, texture: NativeTexture) {
        HasContext::delete_texture(self, texture)
    }
    unsafe fn active_texture(&self, unit: u32) {
        HasContext::active_texture(self, unit)
    }
    unsafe fn bind_texture(&self, target: u32, texture: Option<NativeTexture>) {
        HasContext::bind_texture(self, target, texture)
    }
    unsafe fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        HasContext::tex_parameter_i32(self, target, parameter, value)
    }
    unsafe fn tex_image_2d_rgba(&self, target: u32, width: i32, height: i32, pixels: Option<&[u8]>) {
        HasContext::tex_image_2d(
            self,
            target,
            0,
            glow::RGBA8 as i32,
            width,
            height,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            pixels,
        )
    }
    unsafe fn tex_sub_image_2d_rgba(&self, target: u32, width: i32, height: i32, pixels: &[u8]) {
        HasContext::tex_sub_image_2d(
            self,
            target,
            0,
            0,
            0,
            width,
            height,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(pixels),
        )
    }

    unsafe fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        HasContext::viewport(self, x, y, width, height)
    }
    unsafe fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        HasContext::clear_color(self, red, green, blue, alpha)
    }
    unsafe fn clear(&self, mask: u32) {
        HasContext::clear(self, mask)
    }
    unsafe fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        HasContext::draw_arrays(self, mode, first, count)
    }

    unsafe fn get_error(&self) -> u32 {
        HasContext::get_error(self)
    }
    unsafe fn get_parameter_i32(&self, parameter: u32) -> i32 {
        HasContext::get_parameter_i32(self, parameter)
    }
}

//! Full-screen quad geometry.

use vidcomp_core::EngineError;

use crate::check::check_gl_error;
use crate::gl::Gl;

/// Clip-space corners, `vec3` per vertex, in triangle-strip order.
pub const QUAD_POSITIONS: [f32; 12] = [
    -1.0, -1.0, 0.0, //
    1.0, -1.0, 0.0, //
    -1.0, 1.0, 0.0, //
    1.0, 1.0, 0.0,
];

/// Texture coordinates matching `QUAD_POSITIONS`, `vec2` per vertex.
pub const QUAD_TEX_COORDS: [f32; 8] = [
    0.0, 0.0, //
    1.0, 0.0, //
    0.0, 1.0, //
    1.0, 1.0,
];

pub const QUAD_VERTEX_COUNT: i32 = 4;

/// Column-major 4x4 identity, used as the default MVP matrix.
pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Draw the quad with whatever program and attributes are currently bound.
pub unsafe fn draw_quad<G: Gl + ?Sized>(gl: &G) -> Result<(), EngineError> {
    gl.draw_arrays(glow::TRIANGLE_STRIP, 0, QUAD_VERTEX_COUNT);
    check_gl_error(gl, "glDrawArrays")
}

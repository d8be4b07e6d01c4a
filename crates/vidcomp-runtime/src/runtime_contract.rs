//! Attribute/uniform naming contract between built-in shaders and the compositor.
//!
//! Adding new names is additive; renaming or removing one is breaking for user shaders that
//! override the built-ins.

/// Quad positions, `vec3` per vertex.
pub const A_POSITION: &str = "aPosition";
/// Quad texture coordinates, `vec2` per vertex.
pub const A_TEXTURE_COORD: &str = "aTextureCoord";

/// Model-view-projection matrix (`mat4`).
pub const U_MVP_MATRIX: &str = "uMVPMatrix";
/// Sample-space transform of the video texture (`mat4`), forwarded verbatim from the producer.
pub const U_ST_MATRIX: &str = "uSTMatrix";
/// Sampler used by the passthrough program.
pub const U_TEXTURE: &str = "u_texture";

/// Playback time of the first source, seconds (`float`).
pub const I_TIME: &str = "i_time";
/// Transition progress in [0, 1] (`float`).
pub const I_TRANSITION_PROGRESS: &str = "i_transition_progress";
/// Viewport size in pixels (`vec2`).
pub const I_SIZE: &str = "i_size";

/// Components per vertex of `aPosition`.
pub const POSITION_COMPONENTS: usize = 3;
/// Components per vertex of `aTextureCoord`.
pub const TEXTURE_COORD_COMPONENTS: usize = 2;

/// Effect sampler for the source at `index` (`i_texture_1`, `i_texture_2`, ...).
pub fn sampler_name_for(index: usize) -> String {
    format!("i_texture_{}", index + 1)
}

/// Effect size uniform for the source at `index` (`i_texture_size_1`, ...).
pub fn texture_size_name_for(index: usize) -> String {
    format!("i_texture_size_{}", index + 1)
}

/// Texture unit the source at `index` is bound to.
///
/// Contract: source N always samples from `TEXTURE0 + N`.
pub fn sampler_unit_for(index: usize) -> u32 {
    index as u32
}

/// Returns true if `name` is one of the optional effect uniforms the compositor drives when a
/// program declares it.
pub fn is_optional_effect_uniform(name: &str) -> bool {
    matches!(name, I_TIME | I_TRANSITION_PROGRESS | I_SIZE)
        || name
            .strip_prefix("i_texture_size_")
            .map(|n| n.parse::<usize>().is_ok())
            .unwrap_or(false)
}

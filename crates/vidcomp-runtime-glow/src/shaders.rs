//! Built-in GLSL sources and shader source loading.

use vidcomp_core::{shader_source_or, CompositorConfig, EngineError};
use vidcomp_runtime::EffectKind;

#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub vert: String,
    pub frag: String,
    /// Optional human-friendly origin (path/label) for logs.
    pub origin: Option<String>,
}

impl ShaderSource {
    /// Passthrough program that scales a single video to the viewport.
    pub fn builtin_resize() -> Self {
        Self {
            vert: QUAD_VERT.to_string(),
            frag: RESIZE_FRAG.to_string(),
            origin: Some("builtin:resize".into()),
        }
    }

    pub fn builtin_effect(kind: EffectKind) -> Self {
        Self {
            vert: QUAD_VERT.to_string(),
            frag: builtin_effect_frag(kind).to_string(),
            origin: Some(format!("builtin:{kind}")),
        }
    }

    /// The resize and effect programs described by `cfg`, with file overrides applied.
    pub fn from_config(
        cfg: &CompositorConfig,
        kind: EffectKind,
    ) -> Result<(ShaderSource, ShaderSource), EngineError> {
        let vert = shader_source_or(cfg.vertex_shader.as_deref(), QUAD_VERT)?;
        let resize = ShaderSource {
            vert: vert.clone(),
            frag: shader_source_or(cfg.resize_shader.as_deref(), RESIZE_FRAG)?,
            origin: Some(origin_of(cfg.resize_shader.as_deref(), "resize")),
        };
        let effect = ShaderSource {
            vert,
            frag: shader_source_or(cfg.effect_shader.as_deref(), builtin_effect_frag(kind))?,
            origin: Some(origin_of(cfg.effect_shader.as_deref(), kind.name())),
        };
        Ok((resize, effect))
    }

    pub fn label(&self) -> &str {
        self.origin.as_deref().unwrap_or("<inline>")
    }
}

fn origin_of(path: Option<&std::path::Path>, builtin: &str) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => format!("builtin:{builtin}"),
    }
}

pub fn builtin_effect_frag(kind: EffectKind) -> &'static str {
    match kind {
        EffectKind::Resize => RESIZE_FRAG,
        EffectKind::Glitch => GLITCH_FRAG,
        EffectKind::Fade => FADE_FRAG,
    }
}

pub const QUAD_VERT: &str = r#"#version 330 core
in vec3 aPosition;
in vec2 aTextureCoord;

uniform mat4 uMVPMatrix;
uniform mat4 uSTMatrix;

out vec2 vTextureCoord;

void main() {
    gl_Position = uMVPMatrix * vec4(aPosition, 1.0);
    vTextureCoord = (uSTMatrix * vec4(aTextureCoord, 0.0, 1.0)).xy;
}
"#;

pub const RESIZE_FRAG: &str = r#"#version 330 core
in vec2 vTextureCoord;
out vec4 fragColor;

uniform sampler2D u_texture;

void main() {
    fragColor = texture(u_texture, vTextureCoord);
}
"#;

pub const GLITCH_FRAG: &str = r#"#version 330 core
in vec2 vTextureCoord;
out vec4 fragColor;

uniform sampler2D i_texture_1;
uniform float i_time;
uniform vec2 i_size;

float rand(vec2 co) {
    return fract(sin(dot(co, vec2(12.9898, 78.233))) * 43758.5453);
}

void main() {
    vec2 uv = vTextureCoord;
    float band = floor(uv.y * 24.0);
    float jitter = rand(vec2(band, floor(i_time * 12.0)));
    float shift = step(0.85, jitter) * (jitter - 0.85) * 0.4;
    float px = 1.0 / max(i_size.x, 1.0);

    vec4 base = texture(i_texture_1, vec2(uv.x + shift, uv.y));
    float r = texture(i_texture_1, vec2(uv.x + shift + 6.0 * px * sin(i_time * 3.0), uv.y)).r;
    float b = texture(i_texture_1, vec2(uv.x + shift - 6.0 * px, uv.y)).b;
    fragColor = vec4(r, base.g, b, 1.0);
}
"#;

pub const FADE_FRAG: &str = r#"#version 330 core
in vec2 vTextureCoord;
out vec4 fragColor;

uniform sampler2D i_texture_1;
uniform sampler2D i_texture_2;
uniform float i_transition_progress;

void main() {
    vec4 a = texture(i_texture_1, vTextureCoord);
    vec4 b = texture(i_texture_2, vTextureCoord);
    fragColor = mix(a, b, clamp(i_transition_progress, 0.0, 1.0));
}
"#;

use std::fmt;
use std::path::PathBuf;

/// Shader pipeline stage, used to tag compile failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Which table of a linked program a name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Attribute,
    Uniform,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Attribute => f.write_str("attribute"),
            SlotKind::Uniform => f.write_str("uniform"),
        }
    }
}

/// Engine-level errors used across vidcomp crates.
///
/// Contract rule: this type lives in `vidcomp-core` and is re-exported by runtimes.
/// Construction failures (compile/link/introspection) never leave a usable program behind;
/// binding failures indicate a broken configure/bind ordering on the caller's side.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // ---- Core / config (SDK-level) ----
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json parse error at {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config at {}: {msg}", .path.display())]
    InvalidConfig { path: PathBuf, msg: String },

    // ---- Shader program construction ----
    #[error("{stage} shader compile error: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("program link error: {0}")]
    ShaderLink(String),

    #[error("program introspection failed: {0}")]
    Introspection(String),

    #[error("uniform '{name}' has unsupported GL type 0x{gl_type:x}")]
    UnsupportedUniformType { name: String, gl_type: u32 },

    // ---- Configure / bind ----
    #[error("unknown {kind} '{name}'")]
    UnknownSlot { kind: SlotKind, name: String },

    #[error("type mismatch on {kind} '{name}': {detail}")]
    TypeMismatch {
        name: String,
        kind: SlotKind,
        detail: String,
    },

    #[error("'{name}' was bound before it was configured")]
    UnsetSlot { name: String },

    #[error("program was used after delete")]
    ProgramDeleted,

    // ---- Backend ----
    #[error("GL error 0x{code:x} ({}) after {op}", error_name(.code))]
    GpuState { op: String, code: u32 },

    #[error("backend object creation failed: {0}")]
    GlCreate(String),

    #[error("at most {max} video sources are supported")]
    TooManySources { max: usize },

    // ---- Fallback ----
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        EngineError::Other(s.into())
    }

    pub fn unknown_attribute(name: &str) -> Self {
        EngineError::UnknownSlot {
            kind: SlotKind::Attribute,
            name: name.to_string(),
        }
    }

    pub fn unknown_uniform(name: &str) -> Self {
        EngineError::UnknownSlot {
            kind: SlotKind::Uniform,
            name: name.to_string(),
        }
    }
}

fn error_name(code: &u32) -> &'static str {
    gl_error_name(*code)
}

/// Human-readable name for a `glGetError` code.
pub fn gl_error_name(code: u32) -> &'static str {
    match code {
        0x0500 => "GL_INVALID_ENUM",
        0x0501 => "GL_INVALID_VALUE",
        0x0502 => "GL_INVALID_OPERATION",
        0x0503 => "GL_STACK_OVERFLOW",
        0x0504 => "GL_STACK_UNDERFLOW",
        0x0505 => "GL_OUT_OF_MEMORY",
        0x0506 => "GL_INVALID_FRAMEBUFFER_OPERATION",
        _ => "unknown GL error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_the_stage() {
        let e = EngineError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "0:3: syntax error".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("fragment shader compile error"), "{msg}");
        assert!(msg.contains("syntax error"));
    }

    #[test]
    fn gpu_state_error_decodes_code() {
        let e = EngineError::GpuState {
            op: "glUniform1i".into(),
            code: 0x0502,
        };
        assert!(e.to_string().contains("GL_INVALID_OPERATION"));
    }

    #[test]
    fn unknown_slot_mentions_kind_and_name() {
        let e = EngineError::unknown_uniform("nonexistent");
        assert_eq!(e.to_string(), "unknown uniform 'nonexistent'");
    }
}

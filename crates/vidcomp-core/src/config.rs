//! JSON configuration helpers.
//!
//! Everything the host reads from disk goes through `load_typed_json`, so IO and parse failures
//! always come back as `EngineError::Io` / `EngineError::Json` tagged with the offending path.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::EngineError;

/// Read and deserialize a JSON file into `T`.
pub fn load_typed_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, EngineError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_typed_json(path, &text)
}

/// Deserialize already-loaded JSON text; `path` is only used for error reporting.
pub fn parse_typed_json<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T, EngineError> {
    serde_json::from_str(text).map_err(|source| EngineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Compositor settings.
///
/// Shader paths are optional overrides; when absent the runtime's built-in sources are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositorConfig {
    /// Effect program name (`resize`, `glitch`, `fade`).
    #[serde(default = "default_effect")]
    pub effect: String,

    /// Start with the effect program selected (otherwise the passthrough program is used).
    #[serde(default = "default_apply_effect")]
    pub apply_effect: bool,

    /// Duration of the 0 → 1 transition progress ramp, in seconds.
    #[serde(default = "default_transition_secs")]
    pub transition_secs: f32,

    /// Window width (pixels).
    #[serde(default = "default_width")]
    pub width: u32,

    /// Window height (pixels).
    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub vertex_shader: Option<PathBuf>,

    #[serde(default)]
    pub resize_shader: Option<PathBuf>,

    #[serde(default)]
    pub effect_shader: Option<PathBuf>,
}

fn default_effect() -> String {
    "fade".to_string()
}
fn default_apply_effect() -> bool {
    true
}
fn default_transition_secs() -> f32 {
    3.0
}
fn default_width() -> u32 {
    960
}
fn default_height() -> u32 {
    540
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            effect: default_effect(),
            apply_effect: default_apply_effect(),
            transition_secs: default_transition_secs(),
            width: default_width(),
            height: default_height(),
            vertex_shader: None,
            resize_shader: None,
            effect_shader: None,
        }
    }
}

impl CompositorConfig {
    /// Semantic checks that serde cannot express. `path` is only used for error reporting.
    pub fn validate(&self, path: &Path) -> Result<(), EngineError> {
        let invalid = |msg: &str| EngineError::InvalidConfig {
            path: path.to_path_buf(),
            msg: msg.to_string(),
        };

        if self.effect.trim().is_empty() {
            return Err(invalid("effect is empty"));
        }
        if !self.transition_secs.is_finite() || self.transition_secs < 0.0 {
            return Err(invalid("transition_secs must be a finite value >= 0"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid("width/height must be > 0"));
        }
        Ok(())
    }
}

/// Read an optional shader override, falling back to the built-in source.
pub fn shader_source_or(path: Option<&Path>, builtin: &str) -> Result<String, EngineError> {
    match path {
        Some(p) => std::fs::read_to_string(p).map_err(|source| EngineError::Io {
            path: p.to_path_buf(),
            source,
        }),
        None => Ok(builtin.to_string()),
    }
}

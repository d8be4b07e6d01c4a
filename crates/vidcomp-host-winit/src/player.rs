//! Player configuration: one compositor plus the videos it plays.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vidcomp_core::{load_typed_json, CompositorConfig, EngineError};
use vidcomp_input_video::VideoConfig;
use vidcomp_runtime::{parse_effect, MAX_SOURCES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub compositor: CompositorConfig,

    /// Videos in source order; the first one drives `i_time` and `uSTMatrix`.
    pub videos: Vec<VideoConfig>,
}

impl PlayerConfig {
    /// Load, resolve relative paths against the file's directory, and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let mut cfg: PlayerConfig = load_typed_json(path)?;
        if let Some(base) = path.parent() {
            cfg.resolve_relative_to(base);
        }
        cfg.validate(path)?;
        Ok(cfg)
    }

    pub fn validate(&self, path: &Path) -> Result<(), EngineError> {
        let invalid = |msg: String| EngineError::InvalidConfig {
            path: path.to_path_buf(),
            msg,
        };

        self.compositor.validate(path)?;
        parse_effect(&self.compositor.effect).map_err(|e| invalid(e.to_string()))?;

        if self.videos.is_empty() || self.videos.len() > MAX_SOURCES {
            return Err(invalid(format!(
                "videos must list 1..={MAX_SOURCES} entries (found {})",
                self.videos.len()
            )));
        }
        for (i, video) in self.videos.iter().enumerate() {
            video
                .validate()
                .map_err(|e| invalid(format!("videos[{i}]: {e}")))?;
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for video in &mut self.videos {
            let file = Path::new(&video.file);
            if file.is_relative() && !video.file.trim().is_empty() {
                video.file = base.join(file).to_string_lossy().into_owned();
            }
        }
        for shader in [
            &mut self.compositor.vertex_shader,
            &mut self.compositor.resize_shader,
            &mut self.compositor.effect_shader,
        ] {
            if let Some(p) = shader.as_mut().filter(|p| p.is_relative()) {
                *p = base.join(&*p);
            }
        }
    }

    /// Shader override paths that are set, for logging.
    pub fn shader_overrides(&self) -> Vec<&PathBuf> {
        [
            &self.compositor.vertex_shader,
            &self.compositor.resize_shader,
            &self.compositor.effect_shader,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#![forbid(unsafe_code)]

//! Backend-agnostic runtime "standard library".
//!
//! This crate defines the effect vocabulary, the attribute/uniform naming contract shared by
//! built-in shaders and the compositor, and the transition progress ramp. Backends decide how to
//! realize these; nothing here touches GL.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod runtime_contract;
pub mod transition;

pub use transition::TransitionRamp;
pub use vidcomp_core::EngineError;

/// Upper bound on concurrently composited video sources.
pub const MAX_SOURCES: usize = 2;

// -------------------------------------------------------------------------------------------------
// Effects
// -------------------------------------------------------------------------------------------------

/// Fragment-shader effects the compositor can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EffectKind {
    /// Passthrough of a single video, scaled to the viewport.
    Resize,
    /// Time-driven glitch over a single video (`i_time`).
    Glitch,
    /// Cross-fade between two videos driven by `i_transition_progress`.
    Fade,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [EffectKind::Resize, EffectKind::Glitch, EffectKind::Fade];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Resize => "resize",
            EffectKind::Glitch => "glitch",
            EffectKind::Fade => "fade",
        }
    }

    /// How many video textures the effect samples.
    pub fn max_sources(self) -> usize {
        match self {
            EffectKind::Fade => 2,
            EffectKind::Resize | EffectKind::Glitch => 1,
        }
    }

    pub fn uses_time(self) -> bool {
        matches!(self, EffectKind::Glitch)
    }

    pub fn uses_transition(self) -> bool {
        matches!(self, EffectKind::Fade)
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert user-facing strings to a known effect.
///
/// Accepts common aliases: `passthrough`, `crossfade`, `transition`, any case.
pub fn effect_from_str(s: &str) -> Option<EffectKind> {
    match s.trim().to_ascii_lowercase().as_str() {
        "resize" | "passthrough" => Some(EffectKind::Resize),
        "glitch" => Some(EffectKind::Glitch),
        "fade" | "crossfade" | "transition" => Some(EffectKind::Fade),
        _ => None,
    }
}

/// Like `effect_from_str`, but reports the unknown name as an error.
pub fn parse_effect(s: &str) -> Result<EffectKind, EngineError> {
    effect_from_str(s).ok_or_else(|| EngineError::other(format!("unknown effect '{s}'")))
}

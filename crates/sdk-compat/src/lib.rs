//! Compile-only compatibility crate.
//!
//! This crate exists to ensure the public SDK surface remains usable by third-party
//! consumers. It is not shipped or run; it must only build.

use std::time::Instant;

use vidcomp_core::{CompositorConfig, EngineError};
use vidcomp_input_video::{frame_signal, VideoConfig, IDENTITY_TRANSFORM};
use vidcomp_runtime::runtime_contract::{sampler_name_for, sampler_unit_for};
use vidcomp_runtime::{effect_from_str, parse_effect, EffectKind, TransitionRamp, MAX_SOURCES};

#[allow(dead_code)]
pub fn _compile_witness() -> Result<(), EngineError> {
    // Config models stay constructible and validatable without a GL context.
    let cfg = CompositorConfig::default();
    cfg.validate(std::path::Path::new("compat.json"))?;

    // Effect names resolve through the backend-agnostic vocabulary.
    let kind = parse_effect(&cfg.effect)?;
    let _ = (kind.max_sources(), effect_from_str("fade"), EffectKind::ALL);

    // The sampler naming contract covers every source slot.
    for i in 0..MAX_SOURCES {
        let _ = (sampler_name_for(i), sampler_unit_for(i));
    }

    let mut ramp = TransitionRamp::from_secs(cfg.transition_secs);
    ramp.start(Instant::now());
    let _progress = ramp.tick(Instant::now());

    let (signal, waiter) = frame_signal();
    signal.notify();
    let _ = waiter.take_pending();

    // Explicit construction: every field is part of the public surface.
    let video = VideoConfig {
        width: 640,
        height: 360,
        fps: 30,
        file: "clip.mp4".to_string(),
        r#loop: true,
        ffmpeg_path: None,
        sample_transform: IDENTITY_TRANSFORM,
    };
    let _ = video.validate();
    Ok(())
}

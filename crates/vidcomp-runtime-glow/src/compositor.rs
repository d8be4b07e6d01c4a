//! Video compositor: latches decoded frames and draws them through either the passthrough
//! program or the selected effect program.

use std::time::Instant;

use glow::NativeTexture;
use vidcomp_core::{CompositorConfig, EngineError};
use vidcomp_input_video::{frame_signal, FrameProducer, FrameSignal, FrameWaiter};
use vidcomp_runtime::runtime_contract::{
    sampler_name_for, sampler_unit_for, texture_size_name_for, A_POSITION, A_TEXTURE_COORD,
    I_SIZE, I_TIME, I_TRANSITION_PROGRESS, POSITION_COMPONENTS, TEXTURE_COORD_COMPONENTS,
    U_MVP_MATRIX, U_ST_MATRIX, U_TEXTURE,
};
use vidcomp_runtime::{parse_effect, EffectKind, TransitionRamp, MAX_SOURCES};

use crate::gl::Gl;
use crate::program::ShaderProgram;
use crate::quad::{draw_quad, IDENTITY_MATRIX, QUAD_POSITIONS, QUAD_TEX_COORDS};
use crate::shaders::ShaderSource;
use crate::source::VideoSource;

/// What a call to `render_frame` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Sources that uploaded a new frame this call.
    pub frames_latched: usize,
    /// False when there was nothing to draw.
    pub drew: bool,
    pub used_effect: bool,
    pub transition_progress: f32,
}

/// Per-frame values shared by both programs.
struct FrameInputs<'a> {
    textures: &'a [NativeTexture],
    st_matrix: [f32; 16],
    time: f32,
    progress: f32,
    size: [f32; 2],
}

#[derive(Debug)]
pub struct Compositor {
    resize: ShaderProgram,
    effect: ShaderProgram,
    effect_kind: EffectKind,
    sources: Vec<VideoSource>,
    apply_effect: bool,
    ramp: TransitionRamp,
    w: i32,
    h: i32,
    signal: FrameSignal,
    waiter: FrameWaiter,
}

impl Compositor {
    /// Build both programs. If the effect program fails, the resize program is released before
    /// the error is returned.
    pub unsafe fn new<G: Gl + ?Sized>(
        gl: &G,
        resize: &ShaderSource,
        effect: &ShaderSource,
        effect_kind: EffectKind,
        transition: TransitionRamp,
    ) -> Result<Self, EngineError> {
        let mut resize_program = ShaderProgram::new(gl, &resize.vert, &resize.frag).map_err(|e| {
            tracing::error!(origin = resize.label(), error = %e, "resize program failed");
            e
        })?;
        let effect_program = match ShaderProgram::new(gl, &effect.vert, &effect.frag) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(origin = effect.label(), error = %e, "effect program failed");
                resize_program.delete(gl);
                return Err(e);
            }
        };

        let (signal, waiter) = frame_signal();
        tracing::debug!(effect = %effect_kind, "compositor ready");

        Ok(Self {
            resize: resize_program,
            effect: effect_program,
            effect_kind,
            sources: Vec::new(),
            apply_effect: true,
            ramp: transition,
            w: 1,
            h: 1,
            signal,
            waiter,
        })
    }

    /// Build a compositor from its JSON config, loading any shader overrides from disk.
    pub unsafe fn from_config<G: Gl + ?Sized>(
        gl: &G,
        cfg: &CompositorConfig,
    ) -> Result<Self, EngineError> {
        let kind = parse_effect(&cfg.effect)?;
        let (resize, effect) = ShaderSource::from_config(cfg, kind)?;
        let mut compositor = Self::new(
            gl,
            &resize,
            &effect,
            kind,
            TransitionRamp::from_secs(cfg.transition_secs),
        )?;
        compositor.apply_effect = cfg.apply_effect;
        compositor.resize(gl, cfg.width as i32, cfg.height as i32);
        Ok(compositor)
    }

    pub fn effect_kind(&self) -> EffectKind {
        self.effect_kind
    }

    pub fn resize_program(&self) -> &ShaderProgram {
        &self.resize
    }

    pub fn effect_program(&self) -> &ShaderProgram {
        &self.effect
    }

    // ---- sources ----

    /// Attach a frame producer. Source N samples from texture unit N.
    pub unsafe fn add_source<G: Gl + ?Sized>(
        &mut self,
        gl: &G,
        producer: Box<dyn FrameProducer + Send>,
    ) -> Result<usize, EngineError> {
        if self.sources.len() >= MAX_SOURCES {
            return Err(EngineError::TooManySources { max: MAX_SOURCES });
        }
        let source = VideoSource::new(gl, producer)?;
        let index = self.sources.len();
        tracing::info!(index, size = ?source.size(), "video source attached");
        if index + 1 > self.effect_kind.max_sources() {
            tracing::warn!(index, effect = %self.effect_kind, "effect does not sample this source");
        }
        self.sources.push(source);
        Ok(index)
    }

    pub fn sources(&self) -> &[VideoSource] {
        &self.sources
    }

    /// Producer side of the redraw signal; hand clones to decoders.
    pub fn frame_signal(&self) -> FrameSignal {
        self.signal.clone()
    }

    /// Consumer side of the redraw signal, for the render loop.
    pub fn frame_waiter(&self) -> &FrameWaiter {
        &self.waiter
    }

    // ---- view ----

    pub unsafe fn resize<G: Gl + ?Sized>(&mut self, gl: &G, w: i32, h: i32) {
        self.w = w.max(1);
        self.h = h.max(1);
        gl.viewport(0, 0, self.w, self.h);
        tracing::info!(w = self.w, h = self.h, "viewport resized");
    }

    pub fn size(&self) -> (i32, i32) {
        (self.w, self.h)
    }

    pub fn apply_effect(&self) -> bool {
        self.apply_effect
    }

    pub fn set_apply_effect(&mut self, on: bool) {
        self.apply_effect = on;
    }

    /// Flip between the effect and passthrough programs; returns the new state.
    pub fn toggle_effect(&mut self) -> bool {
        self.apply_effect = !self.apply_effect;
        tracing::info!(apply_effect = self.apply_effect, "effect toggled");
        self.apply_effect
    }

    // ---- transition ----

    pub fn start_transition(&mut self, now: Instant) {
        self.ramp.start(now);
        tracing::debug!(duration = ?self.ramp.duration(), "transition started");
    }

    pub fn stop_transition(&mut self) {
        self.ramp.stop();
    }

    pub fn transition_progress(&self) -> f32 {
        self.ramp.progress()
    }

    // ---- frame ----

    /// Latch new frames, advance the transition and draw one frame.
    pub unsafe fn render_frame<G: Gl + ?Sized>(
        &mut self,
        gl: &G,
        now: Instant,
    ) -> Result<FrameReport, EngineError> {
        let mut frames_latched = 0;
        for source in &mut self.sources {
            if source.update_tex_image(gl)? {
                frames_latched += 1;
            }
        }
        let progress = self.ramp.tick(now);

        gl.viewport(0, 0, self.w, self.h);
        gl.clear_color(0.0, 0.0, 0.0, 1.0);
        gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

        let mut report = FrameReport {
            frames_latched,
            drew: false,
            used_effect: self.apply_effect,
            transition_progress: progress,
        };
        let Some(first) = self.sources.first() else {
            return Ok(report);
        };

        let textures: Vec<NativeTexture> = self.sources.iter().map(VideoSource::texture).collect();
        let inputs = FrameInputs {
            textures: &textures,
            st_matrix: first.transform(),
            time: first.position_secs(),
            progress,
            size: [self.w as f32, self.h as f32],
        };

        if self.apply_effect {
            self.effect
                .use_and_bind(gl, |p| configure_effect(p, &inputs))?;
        } else {
            self.resize
                .use_and_bind(gl, |p| configure_resize(p, &inputs))?;
        }
        draw_quad(gl)?;

        report.drew = true;
        Ok(report)
    }

    /// Release programs first, then the textures their samplers referenced.
    pub unsafe fn destroy<G: Gl + ?Sized>(&mut self, gl: &G) {
        self.resize.delete(gl);
        self.effect.delete(gl);
        for source in &mut self.sources {
            source.destroy(gl);
        }
        self.sources.clear();
        gl.use_program(None);
        tracing::debug!("compositor destroyed");
    }
}

fn configure_quad(p: &mut ShaderProgram, inputs: &FrameInputs<'_>) -> Result<(), EngineError> {
    p.set_buffer_attribute(A_POSITION, &QUAD_POSITIONS, POSITION_COMPONENTS)?;
    p.set_buffer_attribute(A_TEXTURE_COORD, &QUAD_TEX_COORDS, TEXTURE_COORD_COMPONENTS)?;
    p.set_floats_uniform(U_MVP_MATRIX, &IDENTITY_MATRIX)?;
    p.set_floats_uniform(U_ST_MATRIX, &inputs.st_matrix)
}

fn configure_resize(p: &mut ShaderProgram, inputs: &FrameInputs<'_>) -> Result<(), EngineError> {
    configure_quad(p, inputs)?;
    if let Some(&texture) = inputs.textures.first() {
        p.set_sampler_uniform(U_TEXTURE, texture, sampler_unit_for(0))?;
    }
    Ok(())
}

fn configure_effect(p: &mut ShaderProgram, inputs: &FrameInputs<'_>) -> Result<(), EngineError> {
    configure_quad(p, inputs)?;

    // Declared sampler slots past the last source keep sampling the last source.
    let mut index = 0;
    while p.has_uniform(&sampler_name_for(index)) {
        let texture = inputs.textures[index.min(inputs.textures.len() - 1)];
        p.set_sampler_uniform(&sampler_name_for(index), texture, sampler_unit_for(index))?;
        let size_name = texture_size_name_for(index);
        if p.has_uniform(&size_name) {
            p.set_floats_uniform(&size_name, &inputs.size)?;
        }
        index += 1;
    }

    if p.has_uniform(I_TIME) {
        p.set_float_uniform(I_TIME, inputs.time)?;
    }
    if p.has_uniform(I_TRANSITION_PROGRESS) {
        p.set_float_uniform(I_TRANSITION_PROGRESS, inputs.progress)?;
    }
    if p.has_uniform(I_SIZE) {
        p.set_floats_uniform(I_SIZE, &inputs.size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGl, ScriptedProducer};
    use std::time::Duration;
    use vidcomp_input_video::IDENTITY_TRANSFORM;

    fn compositor(gl: &FakeGl, kind: EffectKind) -> Compositor {
        unsafe {
            Compositor::new(
                gl,
                &ShaderSource::builtin_resize(),
                &ShaderSource::builtin_effect(kind),
                kind,
                TransitionRamp::from_secs(2.0),
            )
        }
        .unwrap()
    }

    fn attach(gl: &FakeGl, c: &mut Compositor, rgba: [u8; 4]) -> usize {
        let mut producer = ScriptedProducer::new(4, 4);
        producer.push_solid_frame(4, 4, rgba);
        unsafe { c.add_source(gl, Box::new(producer)) }.unwrap()
    }

    #[test]
    fn zero_sources_clear_without_drawing() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Fade);
        let report = unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();
        assert!(!report.drew);
        assert!(gl.draw_calls().is_empty());
        assert_eq!(gl.clear_count(), 1);
    }

    #[test]
    fn fade_binds_two_sources_on_units_zero_and_one() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Fade);
        attach(&gl, &mut c, [255, 0, 0, 255]);
        attach(&gl, &mut c, [0, 0, 255, 255]);

        let report = unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();
        assert!(report.drew && report.used_effect);
        assert_eq!(report.frames_latched, 2);

        let t0 = c.sources()[0].texture();
        let t1 = c.sources()[1].texture();
        assert_eq!(gl.bound_texture(0, glow::TEXTURE_2D), Some(t0));
        assert_eq!(gl.bound_texture(1, glow::TEXTURE_2D), Some(t1));
        assert_eq!(gl.current_program(), c.effect_program().handle());
        assert_eq!(gl.draw_calls(), [(glow::TRIANGLE_STRIP, 0, 4)]);
    }

    #[test]
    fn toggle_selects_passthrough_program() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Glitch);
        attach(&gl, &mut c, [0, 255, 0, 255]);

        assert!(!c.toggle_effect());
        let report = unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();
        assert!(!report.used_effect);

        let resize = c.resize_program().handle().unwrap();
        assert_eq!(gl.current_program(), Some(resize));
        assert_eq!(gl.uniform_int(resize, U_TEXTURE), Some(0));
    }

    #[test]
    fn single_source_feeds_every_declared_effect_sampler() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Fade);
        attach(&gl, &mut c, [9, 9, 9, 255]);

        unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();
        let t0 = c.sources()[0].texture();
        assert_eq!(gl.bound_texture(1, glow::TEXTURE_2D), Some(t0));
    }

    #[test]
    fn transition_progress_reaches_the_effect() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Fade);
        attach(&gl, &mut c, [0, 0, 0, 255]);

        let t0 = Instant::now();
        c.start_transition(t0);
        let report = unsafe { c.render_frame(&gl, t0 + Duration::from_secs(1)) }.unwrap();
        assert!((report.transition_progress - 0.5).abs() < 1e-4);

        let effect = c.effect_program().handle().unwrap();
        let progress = gl.uniform_value(effect, I_TRANSITION_PROGRESS).unwrap();
        assert!((progress[0] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn sample_transform_is_forwarded_verbatim() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Glitch);
        let mut transform = IDENTITY_TRANSFORM;
        transform[13] = 1.0;
        transform[5] = -1.0;
        let mut producer = ScriptedProducer::new(2, 2);
        producer.set_transform(transform);
        producer.push_solid_frame(2, 2, [1, 2, 3, 4]);
        unsafe { c.add_source(&gl, Box::new(producer)) }.unwrap();

        unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();
        let effect = c.effect_program().handle().unwrap();
        assert_eq!(gl.uniform_value(effect, U_ST_MATRIX).unwrap(), transform);
    }

    #[test]
    fn third_source_is_rejected() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Fade);
        attach(&gl, &mut c, [0; 4]);
        attach(&gl, &mut c, [0; 4]);
        let err = unsafe { c.add_source(&gl, Box::new(ScriptedProducer::new(1, 1))) }.unwrap_err();
        assert!(matches!(err, EngineError::TooManySources { max: 2 }));
    }

    #[test]
    fn driver_error_aborts_the_frame_before_drawing() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Fade);
        attach(&gl, &mut c, [0; 4]);
        unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();
        assert_eq!(gl.draw_calls().len(), 1);

        gl.push_error(glow::INVALID_OPERATION);
        let err = unsafe { c.render_frame(&gl, Instant::now()) }.unwrap_err();
        assert!(
            matches!(err, EngineError::GpuState { code, .. } if code == glow::INVALID_OPERATION),
            "{err}"
        );
        assert_eq!(gl.draw_calls().len(), 1);
    }

    #[test]
    fn destroy_releases_programs_and_textures() {
        let gl = FakeGl::new();
        let mut c = compositor(&gl, EffectKind::Fade);
        attach(&gl, &mut c, [0; 4]);
        unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();

        unsafe { c.destroy(&gl) };
        assert_eq!(gl.live_programs(), 0);
        assert_eq!(gl.live_textures(), 0);
        assert_eq!(gl.live_buffers(), 0);
    }

    #[test]
    fn effect_failure_releases_resize_program() {
        let gl = FakeGl::new();
        let broken = ShaderSource {
            vert: ShaderSource::builtin_resize().vert,
            frag: "#version 330 core\n#error nope\nvoid main() {}\n".into(),
            origin: None,
        };
        let err = unsafe {
            Compositor::new(
                &gl,
                &ShaderSource::builtin_resize(),
                &broken,
                EffectKind::Glitch,
                TransitionRamp::from_secs(1.0),
            )
        }
        .unwrap_err();
        assert!(matches!(err, EngineError::ShaderCompile { .. }));
        assert_eq!(gl.live_programs(), 0);
    }
}

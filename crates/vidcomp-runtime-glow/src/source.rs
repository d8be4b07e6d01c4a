use glow::NativeTexture;
use vidcomp_core::EngineError;
use vidcomp_input_video::{FrameProducer, VideoFrame};

use crate::check::check_gl_error;
use crate::gl::Gl;

/// One video input: a frame producer plus the texture its frames are latched into.
pub struct VideoSource {
    producer: Box<dyn FrameProducer + Send>,
    texture: NativeTexture,
    transform: [f32; 16],
    w: i32,
    h: i32,
    latched: u64,
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("texture", &self.texture)
            .field("w", &self.w)
            .field("h", &self.h)
            .field("latched", &self.latched)
            .field("producer", &"<frame producer>")
            .finish()
    }
}

impl VideoSource {
    /// Allocate a texture sized to the producer's nominal frame size.
    pub unsafe fn new<G: Gl + ?Sized>(
        gl: &G,
        producer: Box<dyn FrameProducer + Send>,
    ) -> Result<Self, EngineError> {
        let (w, h) = producer.frame_size();
        let (w, h) = (w.max(1) as i32, h.max(1) as i32);

        let texture = gl
            .create_texture()
            .map_err(|e| EngineError::GlCreate(format!("create_texture failed: {e:?}")))?;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.tex_image_2d_rgba(glow::TEXTURE_2D, w, h, None);
        gl.bind_texture(glow::TEXTURE_2D, None);

        if let Err(e) = check_gl_error(gl, "allocate video texture") {
            gl.delete_texture(texture);
            return Err(e);
        }

        let transform = producer.sample_transform();
        Ok(Self {
            producer,
            texture,
            transform,
            w,
            h,
            latched: 0,
        })
    }

    pub fn texture(&self) -> NativeTexture {
        self.texture
    }

    /// Sample-space transform of the most recently latched frame.
    pub fn transform(&self) -> [f32; 16] {
        self.transform
    }

    pub fn size(&self) -> (i32, i32) {
        (self.w, self.h)
    }

    pub fn position_secs(&self) -> f32 {
        self.producer.position_secs()
    }

    /// Number of frames uploaded so far.
    pub fn latched(&self) -> u64 {
        self.latched
    }

    /// Upload the producer's newest frame, if any. Returns whether the texture changed.
    pub unsafe fn update_tex_image<G: Gl + ?Sized>(&mut self, gl: &G) -> Result<bool, EngineError> {
        let Some(frame) = self.producer.take_frame() else {
            return Ok(false);
        };
        self.upload(gl, &frame)?;
        self.transform = self.producer.sample_transform();
        self.latched += 1;
        Ok(true)
    }

    unsafe fn upload<G: Gl + ?Sized>(&mut self, gl: &G, frame: &VideoFrame) -> Result<(), EngineError> {
        let expected = frame.width as usize * frame.height as usize * 4;
        if frame.width == 0 || frame.height == 0 || frame.bytes.len() != expected {
            return Err(EngineError::other(format!(
                "video frame {} is {}x{} with {} bytes (expected {expected})",
                frame.seq,
                frame.width,
                frame.height,
                frame.bytes.len()
            )));
        }

        let (w, h) = (frame.width as i32, frame.height as i32);
        gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
        if (w, h) != (self.w, self.h) {
            tracing::info!(from = ?(self.w, self.h), to = ?(w, h), "video size changed; reallocating texture");
            gl.tex_image_2d_rgba(glow::TEXTURE_2D, w, h, Some(&frame.bytes));
            self.w = w;
            self.h = h;
        } else {
            gl.tex_sub_image_2d_rgba(glow::TEXTURE_2D, w, h, &frame.bytes);
        }
        gl.bind_texture(glow::TEXTURE_2D, None);

        check_gl_error(gl, "upload video frame")
    }

    pub unsafe fn destroy<G: Gl + ?Sized>(&mut self, gl: &G) {
        gl.delete_texture(self.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGl, ScriptedProducer};

    #[test]
    fn texture_is_allocated_at_nominal_size() {
        let gl = FakeGl::new();
        let src = unsafe { VideoSource::new(&gl, Box::new(ScriptedProducer::new(4, 2))) }.unwrap();
        assert_eq!(src.size(), (4, 2));
        assert_eq!(gl.texture_size(src.texture()), Some((4, 2)));
        assert_eq!(gl.live_textures(), 1);
    }

    #[test]
    fn frames_are_latched_once() {
        let gl = FakeGl::new();
        let mut producer = ScriptedProducer::new(2, 2);
        producer.push_solid_frame(2, 2, [255, 0, 0, 255]);
        let mut src = unsafe { VideoSource::new(&gl, Box::new(producer)) }.unwrap();

        assert!(unsafe { src.update_tex_image(&gl) }.unwrap());
        assert!(!unsafe { src.update_tex_image(&gl) }.unwrap());
        assert_eq!(src.latched(), 1);
        assert_eq!(gl.texture_uploads(src.texture()), 1);
    }

    #[test]
    fn size_change_reallocates() {
        let gl = FakeGl::new();
        let mut producer = ScriptedProducer::new(2, 2);
        producer.push_solid_frame(8, 4, [0, 0, 0, 255]);
        let mut src = unsafe { VideoSource::new(&gl, Box::new(producer)) }.unwrap();

        unsafe { src.update_tex_image(&gl) }.unwrap();
        assert_eq!(src.size(), (8, 4));
        assert_eq!(gl.texture_size(src.texture()), Some((8, 4)));
    }

    #[test]
    fn short_frame_is_rejected() {
        let gl = FakeGl::new();
        let mut producer = ScriptedProducer::new(2, 2);
        producer.push_frame(VideoFrame {
            width: 2,
            height: 2,
            bytes: vec![0; 3],
            seq: 1,
        });
        let mut src = unsafe { VideoSource::new(&gl, Box::new(producer)) }.unwrap();
        assert!(unsafe { src.update_tex_image(&gl) }.is_err());
    }
}

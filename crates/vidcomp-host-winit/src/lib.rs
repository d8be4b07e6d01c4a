//! Host glue (policy layer): window + GL context creation and logging setup.
//!
//! Kept separate from the runtime so the compositor stays embeddable in any host that can hand
//! it a GL context.
#![deny(missing_debug_implementations)]

pub mod player;

pub use player::PlayerConfig;

use std::ffi::CString;
use std::num::NonZeroU32;

use glutin::config::ConfigTemplateBuilder;
use glutin::context::{
    ContextAttributesBuilder, GlProfile, NotCurrentGlContextSurfaceAccessor, PossiblyCurrentContext,
};
use glutin::display::GetGlDisplay;
use glutin::prelude::{GlConfig, GlDisplay, GlSurface};
use glutin::surface::{Surface, SurfaceAttributesBuilder, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

use vidcomp_core::EngineError;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default `info` filter.
///
/// Calling this more than once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// A window with a current GL context.
pub struct GlWindow {
    pub window: Window,
    pub surface: Surface<WindowSurface>,
    pub context: PossiblyCurrentContext,
    pub gl: glow::Context,
}

impl std::fmt::Debug for GlWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlWindow")
            .field("window", &self.window.id())
            .field("size", &self.window.inner_size())
            .finish_non_exhaustive()
    }
}

impl GlWindow {
    /// Resize the surface to the window's new physical size (clamped to at least 1x1).
    pub fn resize_surface(&self, size: PhysicalSize<u32>) -> (i32, i32) {
        let (w, h) = clamp_size(size);
        self.surface.resize(&self.context, w, h);
        (w.get() as i32, h.get() as i32)
    }

    pub fn swap_buffers(&self) -> Result<(), EngineError> {
        self.surface
            .swap_buffers(&self.context)
            .map_err(|e| EngineError::GlCreate(format!("swap_buffers: {e}")))
    }
}

fn clamp_size(size: PhysicalSize<u32>) -> (NonZeroU32, NonZeroU32) {
    (
        NonZeroU32::new(size.width).unwrap_or(NonZeroU32::MIN),
        NonZeroU32::new(size.height).unwrap_or(NonZeroU32::MIN),
    )
}

/// Open a window and make a core-profile GL context current on it.
pub fn make_gl(
    event_loop: &EventLoop<()>,
    title: &str,
    width: u32,
    height: u32,
) -> Result<GlWindow, EngineError> {
    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_depth_size(0)
        .with_stencil_size(0)
        .with_transparency(false);

    let display_builder = DisplayBuilder::new().with_window_builder(Some(
        WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width.max(1), height.max(1))),
    ));

    let (window, gl_config) = display_builder
        .build(event_loop, template, |configs| {
            configs
                .reduce(|a, b| if a.num_samples() > b.num_samples() { a } else { b })
                .expect("glutin offered no GL configs")
        })
        .map_err(|e| EngineError::GlCreate(format!("DisplayBuilder.build: {e}")))?;

    let window = window
        .ok_or_else(|| EngineError::GlCreate("DisplayBuilder did not create a window".into()))?;
    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_profile(GlProfile::Core)
        .build(Some(raw_window_handle));
    let fallback_context_attributes = ContextAttributesBuilder::new()
        .with_profile(GlProfile::Core)
        .build(None);

    let not_current_gl_context = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .or_else(|_| gl_display.create_context(&gl_config, &fallback_context_attributes))
            .map_err(|e| EngineError::GlCreate(format!("create_context: {e}")))?
    };

    let (w, h) = clamp_size(window.inner_size());
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(raw_window_handle, w, h);

    let surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .map_err(|e| EngineError::GlCreate(format!("create_window_surface: {e}")))?
    };

    let context = not_current_gl_context
        .make_current(&surface)
        .map_err(|e| EngineError::GlCreate(format!("make_current: {e}")))?;

    let gl = unsafe {
        glow::Context::from_loader_function(|s| match CString::new(s) {
            Ok(name) => gl_display.get_proc_address(name.as_c_str()) as *const _,
            Err(_) => std::ptr::null(),
        })
    };

    tracing::info!(w = w.get(), h = h.get(), samples = gl_config.num_samples(), "GL context ready");

    Ok(GlWindow {
        window,
        surface,
        context,
        gl,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_clamp_to_one() {
        let (w, h) = clamp_size(PhysicalSize::new(0, 720));
        assert_eq!((w.get(), h.get()), (1, 720));
    }

    #[test]
    fn tracing_init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}

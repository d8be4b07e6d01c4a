//! Two-video compositor demo.
//!
//! Usage: `video_player <player.json>`
//!
//! Keys: Space toggles the effect program, `T` restarts the transition, Escape quits.
//! `RUST_LOG` controls log filtering (default `info`).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

use vidcomp_host_winit::{init_tracing, make_gl, GlWindow, PlayerConfig};
use vidcomp_input_video::VideoDecoder;
use vidcomp_runtime_glow::Compositor;

/// How often the loop wakes to check for decoded frames when nothing else is happening.
const FRAME_POLL: Duration = Duration::from_millis(4);

fn main() {
    init_tracing();
    if let Err(e) = run() {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: video_player <player.json>")?;
    let cfg = PlayerConfig::load(&path)
        .with_context(|| format!("loading player config {}", path.display()))?;

    let event_loop = EventLoop::new();
    let host: GlWindow = make_gl(
        &event_loop,
        "vidcomp: video_player",
        cfg.compositor.width,
        cfg.compositor.height,
    )
    .context("creating window")?;
    let gl = &host.gl;

    let mut compositor = unsafe { Compositor::from_config(gl, &cfg.compositor) }
        .context("building shader programs")?;
    let (w, h) = host.resize_surface(host.window.inner_size());
    unsafe { compositor.resize(gl, w, h) };

    // The compositor owns the decoders; dropping a source stops its worker thread.
    for (i, video) in cfg.videos.iter().enumerate() {
        let decoder = VideoDecoder::from_config(video.clone(), compositor.frame_signal())
            .with_context(|| format!("starting decoder for videos[{i}] ({})", video.file))?;
        unsafe { compositor.add_source(gl, Box::new(decoder)) }
            .with_context(|| format!("attaching videos[{i}]"))?;
    }
    compositor.start_transition(Instant::now());

    let waiter = compositor.frame_waiter().clone();
    let mut failed = false;

    event_loop.run(move |event, _, control_flow| {
        let gl = &host.gl;
        let window = &host.window;
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => control_flow.set_exit(),
                WindowEvent::Resized(size) => {
                    let (w, h) = host.resize_surface(size);
                    unsafe { compositor.resize(gl, w, h) };
                    window.request_redraw();
                }
                WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            state: ElementState::Pressed,
                            virtual_keycode: Some(key),
                            ..
                        },
                    ..
                } => match key {
                    VirtualKeyCode::Escape => control_flow.set_exit(),
                    VirtualKeyCode::Space => {
                        compositor.toggle_effect();
                        window.request_redraw();
                    }
                    VirtualKeyCode::T => {
                        compositor.start_transition(Instant::now());
                        window.request_redraw();
                    }
                    _ => {}
                },
                _ => {}
            },

            Event::MainEventsCleared => {
                // One redraw per burst of decoded frames.
                if waiter.take_pending() {
                    window.request_redraw();
                }
                control_flow.set_wait_until(Instant::now() + FRAME_POLL);
            }

            Event::RedrawRequested(_) => {
                let rendered = unsafe { compositor.render_frame(gl, Instant::now()) }
                    .and_then(|_| host.swap_buffers());
                if let Err(e) = rendered {
                    tracing::error!("render failed: {e}");
                    failed = true;
                    control_flow.set_exit_with_code(1);
                }
            }

            Event::LoopDestroyed => {
                unsafe { compositor.destroy(gl) };
                tracing::info!(failed, "player stopped");
            }

            _ => {}
        }
    });
}

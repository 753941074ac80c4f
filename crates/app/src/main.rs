//! toy2d demo - Main Entry Point
//!
//! Opens a fixed-size window and draws a rectangle or a triangle every frame.
//!
//! Controls:
//! - Space: switch between rectangle and triangle
//! - Up / Down: raise or lower opacity
//! - Escape: quit

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use toy2d_core::{EngineConfig, FrameTimer};
use toy2d_platform::{InputState, KeyCode, Window};
use toy2d_renderer::{Engine, FrameIndices, RendererError, RendererResult, UniformObject, Vertex};

/// Counter-clockwise on screen (y points down in clip space).
const RECTANGLE_VERTICES: [Vertex; 4] = [
    Vertex::new(-0.5, -0.5),
    Vertex::new(-0.5, 0.5),
    Vertex::new(0.5, 0.5),
    Vertex::new(0.5, -0.5),
];
const RECTANGLE_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex::new(0.0, -0.5),
    Vertex::new(-0.5, 0.5),
    Vertex::new(0.5, 0.5),
];

const OPACITY_STEP: f32 = 0.1;

#[derive(Parser, Debug)]
#[command(name = "toy2d", about = "Minimal Vulkan 2D renderer demo")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "toy2d.toml")]
    config: PathBuf,

    /// Image to bind as the texture instead of plain white
    #[arg(long)]
    texture: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shape {
    Rectangle,
    Triangle,
}

impl Shape {
    fn toggled(self) -> Self {
        match self {
            Shape::Rectangle => Shape::Triangle,
            Shape::Triangle => Shape::Rectangle,
        }
    }
}

struct App {
    config: EngineConfig,
    texture: Option<PathBuf>,
    // Engine before window: the surface must go before the window it targets
    engine: Option<Engine>,
    window: Option<Window>,
    input: InputState,
    timer: FrameTimer,
    shape: Shape,
    opacity: f32,
}

impl App {
    fn new(config: EngineConfig, texture: Option<PathBuf>) -> Self {
        Self {
            config,
            texture,
            engine: None,
            window: None,
            input: InputState::new(),
            timer: FrameTimer::new(Duration::from_secs(1)),
            shape: Shape::Rectangle,
            opacity: 1.0,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, &self.config.window)?;
        let extensions = window.required_extensions()?;

        let mut engine = Engine::initialize(
            &extensions,
            |entry, instance| window.create_surface(entry, instance),
            window.width(),
            window.height(),
            &self.config,
        )?;

        let renderer = engine.renderer_mut();
        renderer.set_rectangle_geometry(&RECTANGLE_VERTICES, &RECTANGLE_INDICES)?;
        renderer.set_triangle_geometry(&TRIANGLE_VERTICES)?;
        if let Some(path) = &self.texture {
            renderer.set_texture(path)?;
        }

        self.engine = Some(engine);
        self.window = Some(window);
        Ok(())
    }

    /// Applies this frame's key presses.
    fn handle_input(&mut self, event_loop: &ActiveEventLoop) -> RendererResult<()> {
        if self.input.is_key_just_pressed(KeyCode::Escape) {
            event_loop.exit();
            return Ok(());
        }
        if self.input.is_key_just_pressed(KeyCode::Space) {
            self.shape = self.shape.toggled();
            info!("Drawing {:?}", self.shape);
        }

        let mut opacity = self.opacity;
        if self.input.is_key_just_pressed(KeyCode::ArrowUp) {
            opacity += OPACITY_STEP;
        }
        if self.input.is_key_just_pressed(KeyCode::ArrowDown) {
            opacity -= OPACITY_STEP;
        }
        let opacity = opacity.clamp(0.0, 1.0);

        if opacity != self.opacity
            && let Some(engine) = self.engine.as_mut()
        {
            engine
                .renderer_mut()
                .set_uniform_object(UniformObject::new(opacity))?;
            self.opacity = opacity;
            info!("Opacity {:.1}", opacity);
        }
        Ok(())
    }

    fn draw(&mut self) -> RendererResult<Option<FrameIndices>> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(None);
        };
        let renderer = engine.renderer_mut();
        let frame = match self.shape {
            Shape::Rectangle => renderer.draw_rectangle()?,
            Shape::Triangle => renderer.draw_triangle()?,
        };
        Ok(Some(frame))
    }

    fn stop_on_error(&mut self, event_loop: &ActiveEventLoop, e: RendererError) {
        if e.is_fatal() {
            self.stop_render_loop(event_loop, e);
        } else {
            warn!("{} failed: {}", e.stage(), e);
        }
    }

    /// A failed frame cannot be retried, whatever the error.
    fn stop_render_loop(&mut self, event_loop: &ActiveEventLoop, e: RendererError) {
        error!("Fatal error during {}: {}", e.stage(), e);
        event_loop.exit();
    }

    fn shutdown(&mut self) {
        if let Some(engine) = self.engine.take()
            && let Err(e) = engine.shutdown()
        {
            error!("Engine shutdown failed: {}", e);
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(()) => info!("Initialization complete, entering main loop"),
            Err(e) => {
                error!("Failed to initialize: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.handle_input(event_loop) {
                    self.stop_on_error(event_loop, e);
                }
                self.input.begin_frame();

                match self.draw() {
                    Ok(Some(_)) => {
                        if let Some(fps) = self.timer.frame() {
                            info!("{:.1} fps ({} frames)", fps, self.timer.total_frames());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => self.stop_render_loop(event_loop, e),
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.input.on_key_event(&event);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

fn main() -> Result<()> {
    toy2d_core::init_logging();
    info!("Starting toy2d");

    let args = Args::parse();
    let config = EngineConfig::load(&args.config)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, args.texture);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_toggles_back_and_forth() {
        assert_eq!(Shape::Rectangle.toggled(), Shape::Triangle);
        assert_eq!(Shape::Rectangle.toggled().toggled(), Shape::Rectangle);
    }

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["toy2d"]);
        assert_eq!(args.config, PathBuf::from("toy2d.toml"));
        assert!(args.texture.is_none());
    }
}

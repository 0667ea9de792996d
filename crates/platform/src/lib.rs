//! Platform layer: windowing, event loop and the render loop.
//!
//! One application-context struct owns the window, GPU state, shader program
//! and mesh; nothing is global. Frames are paced by vsync presentation.

use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use renderer::{
    DEPTH_FORMAT, GpuState, Mesh, RenderError, ShaderProgram, clip_from_gl,
    mesh::{NORMAL_ATTRIBUTE, POSITION_ATTRIBUTE},
};

pub mod fps;
pub mod lifecycle;
pub mod scene;

use fps::FpsCounter;
use lifecycle::{Lifecycle, Phase};
use scene::FrameStacks;

pub const VERTEX_SHADER_FILE: &str = "simple_vert.glsl";
pub const FRAGMENT_SHADER_FILE: &str = "simple_frag.glsl";
pub const DEFAULT_MESH_FILE: &str = "bunny.obj";

/// Uniforms the shader pair must expose.
pub const UNIFORMS: [&str; 3] = ["P", "V", "MV"];
/// Attributes the shader pair must expose.
pub const ATTRIBUTES: [&str; 2] = [POSITION_ATTRIBUTE, NORMAL_ATTRIBUTE];

/// Everything a run needs, resolved from the command line.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub resource_dir: PathBuf,
    pub mesh_file: String,
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
    pub show_fps: bool,
    pub title: String,
}

impl RunConfig {
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
            mesh_file: DEFAULT_MESH_FILE.to_owned(),
            backends: wgpu::Backends::all(),
            width: 640,
            height: 480,
            show_fps: false,
            title: "Meshview".to_owned(),
        }
    }

    pub fn mesh_path(&self) -> PathBuf {
        self.resource_dir.join(&self.mesh_file)
    }

    pub fn shader_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.resource_dir.join(VERTEX_SHADER_FILE),
            self.resource_dir.join(FRAGMENT_SHADER_FILE),
        )
    }
}

/// Open the window and render until it is closed.
/// Startup and render failures are returned after the loop exits.
pub fn run(config: RunConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated with error")?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Resources that exist once the window and GPU context are up.
struct RenderContext {
    window: Arc<Window>,
    gpu: GpuState,
    program: ShaderProgram,
    mesh: Mesh,
}

struct App {
    config: RunConfig,
    lifecycle: Lifecycle,
    ctx: Option<RenderContext>,
    stacks: FrameStacks,
    frame: u32,
    cursor: PhysicalPosition<f64>,
    fps: Option<FpsCounter>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: RunConfig) -> Self {
        let fps = config.show_fps.then(|| FpsCounter::new(Instant::now()));
        Self {
            config,
            lifecycle: Lifecycle::new(),
            ctx: None,
            stacks: FrameStacks::new(),
            frame: 0,
            cursor: PhysicalPosition::new(0.0, 0.0),
            fps,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );
        self.lifecycle.advance(Phase::WindowCreated)?;

        let gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends))
            .context("failed to initialize GPU context")?;
        self.lifecycle.advance(Phase::ContextReady)?;

        let (program, mesh) = init_scene(&gpu, &self.config)?;
        self.lifecycle.advance(Phase::Initialized)?;

        window.request_redraw();
        self.ctx = Some(RenderContext {
            window,
            gpu,
            program,
            mesh,
        });
        self.lifecycle.advance(Phase::Running)
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if self.lifecycle.phase() == Phase::Closing {
            return;
        }
        if let Err(e) = self.lifecycle.advance(Phase::Closing) {
            log::warn!("{e:#}");
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error.get_or_insert(err);
        self.close(event_loop);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.lifecycle.phase() != Phase::Running {
            return;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };

        self.frame = self.frame.wrapping_add(1);
        match draw_frame(ctx, &mut self.stacks, self.frame) {
            Ok(()) => {
                if let Err(err) = self.lifecycle.advance(Phase::Running) {
                    self.fail(event_loop, err);
                    return;
                }
                if let Some(rate) = self.fps.as_mut().and_then(|f| f.tick(Instant::now())) {
                    log::info!("FPS: {rate:.1}");
                }
            }
            Err(RenderError::Surface(e)) if GpuState::is_surface_lost(&e) => {
                log::warn!("Surface lost/outdated. Reconfiguring.");
                ctx.gpu.recreate_surface();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                log::warn!("Surface timeout; skipping frame.");
            }
            Err(err) => self.fail(event_loop, err.into()),
        }
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        log::debug!("key: {:?} state: {:?}", event.physical_key, event.state);
        if event.state == ElementState::Pressed
            && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
        {
            log::info!("Escape pressed. Closing.");
            self.close(event_loop);
        }
    }
}

/// Load the mesh, then compile the program and register its interface.
fn init_scene(gpu: &GpuState, config: &RunConfig) -> Result<(ShaderProgram, Mesh)> {
    let mut data = asset::load_mesh(config.mesh_path())?;
    data.resize();
    let mesh = Mesh::init(gpu.device(), data).context("failed to upload mesh")?;

    let (vert, frag) = config.shader_paths();
    let mut program = ShaderProgram::new();
    program.set_verbose(true);
    program.set_shader_names(vert, frag);
    program
        .init(gpu.device(), gpu.surface_format(), DEPTH_FORMAT)
        .context("failed to build shader program")?;
    for name in UNIFORMS {
        program.add_uniform(name)?;
    }
    for name in ATTRIBUTES {
        program.add_attribute(name)?;
    }

    Ok((program, mesh))
}

/// Build the frame's P/V/MV, upload them and draw the mesh once.
fn draw_frame(
    ctx: &mut RenderContext,
    stacks: &mut FrameStacks,
    frame: u32,
) -> Result<(), RenderError> {
    let t = stacks.build(frame, ctx.gpu.aspect())?;
    log::trace!("frame {frame}: MV = {:?}", t.model_view);

    let queue = ctx.gpu.queue();
    ctx.program
        .set_uniform_mat4(queue, "P", &clip_from_gl(t.projection))?;
    ctx.program.set_uniform_mat4(queue, "V", &t.view)?;
    ctx.program.set_uniform_mat4(queue, "MV", &t.model_view)?;

    ctx.gpu.render(&mut ctx.program, &ctx.mesh)
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.ctx.is_some() || self.lifecycle.phase() != Phase::Uninitialized {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                self.close(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => self.on_key(event_loop, &event),
            WindowEvent::CursorMoved { position, .. } => self.cursor = position,
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button,
                ..
            } => {
                log::info!(
                    "Mouse {:?} pressed at x={:.1} y={:.1}",
                    button,
                    self.cursor.x,
                    self.cursor.y
                );
            }
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.lifecycle.phase() == Phase::Running {
            if let Some(ctx) = self.ctx.as_ref() {
                ctx.window.request_redraw();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // GPU objects go before the window they render to.
        self.ctx = None;
        if let Err(e) = self.lifecycle.shut_down() {
            log::warn!("{e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_resolves_resource_paths() {
        let mut config = RunConfig::new("/data/lab6");
        assert_eq!(config.mesh_path(), PathBuf::from("/data/lab6/bunny.obj"));
        config.mesh_file = "cube.obj".into();
        assert_eq!(config.mesh_path(), PathBuf::from("/data/lab6/cube.obj"));

        let (vert, frag) = config.shader_paths();
        assert_eq!(vert, PathBuf::from("/data/lab6/simple_vert.glsl"));
        assert_eq!(frag, PathBuf::from("/data/lab6/simple_frag.glsl"));
    }

    #[test]
    fn shipped_shaders_expose_the_driver_interface() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources");
        let config = RunConfig::new(dir);
        let (vert, frag) = config.shader_paths();

        let mut program = ShaderProgram::new();
        program.set_shader_names(vert, frag);
        program.compile().unwrap();
        for name in UNIFORMS {
            program.add_uniform(name).unwrap();
        }
        for name in ATTRIBUTES {
            program.add_attribute(name).unwrap();
        }
    }

    #[test]
    fn shipped_mesh_loads_and_fits_unit_cube() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources");
        let mut data = asset::load_mesh(RunConfig::new(dir).mesh_path()).unwrap();
        data.resize();
        let (min, max) = data.bounds().unwrap();
        let extent = (0..3).map(|k| max[k] - min[k]).fold(0.0f32, f32::max);
        assert!((extent - 2.0).abs() < 1e-4);
    }
}

//! Interactive viewer: a winit window driving a [`Blob`] every frame.
//!
//! Controls:
//! - Left drag rotates the field
//! - Mouse wheel raises or lowers the isosurface threshold
//! - `P` toggles between the isosurface and the raw point cloud
//! - `Space` pauses the simulation
//! - `Escape` quits

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::blob::{Blob, HostWindow};
use crate::cloud::{CloudConfig, CloudGenerator};
use crate::config::MetaballConfig;
use crate::error::AppError;
use crate::gpu::{create_depth_texture, FrameTarget, GpuContext};
use crate::lighting::LightBuffer;
use crate::physics::PhysicsParams;
use crate::scene::{ModelRotation, SceneConfig};
use crate::time::SimClock;
#[cfg(feature = "timing")]
use crate::time::FrameTimer;

/// Pointer and wheel state, and the drawable size the engine queries.
#[derive(Clone, Debug, Default)]
pub struct ViewerInput {
    pub size: (u32, u32),
    pub wheel_y: f32,
    pub rotation: ModelRotation,
    pub point_mode: bool,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
}

impl ViewerInput {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..Default::default()
        }
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
        if !dragging {
            self.last_cursor = None;
        }
    }

    /// Track the cursor, rotating the model while dragging.
    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        if !self.dragging {
            return;
        }
        if let Some((last_x, last_y)) = self.last_cursor {
            self.rotation.drag((x - last_x) as f32, (y - last_y) as f32);
        }
        self.last_cursor = Some((x, y));
    }

    pub fn scroll(&mut self, delta: MouseScrollDelta) {
        self.wheel_y += match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
        };
    }
}

impl HostWindow for ViewerInput {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn wheel_y(&self) -> f32 {
        self.wheel_y
    }
}

/// Everything that exists only while the window does.
struct RenderState {
    gpu: Arc<GpuContext>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    light: LightBuffer,
    blob: Blob,
}

impl RenderState {
    async fn new(
        window: Arc<Window>,
        scene: &SceneConfig,
        metaball: MetaballConfig,
        generator: &mut CloudGenerator,
    ) -> Result<Self, AppError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window).map_err(crate::error::GpuError::from)?;
        let gpu = Arc::new(GpuContext::new(instance, Some(&surface)).await?);

        let surface_caps = surface.get_capabilities(&gpu.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .unwrap_or(metaball.surface_format);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);

        let depth_view =
            create_depth_texture(&gpu.device, surface_config.width, surface_config.height);
        let light = LightBuffer::new(&gpu.device, &scene.light);

        let particles = generator.generate();
        let metaball = metaball.with_surface_format(surface_format);
        let blob = Blob::new(Arc::clone(&gpu), &particles, metaball)?;

        Ok(Self {
            gpu,
            surface,
            surface_config,
            depth_view,
            light,
            blob,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.surface.configure(&self.gpu.device, &self.surface_config);
        self.depth_view = create_depth_texture(&self.gpu.device, size.width, size.height);
    }

    fn render(&mut self, scene: &SceneConfig, input: &ViewerInput) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let target = FrameTarget::new(&view, self.surface_config.width, self.surface_config.height)
            .with_depth(&self.depth_view);
        let projection = scene.camera.projection(input.aspect());
        let modelview = scene.camera.view_matrix() * input.rotation.matrix();

        let result = if input.point_mode {
            self.blob.draw(&target, &projection, &modelview)
        } else {
            self.blob
                .draw_metaball(&target, &projection, &modelview, input, &self.light)
        };
        if let Err(e) = result {
            log::error!("Frame skipped: {}", e);
        }

        output.present();
        Ok(())
    }
}

/// The viewer application.
pub struct App {
    scene: SceneConfig,
    metaball: MetaballConfig,
    physics: PhysicsParams,
    generator: CloudGenerator,
    clock: SimClock,
    #[cfg(feature = "timing")]
    timer: FrameTimer,
    input: ViewerInput,
    window: Option<Arc<Window>>,
    state: Option<RenderState>,
    error: Option<AppError>,
}

impl App {
    pub fn new(scene: SceneConfig, metaball: MetaballConfig, clouds: CloudConfig) -> Self {
        let (width, height) = scene.window_size;
        Self {
            physics: PhysicsParams::default().with_timestep(scene.timestep),
            clock: SimClock::new(scene.reset_interval),
            #[cfg(feature = "timing")]
            timer: FrameTimer::new(),
            input: ViewerInput::new(width, height),
            generator: CloudGenerator::new(clouds),
            scene,
            metaball,
            window: None,
            state: None,
            error: None,
        }
    }

    pub fn with_physics(mut self, physics: PhysicsParams) -> Self {
        self.physics = physics;
        self
    }

    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<AppError> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: AppError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// One simulation step followed by one rendered frame.
    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &mut self.state else {
            return;
        };

        self.clock.advance(self.scene.timestep);
        if self.clock.reset_due() {
            let particles = self.generator.generate();
            if let Err(e) = state.blob.initialize(&particles) {
                log::warn!("Particle reset failed: {}", e);
            }
            self.clock.rewind();
            log::debug!("Particles reset");
        }

        if !self.clock.is_paused() {
            let obstacle = self.scene.obstacle.at(self.clock.elapsed());
            state.blob.update(&obstacle, &self.physics);
        }

        match state.render(&self.scene, &self.input) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = PhysicalSize::new(state.surface_config.width, state.surface_config.height);
                state.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
                event_loop.exit();
            }
            Err(e) => log::warn!("Render error: {:?}", e),
        }

        self.record_frame();
    }

    #[cfg(feature = "timing")]
    fn record_frame(&mut self) {
        if let Some(fps) = self.timer.tick() {
            log::info!("{:.1} fps", fps);
        }
    }

    #[cfg(not(feature = "timing"))]
    fn record_frame(&mut self) {}

    fn key_pressed(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        match event.logical_key.as_ref() {
            Key::Named(NamedKey::Escape) => event_loop.exit(),
            Key::Named(NamedKey::Space) => {
                self.clock.toggle_pause();
                log::info!("Simulation {}", if self.clock.is_paused() { "paused" } else { "resumed" });
            }
            Key::Character(c) if c.eq_ignore_ascii_case("p") => {
                self.input.point_mode = !self.input.point_mode;
                log::info!(
                    "Drawing {}",
                    if self.input.point_mode { "points" } else { "isosurface" }
                );
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let (width, height) = self.scene.window_size;
        let window_attrs = Window::default_attributes()
            .with_title(self.scene.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        let size = window.inner_size();
        self.input.size = (size.width, size.height);
        self.window = Some(Arc::clone(&window));

        match pollster::block_on(RenderState::new(
            window,
            &self.scene,
            self.metaball.clone(),
            &mut self.generator,
        )) {
            Ok(state) => self.state = Some(state),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                self.input.size = (physical_size.width, physical_size.height);
                if let Some(state) = &mut self.state {
                    state.resize(physical_size);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.input.set_dragging(state == ElementState::Pressed);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.cursor_moved(position.x, position.y);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.input.scroll(delta);
                log::debug!("Threshold {:.2}", self.metaball.threshold(self.input.wheel_y));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.key_pressed(event_loop, &event);
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

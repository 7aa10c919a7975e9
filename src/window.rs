use std::sync::Arc;

use anyhow::Context;
use glam::Vec2;
use rand::{rngs::StdRng, SeedableRng};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    assets::AssetRegistry,
    config::SceneConfig,
    demo::DemoState,
    engine::{
        AnimationLoop, CancellationToken, FrameClock, FrameScheduler, LoopState, WallClock,
    },
    input::PointerState,
    rendering::renderer::Renderer,
    viewport::{Viewport, ViewportSize},
};

const INITIAL_SIZE: LogicalSize<u32> = LogicalSize::new(1280, 720);

/// Asks winit for another `RedrawRequested` once this one is done.
struct RedrawScheduler<'a>(&'a Window);

impl FrameScheduler for RedrawScheduler<'_> {
    fn request_next_frame(&mut self) {
        self.0.request_redraw();
    }
}

struct App {
    demo: DemoState,
    renderer: Option<Renderer>,
    registry: AssetRegistry,
    engine: AnimationLoop,
    token: CancellationToken,
    clock: WallClock,
    pointer: PointerState,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: SceneConfig) -> Self {
        let viewport = Viewport::new(
            ViewportSize::new(INITIAL_SIZE.width, INITIAL_SIZE.height),
            1.0,
            config.max_pixel_ratio,
        );
        let registry = AssetRegistry::new(&config.asset_root);
        let demo = DemoState::new(config, viewport, &mut StdRng::from_entropy());
        let token = CancellationToken::new();

        Self {
            demo,
            renderer: None,
            registry,
            engine: AnimationLoop::new(token.clone()),
            token,
            clock: WallClock::new(),
            pointer: PointerState::new(),
            error: None,
        }
    }

    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("stardrift")
            .with_inner_size(INITIAL_SIZE);
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        let mut renderer = pollster::block_on(Renderer::new(window.clone(), &self.demo))?;
        self.demo.handle_resize(
            &mut renderer,
            logical_size(window.inner_size(), window.scale_factor()),
            window.scale_factor(),
        );
        self.renderer = Some(renderer);

        self.demo.request_assets(&mut self.registry);
        window.request_redraw();

        Ok(())
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        self.token.cancel();
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        for event in self.registry.poll() {
            self.demo.apply_asset_event(event);
        }

        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let window = renderer.window.clone();
        let now_ms = self.clock.now_ms();

        match self
            .engine
            .tick(&mut self.demo, renderer, &mut RedrawScheduler(&window), now_ms)
        {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                self.stop(event_loop);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
            }
        }

        if self.engine.state() == LoopState::Stopped {
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(error) = self.create_renderer(event_loop) {
            log::error!("{:#}", error);
            self.error = Some(error);
            self.stop(event_loop);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Window closed after {} frames", self.engine.frames());
                self.stop(event_loop);
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    let scale_factor = renderer.window.scale_factor();
                    self.demo.handle_resize(
                        renderer,
                        logical_size(new_size, scale_factor),
                        scale_factor,
                    );
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(renderer) = self.renderer.as_mut() {
                    let size = logical_size(renderer.window.inner_size(), scale_factor);
                    self.demo.handle_resize(renderer, size, scale_factor);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::MouseInput { state, button, .. } => {
                self.pointer.button(button, state);
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(renderer) = self.renderer.as_ref() {
                    let position = position.to_logical::<f32>(renderer.window.scale_factor());
                    self.pointer.moved(
                        Vec2::new(position.x, position.y),
                        self.demo.viewport.size().height as f32,
                        &mut self.demo.controls,
                        &self.demo.camera,
                    );
                }
            }
            WindowEvent::CursorLeft { .. } => self.pointer.left(),
            WindowEvent::MouseWheel { delta, .. } => {
                self.pointer.wheel(delta, &mut self.demo.controls);
            }
            _ => (),
        }
    }
}

fn logical_size(size: PhysicalSize<u32>, scale_factor: f64) -> ViewportSize {
    let logical = size.to_logical::<u32>(scale_factor);
    ViewportSize::new(logical.width, logical.height)
}

pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

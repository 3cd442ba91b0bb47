// =============================================================================
// PLONK - raymarched sphere field on a minimal Vulkan frame loop
// =============================================================================
//
// FRAME FLOW:
// 1. about_to_wait requests a redraw (continuous rendering)
// 2. RedrawRequested → Renderer::draw
//    - rebuild swapchain if the window size changed
//    - acquire frame, record, present
// 3. Title shows FPS once per second
//
// Any render error ends the event loop and is returned from main.
//
// =============================================================================

use anyhow::Result;
use glam::Vec3;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

use plonk::{Camera, Config, ContextOptions, RenderContext, Renderer, ShaderPaths, VulkanContext};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, config_error) = Config::load();

    let level_error = init_logging(&config);

    // Both happened before the logger existed
    for error in [config_error, level_error].into_iter().flatten() {
        log::warn!("{:#}. Using defaults.", error);
    }

    log::info!("Starting Plonk");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.exit_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Config level by default, `RUST_LOG` wins when set. An unusable configured
/// level falls back to info and is returned for reporting.
fn init_logging(config: &Config) -> Option<anyhow::Error> {
    let (level, error) = match config.log_level() {
        Ok(level) => (level, None),
        Err(e) => (log::LevelFilter::Info, Some(e)),
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.init();

    error
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: the renderer must be destroyed through the context before the
/// context drops. See the Drop impl.
struct App {
    config: Config,

    window: Option<Arc<Window>>,
    is_fullscreen: bool,

    renderer: Option<Renderer<VulkanContext>>,
    context: Option<VulkanContext>,
    camera: Camera,

    /// First fatal error, handed back to main after the loop exits
    exit_error: Option<anyhow::Error>,

    // FPS tracking
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let camera = Camera::new(
            Vec3::from(config.camera.position),
            Vec3::from(config.camera.direction),
        );
        let now = Instant::now();

        Self {
            config,
            window: None,
            is_fullscreen,
            renderer: None,
            context: None,
            camera,
            exit_error: None,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    fn init_rendering(&mut self, window: Arc<Window>) -> Result<()> {
        let options = ContextOptions {
            app_name: self.config.window.title.clone(),
            // Validation only in debug builds
            enable_validation: self.config.debug.validation_layers && cfg!(debug_assertions),
            present_mode: self.config.present_mode(),
        };

        let context = VulkanContext::attach(window, &options)?;
        let shaders = ShaderPaths::from(self.config.shaders.clone());
        let renderer = Renderer::new(&context, &shaders)?;

        log::info!(
            "Swapchain: {} images, {:?}",
            context.swapchain_image_count(),
            context.format()
        );

        self.context = Some(context);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn render_frame(&mut self) -> Result<bool> {
        match (self.renderer.as_mut(), self.context.as_mut()) {
            (Some(renderer), Some(context)) => renderer.draw(context, &self.camera),
            _ => Ok(false),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:?}", error);
        if self.exit_error.is_none() {
            self.exit_error = Some(error);
        }
        event_loop.exit();
    }

    // =========================================================================
    // FULLSCREEN TOGGLE
    // =========================================================================

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }
            // The size change is picked up by the next draw's resize check
        }
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms)",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::anyhow!("Failed to create window: {}", e));
                return;
            }
        };

        if let Err(e) = self.init_rendering(window.clone()) {
            self.fail(event_loop, e.context("Failed to initialize rendering"));
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
            }

            WindowEvent::RedrawRequested => match self.render_frame() {
                Ok(true) => self.update_fps(),
                Ok(false) => {}
                Err(e) => self.fail(event_loop, e.context("Render error")),
            },

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        match key {
                            KeyCode::Escape => {
                                log::info!("ESC pressed, exiting...");
                                event_loop.exit();
                            }
                            KeyCode::F11 => self.toggle_fullscreen(),
                            _ => {}
                        }
                    }
                }
            }

            _ => {}
        }
    }

    /// Continuous redraws
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up...");

        if let Some(context) = self.context.take() {
            if let Err(e) = context.wait_idle() {
                log::error!("Failed to wait for device idle: {:?}", e);
            }
            if let Some(renderer) = self.renderer.take() {
                renderer.destroy(&context);
            }
            // Context drops here: sync, commands, swapchain, render pass, device
        }

        log::info!("Cleanup complete");
    }
}

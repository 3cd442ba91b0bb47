// Renderer - per-frame draw loop driver
//
// DRAW FLOW:
// 1. Resize check (rebuild the swapchain if the window size changed)
// 2. Acquire a frame (blocks on the in-flight fence)
// 3. Record: pipeline, dynamic viewport/scissor, push constants, draw
// 4. Present

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;

use crate::camera::Camera;
use crate::config::ShaderConfig;
use crate::context::{Command, PipelineDesc, RenderContext};
use crate::frame::Frame;
use crate::push_constants::PushConstants;

/// Two triangles, positions generated in the vertex shader from the index
const FULLSCREEN_VERTEX_COUNT: u32 = 6;

/// Paths to the pre-compiled SPIR-V the pipeline is built from
#[derive(Debug, Clone)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        ShaderConfig::default().into()
    }
}

impl From<ShaderConfig> for ShaderPaths {
    fn from(config: ShaderConfig) -> Self {
        Self {
            vertex: config.vertex,
            fragment: config.fragment,
        }
    }
}

/// Owns the pipeline and its shaders. Does not own the context: call
/// [`Renderer::destroy`] with it before the context goes away.
pub struct Renderer<C: RenderContext> {
    pipeline: C::Pipeline,
    vertex_shader: C::Shader,
    fragment_shader: C::Shader,
    started_at: Instant,
}

impl<C: RenderContext> Renderer<C> {
    pub fn new(ctx: &C, shaders: &ShaderPaths) -> Result<Self> {
        log::info!("Creating renderer");

        let vertex_shader = ctx.load_shader(&shaders.vertex)?;
        let fragment_shader = match ctx.load_shader(&shaders.fragment) {
            Ok(shader) => shader,
            Err(e) => {
                ctx.destroy_shader(vertex_shader);
                return Err(e);
            }
        };

        let desc = PipelineDesc {
            vertex_shader,
            fragment_shader,
            push_constant_size: PushConstants::SIZE,
            push_constant_stages: PushConstants::STAGES,
        };

        let pipeline = match ctx.create_pipeline(&desc) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                ctx.destroy_shader(vertex_shader);
                ctx.destroy_shader(fragment_shader);
                return Err(e).context("Failed to build renderer pipeline");
            }
        };

        log::info!("Renderer ready");

        Ok(Self {
            pipeline,
            vertex_shader,
            fragment_shader,
            started_at: Instant::now(),
        })
    }

    /// Draw one frame looking through `camera`.
    ///
    /// Returns `Ok(false)` when the window has no area (minimized) and
    /// nothing was drawn.
    pub fn draw(&mut self, ctx: &mut C, camera: &Camera) -> Result<bool> {
        let window = ctx.window_size();
        if window.width == 0 || window.height == 0 {
            return Ok(false);
        }

        // Step 1: Resize check
        if ctx.update_swapchain()? {
            log::debug!("Swapchain rebuilt for {}x{}", window.width, window.height);
        }

        // Step 2: Acquire (blocking point)
        let mut frame = ctx.acquire_frame()?;

        // Step 3: Record
        self.record(&mut frame, camera);

        // Step 4: Present
        frame.present()?;

        Ok(true)
    }

    fn record(&self, frame: &mut Frame<'_, C>, camera: &Camera) {
        let extent = frame.extent();
        let time = self.started_at.elapsed().as_secs_f32();
        let constants = PushConstants::new(extent, camera, time);

        frame.record(Command::BindPipeline(&self.pipeline));
        frame.record(Command::SetViewport(extent));
        frame.record(Command::SetScissor(extent));
        frame.record(Command::PushConstants {
            pipeline: &self.pipeline,
            stages: PushConstants::STAGES,
            bytes: constants.as_bytes(),
        });
        frame.record(Command::Draw {
            vertex_count: FULLSCREEN_VERTEX_COUNT,
            instance_count: 1,
        });
    }

    /// Destroy the pipeline, then the shader modules it was built from.
    pub fn destroy(self, ctx: &C) {
        ctx.destroy_pipeline(self.pipeline);
        ctx.destroy_shader(self.vertex_shader);
        ctx.destroy_shader(self.fragment_shader);
    }
}

// Rendering context - the seam between the frame protocol and a device
//
// `VulkanContext` is the real implementation. The frame protocol in
// `frame.rs` and the draw loop in `renderer.rs` only see this trait, so the
// ordering rules live in one place regardless of backend.

use anyhow::Result;
use ash::vk;
use std::path::Path;

use crate::frame::{self, Frame};

/// Shaders and push-constant range a pipeline is built from
#[derive(Debug, Clone, Copy)]
pub struct PipelineDesc<S> {
    pub vertex_shader: S,
    pub fragment_shader: S,
    pub push_constant_size: u32,
    pub push_constant_stages: vk::ShaderStageFlags,
}

/// A single command recorded into a frame
#[derive(Debug, Clone, Copy)]
pub enum Command<'a, P> {
    BindPipeline(&'a P),
    SetViewport(vk::Extent2D),
    SetScissor(vk::Extent2D),
    PushConstants {
        pipeline: &'a P,
        stages: vk::ShaderStageFlags,
        bytes: &'a [u8],
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
}

pub trait RenderContext {
    type Shader: Copy;
    type Pipeline;
    /// Command buffer handed to a frame for the duration of one recording
    type Commands;

    // ─────────────────────────────────────────────────────────────────────
    // PRESENTATION CHAIN
    // ─────────────────────────────────────────────────────────────────────

    /// Extent of the presentable images
    fn extent(&self) -> vk::Extent2D;

    /// Window size the chain was last built for
    fn swapchain_size(&self) -> vk::Extent2D;

    /// Live window size
    fn window_size(&self) -> vk::Extent2D;

    fn swapchain_image_count(&self) -> u32;

    /// Destroy and recreate every size-dependent object for the window's
    /// current size
    fn rebuild_swapchain(&mut self) -> Result<()>;

    fn needs_resize(&self) -> bool {
        self.swapchain_size() != self.window_size()
    }

    /// Rebuild the chain if the window size changed. Returns true on rebuild.
    fn update_swapchain(&mut self) -> Result<bool> {
        if !self.needs_resize() {
            return Ok(false);
        }
        self.rebuild_swapchain()?;
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────
    // SHADERS & PIPELINES
    // ─────────────────────────────────────────────────────────────────────

    fn load_shader(&self, path: &Path) -> Result<Self::Shader>;
    fn destroy_shader(&self, shader: Self::Shader);
    fn create_pipeline(&self, desc: &PipelineDesc<Self::Shader>) -> Result<Self::Pipeline>;
    fn destroy_pipeline(&self, pipeline: Self::Pipeline);

    // ─────────────────────────────────────────────────────────────────────
    // FRAME PROTOCOL STEPS (driven by `frame::acquire` / `Frame::present`)
    // ─────────────────────────────────────────────────────────────────────

    /// Block until the previous frame's GPU work is done, then reset the gate
    fn wait_for_frame_slot(&mut self) -> Result<()>;

    /// Next presentable image, signals image-available when ready
    fn acquire_image(&mut self) -> Result<u32>;

    /// Hand out the command buffer with recording and the render pass begun
    fn begin_commands(&mut self, image_index: u32) -> Result<Self::Commands>;

    fn record(&self, commands: &mut Self::Commands, command: Command<'_, Self::Pipeline>);

    /// End recording and submit. Takes the command buffer back.
    fn submit(&mut self, commands: Self::Commands) -> Result<()>;

    fn queue_present(&mut self, image_index: u32) -> Result<()>;

    /// Signal the frame gate again for a frame abandoned before submit, so
    /// the next wait does not block forever. `image_acquired` tells whether
    /// an image-available signal is still pending and must be consumed.
    fn release_frame_slot(&mut self, image_acquired: bool) -> Result<()>;

    fn wait_idle(&self) -> Result<()>;

    /// Acquire the next frame. Blocks on the in-flight gate.
    fn acquire_frame(&mut self) -> Result<Frame<'_, Self>>
    where
        Self: Sized,
    {
        frame::acquire(self)
    }
}

// Vulkan rendering context
//
// Owns everything a window needs to be drawn into: device, render pass,
// swapchain, one command buffer and one sync set. Fields are declared in
// the order they are torn down.

use anyhow::{Context, Result};
use ash::vk;
use std::path::Path;
use std::sync::Arc;

use super::pipeline::{self, Pipeline};
use super::shader;
use super::swapchain::{self, Swapchain};
use super::sync::FrameSync;
use super::VulkanDevice;
use crate::context::{Command, PipelineDesc, RenderContext};
use crate::error::ContextError;
use crate::window::RenderWindow;

/// Settings fixed at attach time
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub app_name: String,
    pub enable_validation: bool,
    /// Used when the surface supports it, FIFO otherwise
    pub present_mode: vk::PresentModeKHR,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            app_name: "Plonk".to_string(),
            enable_validation: cfg!(debug_assertions),
            present_mode: vk::PresentModeKHR::FIFO,
        }
    }
}

/// The context's single command buffer. Not `Clone`: whoever holds it is
/// the only one recording.
#[derive(Debug)]
pub struct CommandBuffer(vk::CommandBuffer);

pub struct VulkanContext {
    sync: FrameSync,
    /// `None` while a frame is recording
    command_buffer: Option<CommandBuffer>,
    command_pool: vk::CommandPool,
    swapchain: Swapchain,
    render_pass: vk::RenderPass,
    device: Arc<VulkanDevice>,
    window: Arc<dyn RenderWindow>,
}

impl VulkanContext {
    /// Connect to the GPU and build everything needed to draw into `window`
    pub fn attach(window: Arc<dyn RenderWindow>, options: &ContextOptions) -> Result<Self> {
        let device = VulkanDevice::new(&options.app_name, options.enable_validation, window.as_ref())?;

        let format = swapchain::choose_surface_format(&device.surface_formats()?)
            .context("No suitable surface format")?;
        let present_mode =
            swapchain::choose_present_mode(&device.surface_present_modes()?, options.present_mode);

        log::info!("Surface format: {:?} / {:?}", format.format, format.color_space);
        log::info!("Present mode: {:?}", present_mode);

        let render_pass = pipeline::create_render_pass(&device, format.format)?;

        let swapchain = match Swapchain::new(device.clone(), render_pass, format, present_mode, window.size()) {
            Ok(swapchain) => swapchain,
            Err(e) => {
                unsafe { device.device.destroy_render_pass(render_pass, None) };
                return Err(e);
            }
        };

        let (command_pool, command_buffer) = match Self::create_commands(&device) {
            Ok(commands) => commands,
            Err(e) => {
                drop(swapchain);
                unsafe { device.device.destroy_render_pass(render_pass, None) };
                return Err(e);
            }
        };

        let sync = match FrameSync::new(&device) {
            Ok(sync) => sync,
            Err(e) => {
                drop(swapchain);
                unsafe {
                    device.device.destroy_command_pool(command_pool, None);
                    device.device.destroy_render_pass(render_pass, None);
                }
                return Err(e);
            }
        };

        log::info!("Rendering context ready");

        Ok(Self {
            sync,
            command_buffer: Some(CommandBuffer(command_buffer)),
            command_pool,
            swapchain,
            render_pass,
            device,
            window,
        })
    }

    fn create_commands(device: &VulkanDevice) -> Result<(vk::CommandPool, vk::CommandBuffer)> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(device.graphics_queue_family);

        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        match unsafe { device.device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => Ok((command_pool, buffers[0])),
            Err(e) => {
                unsafe { device.device.destroy_command_pool(command_pool, None) };
                Err(e).context("Failed to allocate command buffer")
            }
        }
    }

    pub fn format(&self) -> vk::Format {
        self.swapchain.format.format
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.device.graphics_queue_family
    }

    pub fn present_queue_family(&self) -> u32 {
        self.device.present_queue_family
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }
}

impl RenderContext for VulkanContext {
    type Shader = vk::ShaderModule;
    type Pipeline = Pipeline;
    type Commands = CommandBuffer;

    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    fn swapchain_size(&self) -> vk::Extent2D {
        self.swapchain.built_for
    }

    fn window_size(&self) -> vk::Extent2D {
        self.window.size()
    }

    fn swapchain_image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    fn rebuild_swapchain(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.swapchain.rebuild(self.window.size())
    }

    fn load_shader(&self, path: &Path) -> Result<vk::ShaderModule> {
        shader::load_shader(&self.device, path)
    }

    fn destroy_shader(&self, shader: vk::ShaderModule) {
        unsafe { self.device.device.destroy_shader_module(shader, None) };
    }

    fn create_pipeline(&self, desc: &PipelineDesc<vk::ShaderModule>) -> Result<Pipeline> {
        pipeline::create_graphics_pipeline(&self.device, self.render_pass, desc)
    }

    fn destroy_pipeline(&self, pipeline: Pipeline) {
        pipeline::destroy_pipeline(&self.device, pipeline);
    }

    fn wait_for_frame_slot(&mut self) -> Result<()> {
        self.sync.wait_and_reset(&self.device.device)
    }

    fn acquire_image(&mut self) -> Result<u32> {
        match self.swapchain.acquire_next_image(self.sync.image_available) {
            Err(e) if e.downcast_ref::<ContextError>() == Some(&ContextError::SwapchainOutOfDate) => {
                // Surface changed between the resize check and acquire.
                // Nothing was signaled, so rebuild and try once more.
                log::debug!("Swapchain out of date on acquire, rebuilding");
                self.rebuild_swapchain()?;
                self.swapchain.acquire_next_image(self.sync.image_available)
            }
            result => result,
        }
    }

    fn begin_commands(&mut self, image_index: u32) -> Result<CommandBuffer> {
        let commands = self.command_buffer.take().ok_or(ContextError::FrameInFlight)?;
        let cmd = commands.0;
        let device = &self.device.device;

        let framebuffer = match self.swapchain.framebuffers.get(image_index as usize) {
            Some(&framebuffer) => framebuffer,
            None => {
                self.command_buffer = Some(commands);
                anyhow::bail!("Swapchain returned image {} out of range", image_index);
            }
        };

        let begin = unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .context("Failed to reset command buffer")
                .and_then(|_| {
                    let begin_info = vk::CommandBufferBeginInfo::builder()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                    device
                        .begin_command_buffer(cmd, &begin_info)
                        .context("Failed to begin command buffer")
                })
        };
        if let Err(e) = begin {
            self.command_buffer = Some(commands);
            return Err(e);
        }

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
        }

        Ok(commands)
    }

    fn record(&self, commands: &mut CommandBuffer, command: Command<'_, Pipeline>) {
        let cmd = commands.0;
        let device = &self.device.device;

        unsafe {
            match command {
                Command::BindPipeline(pipeline) => {
                    device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
                }
                Command::SetViewport(extent) => {
                    let viewport = vk::Viewport {
                        x: 0.0,
                        y: 0.0,
                        width: extent.width as f32,
                        height: extent.height as f32,
                        min_depth: 0.0,
                        max_depth: 1.0,
                    };
                    device.cmd_set_viewport(cmd, 0, &[viewport]);
                }
                Command::SetScissor(extent) => {
                    let scissor = vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent,
                    };
                    device.cmd_set_scissor(cmd, 0, &[scissor]);
                }
                Command::PushConstants { pipeline, stages, bytes } => {
                    device.cmd_push_constants(cmd, pipeline.layout, stages, 0, bytes);
                }
                Command::Draw {
                    vertex_count,
                    instance_count,
                } => {
                    device.cmd_draw(cmd, vertex_count, instance_count, 0, 0);
                }
            }
        }
    }

    fn submit(&mut self, commands: CommandBuffer) -> Result<()> {
        let cmd = commands.0;
        // Back in the context before anything can fail
        self.command_buffer = Some(commands);

        let device = &self.device.device;

        unsafe {
            device.cmd_end_render_pass(cmd);
            device
                .end_command_buffer(cmd)
                .context("Failed to end command buffer")?;
        }

        let wait_semaphores = [self.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [self.sync.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device
                .queue_submit(self.device.graphics_queue, &[submit_info], self.sync.in_flight_fence)
                .context("Failed to submit draw command buffer")?;
        }

        Ok(())
    }

    fn queue_present(&mut self, image_index: u32) -> Result<()> {
        self.swapchain
            .present(self.device.present_queue, image_index, self.sync.render_finished)
    }

    fn release_frame_slot(&mut self, image_acquired: bool) -> Result<()> {
        // An empty submission signals the fence once the queue drains. When an
        // image was acquired it also consumes the pending image-available signal.
        let wait_semaphores = [self.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];

        let mut submit_info = vk::SubmitInfo::builder();
        if image_acquired {
            submit_info = submit_info
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages);
        }

        unsafe {
            self.device
                .device
                .queue_submit(self.device.graphics_queue, &[submit_info.build()], self.sync.in_flight_fence)
                .context("Failed to release frame slot")
        }
    }

    fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::info!("Destroying rendering context...");

        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during teardown: {:?}", e);
        }

        unsafe {
            self.sync.destroy(&self.device.device);
            // Frees the command buffer with it
            self.device.device.destroy_command_pool(self.command_pool, None);
        }
        self.command_buffer = None;

        self.swapchain.release();

        unsafe {
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
        // Device (and with it surface and instance) goes when the last Arc drops
    }
}

// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// Viewport and scissor are dynamic, so nothing here depends on the window size
// and the pipeline survives swapchain rebuilds.

use anyhow::{Context, Result};
use ash::vk;

use super::VulkanDevice;
use crate::context::PipelineDesc;

/// State set per command buffer instead of baked into the pipeline
pub const DYNAMIC_STATES: [vk::DynamicState; 2] = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

/// Pipeline plus the layout its push constants are pushed through
#[derive(Debug)]
pub struct Pipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

/// Create a render pass with a single color attachment that is cleared on
/// load and handed to the presentation engine at the end
pub fn create_render_pass(device: &VulkanDevice, format: vk::Format) -> Result<vk::RenderPass> {
    // Color attachment (the swapchain image)
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments)
        .build();

    // Wait for the acquired image before writing color
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build();

    let attachments = &[color_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    let render_pass = unsafe {
        device
            .device
            .create_render_pass(&render_pass_info, None)
            .context("Failed to create render pass")?
    };

    log::info!("Render pass created");
    Ok(render_pass)
}

/// Create one framebuffer per swapchain image view
pub fn create_framebuffers(
    device: &VulkanDevice,
    image_views: &[vk::ImageView],
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    let mut framebuffers = Vec::with_capacity(image_views.len());

    for &image_view in image_views {
        let attachments = &[image_view];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        match unsafe { device.device.create_framebuffer(&framebuffer_info, None) } {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(e) => {
                for framebuffer in framebuffers {
                    unsafe { device.device.destroy_framebuffer(framebuffer, None) };
                }
                return Err(e).context("Failed to create framebuffer");
            }
        }
    }

    Ok(framebuffers)
}

/// Fill mode, no culling, clockwise front face
pub fn rasterization_state() -> vk::PipelineRasterizationStateCreateInfo {
    vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false)
        .build()
}

/// Opaque output: blending off, all channels written
pub fn color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .src_color_blend_factor(vk::BlendFactor::ONE)
        .dst_color_blend_factor(vk::BlendFactor::ZERO)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .build()
}

/// Build the draw pipeline: no vertex input, dynamic viewport/scissor, no
/// depth, one push-constant range
pub fn create_graphics_pipeline(
    device: &VulkanDevice,
    render_pass: vk::RenderPass,
    desc: &PipelineDesc<vk::ShaderModule>,
) -> Result<Pipeline> {
    let entry_point = c"main";

    let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::VERTEX)
        .module(desc.vertex_shader)
        .name(entry_point)
        .build();

    let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
        .stage(vk::ShaderStageFlags::FRAGMENT)
        .module(desc.fragment_shader)
        .name(entry_point)
        .build();

    let shader_stages = &[vert_stage, frag_stage];

    // Geometry comes from gl_VertexIndex, no buffers bound
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Counts only, the values are set per frame
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&DYNAMIC_STATES);

    let rasterizer = rasterization_state();

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .min_sample_shading(1.0);

    let color_blend_attachments = &[color_blend_attachment()];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(color_blend_attachments);

    let push_constant_range = vk::PushConstantRange::builder()
        .stage_flags(desc.push_constant_stages)
        .offset(0)
        .size(desc.push_constant_size)
        .build();

    let push_constant_ranges = &[push_constant_range];

    let layout_info = vk::PipelineLayoutCreateInfo::builder().push_constant_ranges(push_constant_ranges);

    let layout = unsafe {
        device
            .device
            .create_pipeline_layout(&layout_info, None)
            .context("Failed to create pipeline layout")?
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0)
        .base_pipeline_index(-1)
        .build();

    let pipelines = unsafe {
        device
            .device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    };

    match pipelines {
        Ok(pipelines) => {
            log::info!("Created pipeline");
            Ok(Pipeline {
                pipeline: pipelines[0],
                layout,
            })
        }
        Err((_, e)) => {
            unsafe { device.device.destroy_pipeline_layout(layout, None) };
            Err(e).context("Failed to create graphics pipeline")
        }
    }
}

pub fn destroy_pipeline(device: &VulkanDevice, pipeline: Pipeline) {
    unsafe {
        device.device.destroy_pipeline(pipeline.pipeline, None);
        device.device.destroy_pipeline_layout(pipeline.layout, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_and_scissor_are_dynamic() {
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::VIEWPORT));
        assert!(DYNAMIC_STATES.contains(&vk::DynamicState::SCISSOR));
    }

    #[test]
    fn test_rasterization_state() {
        let state = rasterization_state();
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(state.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(state.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(state.line_width, 1.0);
        assert_eq!(state.rasterizer_discard_enable, vk::FALSE);
    }

    #[test]
    fn test_color_output_is_not_blended() {
        let attachment = color_blend_attachment();
        assert_eq!(attachment.blend_enable, vk::FALSE);
        assert_eq!(attachment.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}

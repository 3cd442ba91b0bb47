// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen, plus
// one view and one framebuffer per image. Everything size-dependent lives
// here so a resize is a single release + build.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::pipeline;
use super::VulkanDevice;
use crate::error::ContextError;

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub loader: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub format: vk::SurfaceFormatKHR,
    /// Size of the presentable images
    pub extent: vk::Extent2D,
    /// Window size the chain was built for
    pub built_for: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    render_pass: vk::RenderPass,
    device: Arc<VulkanDevice>,
}

impl Swapchain {
    /// Build the chain for a window of `size`. `render_pass` must outlive
    /// the swapchain; its framebuffers are created against it.
    pub fn new(
        device: Arc<VulkanDevice>,
        render_pass: vk::RenderPass,
        format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        size: vk::Extent2D,
    ) -> Result<Self> {
        let loader = ash::extensions::khr::Swapchain::new(&device.instance, &device.device);

        let mut swapchain = Self {
            swapchain: vk::SwapchainKHR::null(),
            loader,
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            format,
            extent: vk::Extent2D::default(),
            built_for: size,
            present_mode,
            render_pass,
            device,
        };

        swapchain.build(size)?;
        Ok(swapchain)
    }

    /// Release everything and build again for `size`
    pub fn rebuild(&mut self, size: vk::Extent2D) -> Result<()> {
        log::debug!(
            "Rebuilding swapchain: {}x{} -> {}x{}",
            self.built_for.width,
            self.built_for.height,
            size.width,
            size.height
        );

        self.release();
        self.build(size)
    }

    fn build(&mut self, size: vk::Extent2D) -> Result<()> {
        let caps = self.device.surface_capabilities()?;
        let extent = choose_extent(&caps, size);
        let image_count = choose_image_count(&caps);

        log::info!("Creating swapchain: {}x{}", extent.width, extent.height);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.device.surface.surface)
            .min_image_count(image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true);

        self.swapchain = unsafe { self.loader.create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;
        self.images = unsafe { self.loader.get_swapchain_images(self.swapchain) }
            .context("Failed to get swapchain images")?;

        log::info!("Created swapchain with {} images", self.images.len());

        // Views are pushed one by one so release() can clean up a partial build
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = unsafe { self.device.device.create_image_view(&create_info, None) }
                .context("Failed to create image view")?;
            self.image_views.push(view);
        }

        self.framebuffers =
            pipeline::create_framebuffers(&self.device, &self.image_views, self.render_pass, extent)?;

        self.extent = extent;
        self.built_for = size;
        Ok(())
    }

    /// Destroy framebuffers, views and the swapchain. Safe to call twice.
    pub fn release(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.image_views.drain(..) {
                self.device.device.destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
        self.images.clear();
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Acquire next image for rendering, waiting as long as it takes.
    /// Fails with [`ContextError::SwapchainOutOfDate`] when the chain must be
    /// rebuilt first.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<u32> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };

        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::debug!("Swapchain suboptimal on acquire");
                }
                Ok(index)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(ContextError::SwapchainOutOfDate.into()),
            Err(e) => Err(e).context("Failed to acquire swapchain image"),
        }
    }

    /// Present rendered image to screen
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<()> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(_) => Ok(()),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                // The next resize check rebuilds if the window really changed
                log::warn!("Swapchain out of date on present");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to present swapchain image"),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.release();
    }
}

/// Prefer 8-bit BGRA sRGB, otherwise whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// The preferred mode if the surface supports it, FIFO otherwise
/// (FIFO is always supported)
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if modes.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the window size clamped to the surface
/// limits when the surface leaves it up to us
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, size: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: size
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: size
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 = no maximum)
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        caps.max_image_count
    } else {
        image_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn caps(min_images: u32, max_images: u32, current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: current,
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_bgra_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[1]));
    }

    #[test]
    fn test_falls_back_to_first_format() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(choose_surface_format(&formats), Some(formats[0]));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_follows_surface_when_defined() {
        let caps = caps(2, 3, extent(800, 600));
        assert_eq!(choose_extent(&caps, extent(1024, 768)), extent(800, 600));
    }

    #[test]
    fn test_extent_clamps_window_size_when_undefined() {
        let caps = caps(2, 3, extent(u32::MAX, u32::MAX));
        assert_eq!(choose_extent(&caps, extent(1024, 768)), extent(1024, 768));
        assert_eq!(choose_extent(&caps, extent(9000, 0)), extent(4096, 1));
    }

    #[test]
    fn test_image_count() {
        assert_eq!(choose_image_count(&caps(2, 3, extent(1, 1))), 3);
        assert_eq!(choose_image_count(&caps(3, 3, extent(1, 1))), 3);
        assert_eq!(choose_image_count(&caps(2, 0, extent(1, 1))), 3);
    }
}

// Synchronization primitives
//
// One set per context: a single frame is in flight at any time.

use anyhow::{Context, Result};
use ash::vk;

use super::VulkanDevice;

/// Semaphore/fence triple gating one frame of GPU work
pub struct FrameSync {
    /// Signaled by the presentation engine when the acquired image is usable
    pub image_available: vk::Semaphore,
    /// Signaled by the graphics queue when the frame's commands are done
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &VulkanDevice) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        unsafe {
            Ok(Self {
                image_available: device
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .context("Failed to create image available semaphore")?,
                render_finished: device
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .context("Failed to create render finished semaphore")?,
                in_flight_fence: device
                    .device
                    .create_fence(&fence_info, None)
                    .context("Failed to create in-flight fence")?,
            })
        }
    }

    /// Block (unbounded) until the GPU retires the previous frame, then reset
    /// the fence for the next submission.
    pub fn wait_and_reset(&self, device: &ash::Device) -> Result<()> {
        unsafe {
            device
                .wait_for_fences(&[self.in_flight_fence], true, u64::MAX)
                .context("Failed to wait for in-flight fence")?;
            device
                .reset_fences(&[self.in_flight_fence])
                .context("Failed to reset in-flight fence")?;
        }
        Ok(())
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

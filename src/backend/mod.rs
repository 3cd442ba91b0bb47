// Backend module - Vulkan implementation of the rendering context
//
// Design: Thin wrapper around ash, one file per Vulkan object family

pub mod context;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use context::{CommandBuffer, ContextOptions, VulkanContext};
pub use device::VulkanDevice;
pub use swapchain::Swapchain;

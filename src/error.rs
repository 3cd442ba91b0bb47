// Context error types
//
// Conditions a caller may want to tell apart. Everything else travels as
// anyhow context strings.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// Instance enumerated zero physical devices
    #[error("No Vulkan-capable GPU found")]
    NoAdapter,

    /// No queue family advertises graphics support
    #[error("GPU has no graphics-capable queue family")]
    NoGraphicsQueue,

    /// No queue family can present to the window surface
    #[error("GPU has no queue family that can present to this surface")]
    NoPresentQueue,

    /// Window system we cannot create a surface for
    #[error("Unsupported window system: {0}")]
    UnsupportedWindow(&'static str),

    /// The surface changed and the swapchain no longer matches it
    #[error("Swapchain out of date")]
    SwapchainOutOfDate,

    /// The command buffer is still owned by an unpresented frame
    #[error("A frame is already in flight")]
    FrameInFlight,
}

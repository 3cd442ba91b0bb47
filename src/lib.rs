// Plonk - minimal Vulkan rendering context and frame lifecycle
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  Renderer (pipeline, push constants, draw loop)                 │
// │    └── Frame (acquire → record → present, exactly once)         │
// │          └── RenderContext (VulkanContext in production)        │
// │                └── Device + Surface + Swapchain + Sync          │
// └─────────────────────────────────────────────────────────────────┘

pub mod backend;
pub mod camera;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod push_constants;
pub mod renderer;
pub mod window;

#[cfg(test)]
mod testing;

pub use backend::{ContextOptions, VulkanContext};
pub use camera::Camera;
pub use config::Config;
pub use context::{Command, PipelineDesc, RenderContext};
pub use error::ContextError;
pub use frame::Frame;
pub use push_constants::PushConstants;
pub use renderer::{Renderer, ShaderPaths};
pub use window::RenderWindow;

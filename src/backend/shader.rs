// Shader module loading
//
// Vulkan consumes SPIR-V bytecode. Files are read whole, validated as
// SPIR-V words and turned into immutable shader modules.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::VulkanDevice;

/// Decode SPIR-V bytes into 32-bit words.
///
/// Rejects input whose length is not a multiple of 4 or that lacks the
/// SPIR-V magic number; byte-swapped modules are converted to host order.
pub fn spirv_words(code: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(code)).context("Invalid SPIR-V bytecode")
}

/// Create a shader module from SPIR-V bytes
pub fn create_shader_module(device: &VulkanDevice, code: &[u8]) -> Result<vk::ShaderModule> {
    let words = spirv_words(code)?;
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

    unsafe {
        device
            .device
            .create_shader_module(&create_info, None)
            .context("Failed to create shader module")
    }
}

/// Read a compiled shader from disk and create its module
pub fn load_shader(device: &VulkanDevice, path: &Path) -> Result<vk::ShaderModule> {
    log::info!("Opening shader: {}", path.display());

    let code = std::fs::read(path)
        .with_context(|| format!("Failed to open shader {}", path.display()))?;
    let module = create_shader_module(device, &code)
        .with_context(|| format!("Failed to load shader {}", path.display()))?;

    log::info!("Shader loaded: {}", path.display());
    Ok(module)
}

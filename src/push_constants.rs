// Push constants - per-draw parameters for the fragment shader
//
// Binary contract with the `PushConstants` block in shaders/simple.frag.
// The std430 layout puts each vec3 on a 16-byte boundary, hence the padding.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};

use crate::camera::Camera;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
    pub screen_size: [f32; 2],
    _pad0: [f32; 2],
    pub position: [f32; 3],
    _pad1: f32,
    pub direction: [f32; 3],
    pub time: f32,
}

// Layout drift is a build error, not a rendering bug.
const _: () = assert!(size_of::<PushConstants>() == 48);
const _: () = assert!(offset_of!(PushConstants, screen_size) == 0);
const _: () = assert!(offset_of!(PushConstants, position) == 16);
const _: () = assert!(offset_of!(PushConstants, direction) == 32);
const _: () = assert!(offset_of!(PushConstants, time) == 44);

impl PushConstants {
    /// Size of the push-constant range in the pipeline layout
    pub const SIZE: u32 = size_of::<Self>() as u32;

    /// Stages that read the block
    pub const STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::FRAGMENT;

    pub fn new(extent: vk::Extent2D, camera: &Camera, time: f32) -> Self {
        Self {
            screen_size: [extent.width as f32, extent.height as f32],
            position: camera.position.to_array(),
            direction: camera.direction.to_array(),
            time,
            ..Self::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

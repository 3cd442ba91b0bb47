// Window collaborator
//
// The context only needs the live size and the native handles for the
// one-time surface creation.

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

pub trait RenderWindow: HasRawWindowHandle + HasRawDisplayHandle {
    /// Current drawable size in physical pixels
    fn size(&self) -> vk::Extent2D;

    fn width(&self) -> u32 {
        self.size().width
    }

    fn height(&self) -> u32 {
        self.size().height
    }
}

impl RenderWindow for winit::window::Window {
    fn size(&self) -> vk::Extent2D {
        let size = self.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}

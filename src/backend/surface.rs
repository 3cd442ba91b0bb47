// Surface - the window's presentation target
//
// Instance extensions and surface creation depend on the window system the
// display handle belongs to; ash-window knows the per-platform details.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::{vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle};
use std::ffi::c_char;

use crate::error::ContextError;
use crate::window::RenderWindow;

/// Instance extensions needed to create a surface on `display`
pub fn required_extensions(display: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    match ash_window::enumerate_required_extensions(display) {
        Ok(extensions) => Ok(extensions.to_vec()),
        Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT) => {
            Err(ContextError::UnsupportedWindow(display_name(&display)).into())
        }
        Err(e) => Err(e).context("Failed to enumerate surface extensions"),
    }
}

fn display_name(display: &RawDisplayHandle) -> &'static str {
    match display {
        RawDisplayHandle::Windows(_) => "Win32",
        RawDisplayHandle::Xlib(_) => "Xlib",
        RawDisplayHandle::Xcb(_) => "XCB",
        RawDisplayHandle::Wayland(_) => "Wayland",
        RawDisplayHandle::AppKit(_) => "AppKit",
        RawDisplayHandle::UiKit(_) => "UIKit",
        RawDisplayHandle::Android(_) => "Android",
        RawDisplayHandle::Web(_) => "Web",
        RawDisplayHandle::Orbital(_) => "Orbital",
        RawDisplayHandle::Haiku(_) => "Haiku",
        RawDisplayHandle::Gbm(_) => "GBM",
        RawDisplayHandle::Drm(_) => "DRM",
        _ => "unknown",
    }
}

/// Window surface plus the loader that destroys it
pub struct Surface {
    pub surface: vk::SurfaceKHR,
    pub loader: khr::Surface,
}

impl Surface {
    pub fn new(entry: &Entry, instance: &ash::Instance, window: &dyn RenderWindow) -> Result<Self> {
        let display = window.raw_display_handle();

        let surface = unsafe {
            ash_window::create_surface(entry, instance, display, window.raw_window_handle(), None)
        };
        let surface = match surface {
            Ok(surface) => surface,
            Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT) => {
                return Err(ContextError::UnsupportedWindow(display_name(&display)).into());
            }
            Err(e) => return Err(e).context("Failed to create window surface"),
        };
        let loader = khr::Surface::new(entry, instance);

        log::info!("Created window surface");
        Ok(Self { surface, loader })
    }

    /// # Safety
    /// No swapchain created from this surface may still exist.
    pub unsafe fn destroy(&self) {
        self.loader.destroy_surface(self.surface, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{WaylandDisplayHandle, WebDisplayHandle, XlibDisplayHandle};
    use std::ffi::CStr;

    fn names(extensions: &[*const c_char]) -> Vec<&'static CStr> {
        extensions
            .iter()
            .map(|&p| unsafe { CStr::from_ptr(p) })
            .collect()
    }

    #[test]
    fn test_xlib_needs_surface_and_xlib_surface() {
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::empty());
        let extensions = required_extensions(display).unwrap();
        assert_eq!(
            names(&extensions),
            vec![khr::Surface::name(), khr::XlibSurface::name()]
        );
    }

    #[test]
    fn test_wayland_needs_wayland_surface() {
        let display = RawDisplayHandle::Wayland(WaylandDisplayHandle::empty());
        let extensions = required_extensions(display).unwrap();
        assert!(names(&extensions).contains(&khr::WaylandSurface::name()));
    }

    #[test]
    fn test_unsupported_display_is_typed_error() {
        let display = RawDisplayHandle::Web(WebDisplayHandle::empty());
        let err = required_extensions(display).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContextError>(),
            Some(&ContextError::UnsupportedWindow("Web"))
        );
    }
}

// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with the window's surface extensions (+ validation)
// - Window surface
// - Physical device selection (first enumerated adapter)
// - Graphics and present queue families (first match each, scanned independently)
// - Logical device + queue creation

use anyhow::{Context, Result};
use ash::{vk, Entry};
use std::ffi::{CStr, CString};
use std::sync::Arc;

use raw_window_handle::HasRawDisplayHandle;

use super::surface::{self, Surface};
use crate::error::ContextError;
use crate::window::RenderWindow;

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub surface: Surface,
    pub instance: ash::Instance,
    _entry: Entry,

    // Queue handles (may be the same queue)
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue: vk::Queue,
    pub present_queue_family: u32,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,

    pub properties: vk::PhysicalDeviceProperties,
}

impl VulkanDevice {
    /// Create the device connection for `window`
    ///
    /// # Arguments
    /// * `app_name` - Application name for debugging
    /// * `enable_validation` - Enable Vulkan validation layers (debug only)
    /// * `window` - Window the surface is created for
    pub fn new(
        app_name: &str,
        enable_validation: bool,
        window: &dyn RenderWindow,
    ) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Everything below is torn down again if a later step fails
        let mut unwind = Unwind::default();

        // Step 2: Create instance with the extensions this window system needs
        let mut extensions = surface::required_extensions(window.raw_display_handle())?;
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }
        let instance = Self::create_instance(&entry, app_name, &extensions, enable_validation)?;
        {
            let instance = instance.clone();
            unwind.push(move || unsafe { instance.destroy_instance(None) });
        }

        // Step 3: Setup debug messenger if validation enabled
        let debug_utils = if enable_validation {
            let (debug_utils, messenger) = Self::setup_debug_messenger(&entry, &instance)?;
            let loader = debug_utils.clone();
            unwind.push(move || unsafe { loader.destroy_debug_utils_messenger(messenger, None) });
            Some((debug_utils, messenger))
        } else {
            None
        };

        // Step 4: Create the window surface
        let surface = Surface::new(&entry, &instance, window)?;
        {
            let (loader, handle) = (surface.loader.clone(), surface.surface);
            unwind.push(move || unsafe { loader.destroy_surface(handle, None) });
        }

        // Step 5: Pick physical device (GPU) and queue families
        let physical_device = Self::pick_physical_device(&instance)?;
        let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let graphics_queue_family =
            first_graphics_family(&families).ok_or(ContextError::NoGraphicsQueue)?;

        let present_queue_family = first_present_family(families.len() as u32, |index| unsafe {
            surface
                .loader
                .get_physical_device_surface_support(physical_device, index, surface.surface)
                .unwrap_or(false)
        })
        .ok_or(ContextError::NoPresentQueue)?;

        log::info!(
            "Queue families: graphics={}, present={}",
            graphics_queue_family,
            present_queue_family
        );

        // Step 6: Create logical device (last fallible step)
        let device = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_queue_family,
            present_queue_family,
        )?;
        unwind.disarm();

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_queue_family, 0) };

        // Step 7: Cache device properties
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        Ok(Arc::new(Self {
            device,
            physical_device,
            surface,
            instance,
            _entry: entry,
            graphics_queue,
            graphics_queue_family,
            present_queue,
            present_queue_family,
            debug_utils,
            properties,
        }))
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        extensions: &[*const std::ffi::c_char],
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = CString::new("Plonk")?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 0, 1))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 0, 1))
            .api_version(vk::API_VERSION_1_3);

        // Validation layers
        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        log::info!("Vulkan instance created");
        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to create debug messenger")?;

        Ok((debug_utils, messenger))
    }

    /// First enumerated adapter wins, no scoring
    fn pick_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        log::info!("Found {} device(s)", devices.len());

        devices.first().copied().ok_or_else(|| ContextError::NoAdapter.into())
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
        present_queue_family: u32,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<_> = unique_families(graphics_queue_family, present_queue_family)
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        // Required device extensions
        let extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        log::info!("Logical device created");
        Ok(device)
    }

    /// Wait for device to be idle
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Failed to wait for device idle")?;
        Ok(())
    }

    pub fn surface_capabilities(&self) -> Result<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface
                .loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface.surface)
        }
        .context("Failed to query surface capabilities")
    }

    pub fn surface_formats(&self) -> Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface
                .loader
                .get_physical_device_surface_formats(self.physical_device, self.surface.surface)
        }
        .context("Failed to query surface formats")
    }

    pub fn surface_present_modes(&self) -> Result<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface
                .loader
                .get_physical_device_surface_present_modes(self.physical_device, self.surface.surface)
        }
        .context("Failed to query surface present modes")
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            self.device.destroy_device(None);
            self.surface.destroy();

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Destructors for a partially built device, run newest first on drop
#[derive(Default)]
struct Unwind(Vec<Box<dyn FnOnce()>>);

impl Unwind {
    fn push(&mut self, destroy: impl FnOnce() + 'static) {
        self.0.push(Box::new(destroy));
    }

    /// Construction finished; ownership moved into the device
    fn disarm(mut self) {
        self.0.clear();
    }
}

impl Drop for Unwind {
    fn drop(&mut self) {
        while let Some(destroy) = self.0.pop() {
            destroy();
        }
    }
}

/// Index of the first queue family advertising graphics support
pub fn first_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

/// Index of the first of `count` families for which `supports_present` holds
pub fn first_present_family(count: u32, mut supports_present: impl FnMut(u32) -> bool) -> Option<u32> {
    (0..count).find(|&index| supports_present(index))
}

fn unique_families(graphics: u32, present: u32) -> Vec<u32> {
    if graphics == present {
        vec![graphics]
    } else {
        vec![graphics, present]
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

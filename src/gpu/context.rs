//! Vulkan instance, device, and queue bootstrap.
//!
//! Selects one physical device exposing a graphics+present queue family and
//! a compute queue family (a dedicated compute family is preferred when the
//! device has one). Everything here is a fixed service to the frame engine;
//! no capability negotiation beyond the swapchain extension is performed.

use std::ffi::CStr;

use ash::{khr, vk, Device, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use crate::error::SetupError;

/// A device queue together with the family it was created from.
///
/// The family index is what ownership-transfer barriers are written against.
#[derive(Clone, Copy)]
pub struct QueueHandle {
    pub queue: vk::Queue,
    pub family: u32,
}

/// Owns the instance, surface, logical device and the two execution queues.
///
/// Dropped last by the engine; [`Drop`] destroys device, surface and
/// instance in that order.
pub struct GpuContext {
    pub entry: Entry,
    pub instance: Instance,
    pub surface_loader: khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical: vk::PhysicalDevice,
    pub memory_props: vk::PhysicalDeviceMemoryProperties,
    pub device: Device,
    pub graphics: QueueHandle,
    pub compute: QueueHandle,
}

impl GpuContext {
    /// Bring up Vulkan for the given window.
    pub fn new(window: &Window) -> Result<Self, SetupError> {
        let entry = unsafe { Entry::load()? };

        let display_handle = window.display_handle()?.as_raw();
        let window_handle = window.window_handle()?.as_raw();

        let app_name = c"plume";
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(1)
            .engine_name(app_name)
            .engine_version(1)
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = ash_window::enumerate_required_extensions(display_handle)
            .map_err(SetupError::api("vkEnumerateInstanceExtensionProperties"))?;

        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(required_extensions);
        let instance = unsafe { entry.create_instance(&instance_info, None) }
            .map_err(SetupError::api("vkCreateInstance"))?;

        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
        }
        .map_err(SetupError::api("vkCreateSurfaceKHR"))?;
        let surface_loader = khr::surface::Instance::new(&entry, &instance);

        let (physical, graphics_family, compute_family) =
            pick_device(&instance, &surface_loader, surface)?;

        let props = unsafe { instance.get_physical_device_properties(physical) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) };
        log::info!(
            "using device {:?} (graphics family {}, compute family {})",
            name,
            graphics_family,
            compute_family
        );

        let priorities = [1.0_f32];
        let mut queue_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_family)
            .queue_priorities(&priorities)];
        if compute_family != graphics_family {
            queue_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(compute_family)
                    .queue_priorities(&priorities),
            );
        }

        let device_extensions = [khr::swapchain::NAME.as_ptr()];
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&device_extensions);
        let device = unsafe { instance.create_device(physical, &device_info, None) }
            .map_err(SetupError::api("vkCreateDevice"))?;

        let graphics = QueueHandle {
            queue: unsafe { device.get_device_queue(graphics_family, 0) },
            family: graphics_family,
        };
        let compute = QueueHandle {
            queue: unsafe { device.get_device_queue(compute_family, 0) },
            family: compute_family,
        };

        let memory_props = unsafe { instance.get_physical_device_memory_properties(physical) };

        Ok(Self {
            entry,
            instance,
            surface_loader,
            surface,
            physical,
            memory_props,
            device,
            graphics,
            compute,
        })
    }

    /// Block until every queue on the device has finished all submitted work.
    pub fn wait_idle(&self) {
        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            log::error!("vkDeviceWaitIdle failed during drain: {}", e);
        }
    }
}

/// Pick the first physical device offering a graphics family with present
/// support plus any compute family, preferring a compute family distinct
/// from graphics so the two stages run on independent hardware queues.
fn pick_device(
    instance: &Instance,
    surface_loader: &khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32, u32), SetupError> {
    let devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(SetupError::api("vkEnumeratePhysicalDevices"))?;

    for physical in devices {
        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical) };

        let mut graphics = None;
        let mut compute_dedicated = None;
        let mut compute_any = None;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            let flags = family.queue_flags;

            if graphics.is_none() && flags.contains(vk::QueueFlags::GRAPHICS) {
                let present = unsafe {
                    surface_loader.get_physical_device_surface_support(physical, index, surface)
                }
                .unwrap_or(false);
                if present {
                    graphics = Some(index);
                }
            }
            if flags.contains(vk::QueueFlags::COMPUTE) {
                if !flags.contains(vk::QueueFlags::GRAPHICS) && compute_dedicated.is_none() {
                    compute_dedicated = Some(index);
                }
                if compute_any.is_none() {
                    compute_any = Some(index);
                }
            }
        }

        if let Some(graphics) = graphics {
            let compute = compute_dedicated
                .or(compute_any)
                .ok_or(SetupError::MissingQueue("compute"))?;
            return Ok((physical, graphics, compute));
        }
    }

    Err(SetupError::NoSuitableDevice)
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

//! Swapchain ownership: surface format/present-mode selection, image views,
//! acquire and present.
//!
//! The swapchain image count is where the pipeline depth N comes from: the
//! engine creates one frame slot, one ring buffer and one command list pair
//! per image.

use ash::{khr, vk, Device};

use crate::error::{FrameError, SetupError};
use crate::gpu::context::GpuContext;

/// The presentation side of the engine.
pub struct Swapchain {
    device: Device,
    loader: khr::swapchain::Device,
    raw: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    image_views: Vec<vk::ImageView>,
}

impl Swapchain {
    /// Create the swapchain for the context's surface.
    ///
    /// Present mode is fixed to IMMEDIATE (no vsync); surfaces that do not
    /// offer it fall back to FIFO, which every surface must support.
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Result<Self, SetupError> {
        let caps = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_capabilities(ctx.physical, ctx.surface)
        }
        .map_err(SetupError::api("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
        let formats = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_formats(ctx.physical, ctx.surface)
        }
        .map_err(SetupError::api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
        let modes = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_present_modes(ctx.physical, ctx.surface)
        }
        .map_err(SetupError::api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;

        let surface_format = formats
            .iter()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB
            })
            .copied()
            .unwrap_or(formats[0]);

        let present_mode = if modes.contains(&vk::PresentModeKHR::IMMEDIATE) {
            vk::PresentModeKHR::IMMEDIATE
        } else {
            log::warn!("IMMEDIATE present mode unavailable, falling back to FIFO");
            vk::PresentModeKHR::FIFO
        };

        let extent = if caps.current_extent.width != u32::MAX {
            caps.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
            }
        };

        let mut min_image_count = caps.min_image_count + 1;
        if caps.max_image_count != 0 {
            min_image_count = min_image_count.min(caps.max_image_count);
        }

        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface)
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let loader = khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let raw = unsafe { loader.create_swapchain(&swapchain_info, None) }
            .map_err(SetupError::api("vkCreateSwapchainKHR"))?;
        let images = unsafe { loader.get_swapchain_images(raw) }
            .map_err(SetupError::api("vkGetSwapchainImagesKHR"))?;

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { ctx.device.create_image_view(&view_info, None) }
                .map_err(SetupError::api("vkCreateImageView"))?;
            image_views.push(view);
        }

        log::info!(
            "swapchain: {} images, {:?}, {:?}, {}x{}",
            image_views.len(),
            surface_format.format,
            present_mode,
            extent.width,
            extent.height
        );

        Ok(Self {
            device: ctx.device.clone(),
            loader,
            raw,
            format: surface_format.format,
            extent,
            image_views,
        })
    }

    /// Number of presentation images; this is the pipeline depth N.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.image_views.len() as u32
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Viewport aspect ratio.
    #[inline]
    pub fn aspect(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Request the next presentation image, signaling `surface_acquired` on
    /// the device when the image is actually ready to be written.
    ///
    /// The host wait is unbounded; a surface that never delivers an image
    /// is indistinguishable from a hung device, which the engine does not
    /// recover from.
    pub fn acquire(&self, surface_acquired: vk::Semaphore) -> Result<u32, FrameError> {
        let (index, _suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.raw, u64::MAX, surface_acquired, vk::Fence::null())
        }
        .map_err(FrameError::Acquire)?;
        Ok(index)
    }

    /// Queue presentation of `image_index`, waiting on `render_finished`.
    pub fn present(
        &self,
        queue: vk::Queue,
        render_finished: vk::Semaphore,
        image_index: u32,
    ) -> Result<(), FrameError> {
        let wait_semaphores = [render_finished];
        let swapchains = [self.raw];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);
        unsafe { self.loader.queue_present(queue, &present_info) }
            .map_err(FrameError::Present)?;
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.raw, None);
        }
    }
}

/// One framebuffer per swapchain image, bound to the engine's render pass.
pub struct Framebuffers {
    device: Device,
    raw: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self, SetupError> {
        let mut raw = Vec::with_capacity(image_views.len());
        for &view in image_views {
            let attachments = [view];
            let info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { device.create_framebuffer(&info, None) }
                .map_err(SetupError::api("vkCreateFramebuffer"))?;
            raw.push(framebuffer);
        }
        Ok(Self {
            device: device.clone(),
            raw,
        })
    }

    #[inline]
    pub fn get(&self, image_index: u32) -> vk::Framebuffer {
        self.raw[image_index as usize]
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.raw {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}

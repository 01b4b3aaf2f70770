//! Command pools and per-slot command lists.

use ash::{vk, Device};

use crate::error::SetupError;

/// A command pool tied to one queue family.
pub struct CommandPool {
    device: Device,
    raw: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be individually re-recorded.
    pub fn new(device: &Device, queue_family: u32) -> Result<Self, SetupError> {
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let raw = unsafe { device.create_command_pool(&info, None) }
            .map_err(SetupError::api("vkCreateCommandPool"))?;
        Ok(Self {
            device: device.clone(),
            raw,
        })
    }

    /// Allocate `count` primary command buffers from this pool.
    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>, SetupError> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.raw)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { self.device.allocate_command_buffers(&info) }
            .map_err(SetupError::api("vkAllocateCommandBuffers"))
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees every buffer allocated from it.
            self.device.destroy_command_pool(self.raw, None);
        }
    }
}

/// All command lists the engine records: one compute list and one graphics
/// list per frame slot, plus the one-shot seed upload list.
pub struct CommandSets {
    pub compute_lists: Vec<vk::CommandBuffer>,
    pub graphics_lists: Vec<vk::CommandBuffer>,
    pub upload_list: vk::CommandBuffer,
    // Pools last: handles above are owned by them.
    _compute_pool: CommandPool,
    _graphics_pool: CommandPool,
}

impl CommandSets {
    pub fn new(
        device: &Device,
        compute_family: u32,
        graphics_family: u32,
        depth: u32,
    ) -> Result<Self, SetupError> {
        let compute_pool = CommandPool::new(device, compute_family)?;
        let graphics_pool = CommandPool::new(device, graphics_family)?;

        let mut compute_lists = compute_pool.allocate(depth + 1)?;
        let upload_list = compute_lists.pop().expect("allocated depth + 1 buffers");
        let graphics_lists = graphics_pool.allocate(depth)?;

        Ok(Self {
            compute_lists,
            graphics_lists,
            upload_list,
            _compute_pool: compute_pool,
            _graphics_pool: graphics_pool,
        })
    }
}

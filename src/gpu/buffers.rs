//! Device-local buffers and the particle buffer ring.

use ash::{vk, Device};

use crate::error::SetupError;
use crate::gpu::context::GpuContext;
use crate::particle::PARTICLE_STRIDE;

/// Alignment every device buffer size must satisfy; inline updates
/// (`vkCmdUpdateBuffer`) operate on whole words.
pub const BUFFER_SIZE_ALIGNMENT: u64 = 4;

/// Reject sizes the device would later fault on, at construction time.
pub fn validate_buffer_size(size: u64, alignment: u64) -> Result<(), SetupError> {
    if size == 0 || size % alignment != 0 {
        return Err(SetupError::UnalignedBuffer { size, alignment });
    }
    Ok(())
}

/// A buffer with its own device memory allocation.
pub struct DeviceBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl DeviceBuffer {
    pub fn new(
        device: &Device,
        memory_props: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self, SetupError> {
        validate_buffer_size(size, BUFFER_SIZE_ALIGNMENT)?;

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_info, None) }
            .map_err(SetupError::api("vkCreateBuffer"))?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = find_memory_type(memory_props, requirements.memory_type_bits, properties)
            .ok_or(SetupError::Api {
                call: "vkAllocateMemory",
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            })?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(result) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(SetupError::Api {
                    call: "vkAllocateMemory",
                    result,
                });
            }
        };

        if let Err(result) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(SetupError::Api {
                call: "vkBindBufferMemory",
                result,
            });
        }

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
        })
    }

    #[inline]
    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// First memory type satisfying both the requirement bits and the property
/// flags, if any.
fn find_memory_type(
    memory_props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_props.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && memory_props.memory_types[i as usize]
                .property_flags
                .contains(flags)
    })
}

/// N device-local particle buffers, one per frame in flight, rotated each
/// frame by the [`crate::rotation::RotationState`] law.
///
/// Exactly one buffer is being written by compute and one other read by
/// graphics at any time; the assignment is by index arithmetic, not locking.
pub struct ParticleRing {
    buffers: Vec<DeviceBuffer>,
    particle_count: u32,
}

impl ParticleRing {
    /// Allocate `depth` buffers, each large enough for the full particle set,
    /// usable as compute storage, seed-upload target and vertex source.
    pub fn allocate(ctx: &GpuContext, depth: u32, particle_count: u32) -> Result<Self, SetupError> {
        let size = PARTICLE_STRIDE * particle_count as u64;
        validate_buffer_size(size, BUFFER_SIZE_ALIGNMENT)?;

        let usage = vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST
            | vk::BufferUsageFlags::VERTEX_BUFFER;
        let buffers = (0..depth)
            .map(|_| {
                DeviceBuffer::new(
                    &ctx.device,
                    &ctx.memory_props,
                    size,
                    usage,
                    vk::MemoryPropertyFlags::DEVICE_LOCAL,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "particle ring: {} buffers of {} bytes ({} particles)",
            depth,
            size,
            particle_count
        );

        Ok(Self {
            buffers,
            particle_count,
        })
    }

    /// Ring depth N.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.buffers.len() as u32
    }

    #[inline]
    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// Buffer for a rotation index; indices wrap, so any frame index is valid.
    #[inline]
    pub fn buffer_at(&self, index: u32) -> vk::Buffer {
        self.buffers[(index % self.depth()) as usize].raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;

    #[test]
    fn test_size_validation() {
        assert!(validate_buffer_size(64, 4).is_ok());
        assert!(validate_buffer_size(0, 4).is_err());
        assert!(validate_buffer_size(63, 4).is_err());
    }

    #[test]
    fn test_particle_stride_is_word_aligned() {
        // Any whole number of particles satisfies the buffer alignment rule.
        assert_eq!(PARTICLE_STRIDE % BUFFER_SIZE_ALIGNMENT, 0);
        assert_eq!(PARTICLE_STRIDE, std::mem::size_of::<Particle>() as u64);
    }
}

//! Descriptor pool and the fixed per-slot binding pairs.
//!
//! Slot `i` binds source = ring[(i+N-1) mod N] at binding 0 and
//! destination = ring[i] at binding 1. The pairs are written once at setup
//! and never rebound; rotation happens by choosing which set to bind, not by
//! rewriting descriptors.

use ash::{vk, Device};

use crate::error::SetupError;
use crate::gpu::buffers::ParticleRing;

pub struct DescriptorSets {
    device: Device,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorSets {
    /// Allocate one descriptor set per ring slot and point each at its
    /// source/destination buffer pair.
    pub fn for_ring(
        device: &Device,
        set_layout: vk::DescriptorSetLayout,
        ring: &ParticleRing,
    ) -> Result<Self, SetupError> {
        let depth = ring.depth();

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(depth * 2)];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(depth)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(SetupError::api("vkCreateDescriptorPool"))?;

        let layouts = vec![set_layout; depth as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(result) => {
                unsafe { device.destroy_descriptor_pool(pool, None) };
                return Err(SetupError::Api {
                    call: "vkAllocateDescriptorSets",
                    result,
                });
            }
        };

        for slot in 0..depth {
            let source = ring.buffer_at(slot + depth - 1);
            let destination = ring.buffer_at(slot);
            let buffer_infos = [
                vk::DescriptorBufferInfo::default()
                    .buffer(source)
                    .offset(0)
                    .range(vk::WHOLE_SIZE),
                vk::DescriptorBufferInfo::default()
                    .buffer(destination)
                    .offset(0)
                    .range(vk::WHOLE_SIZE),
            ];
            // One write covering bindings 0 and 1; consecutive bindings of the
            // same type accept a single multi-element update.
            let write = vk::WriteDescriptorSet::default()
                .dst_set(sets[slot as usize])
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&buffer_infos);
            unsafe { device.update_descriptor_sets(&[write], &[]) };
        }

        Ok(Self {
            device: device.clone(),
            pool,
            sets,
        })
    }

    #[inline]
    pub fn get(&self, slot: u32) -> vk::DescriptorSet {
        self.sets[slot as usize]
    }
}

impl Drop for DescriptorSets {
    fn drop(&mut self) {
        unsafe {
            // Sets are pool-owned; destroying the pool releases them.
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

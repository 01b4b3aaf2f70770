//! Pass planning and command recording.
//!
//! Command lists are built in two steps. A *plan* is plain data derived from
//! the rotation law: which ring buffer a pass touches, the barrier access
//! pair that transfers its ownership between the queues, and the dispatch or
//! draw parameters. Planning is pure and idempotent: identical inputs yield
//! identical plans, so the rotation protocol is testable without a device.
//! A *recorder* then writes a plan into a command buffer.
//!
//! Barriers are scoped by-region and carry exactly one access-mask pair
//! each; anything broader would stall stages the protocol does not need
//! ordered.

use ash::{vk, Device};
use bytemuck::cast_slice;

use crate::camera::FrameParams;
use crate::gpu::buffers::ParticleRing;
use crate::particle::Particle;

/// The queue families the ring buffers shuttle between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
}

/// An ownership-transfer barrier on one ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierPlan {
    pub buffer_index: u32,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_family: u32,
    pub dst_family: u32,
}

/// The compute list for one slot: acquire the write buffer from the graphics
/// queue, then dispatch one invocation per particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputePassPlan {
    pub barrier: BarrierPlan,
    pub set_index: u32,
    pub group_count: [u32; 3],
}

/// The graphics list for one slot: acquire the read buffer from the compute
/// queue, then draw the full particle set as points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsPassPlan {
    pub barrier: BarrierPlan,
    pub vertex_buffer_index: u32,
    pub vertex_count: u32,
}

/// Plan the compute list for `slot`.
///
/// The barrier delays the compute shader's write until any prior vertex read
/// of the same buffer (graphics, one rotation earlier) has completed.
pub fn plan_compute_pass(
    slot: u32,
    depth: u32,
    particle_count: u32,
    workgroup_size: u32,
    families: QueueFamilies,
) -> ComputePassPlan {
    let slot = slot % depth;
    ComputePassPlan {
        barrier: BarrierPlan {
            buffer_index: slot,
            src_access: vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
            dst_access: vk::AccessFlags::SHADER_WRITE,
            src_stage: vk::PipelineStageFlags::VERTEX_INPUT,
            dst_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            src_family: families.graphics,
            dst_family: families.compute,
        },
        set_index: slot,
        group_count: [
            (particle_count + workgroup_size - 1) / workgroup_size,
            1,
            1,
        ],
    }
}

/// Plan the graphics list for `slot`.
///
/// Reads one buffer ahead of the compute write; the barrier delays vertex
/// attribute reads until the compute shader's write of that buffer has
/// completed.
pub fn plan_graphics_pass(
    slot: u32,
    depth: u32,
    particle_count: u32,
    families: QueueFamilies,
) -> GraphicsPassPlan {
    let read_index = (slot + 1) % depth;
    GraphicsPassPlan {
        barrier: BarrierPlan {
            buffer_index: read_index,
            src_access: vk::AccessFlags::SHADER_WRITE,
            dst_access: vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
            src_stage: vk::PipelineStageFlags::COMPUTE_SHADER,
            dst_stage: vk::PipelineStageFlags::VERTEX_INPUT,
            src_family: families.compute,
            dst_family: families.graphics,
        },
        vertex_buffer_index: read_index,
        vertex_count: particle_count,
    }
}

/// One inline-update command of the seed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedChunk {
    pub first_particle: u32,
    pub particle_count: u32,
    pub byte_offset: u64,
}

/// Split the particle array into transfer chunks no larger than
/// `chunk_limit` bytes, each a whole number of particles.
pub fn plan_seed_upload(particle_count: u32, stride: u64, chunk_limit: u64) -> Vec<SeedChunk> {
    let mut per_chunk = (chunk_limit / stride) as u32;
    if per_chunk == 0 {
        per_chunk = 1;
    }
    let mut chunks = Vec::new();
    let mut first = 0u32;
    while first < particle_count {
        let count = per_chunk.min(particle_count - first);
        chunks.push(SeedChunk {
            first_particle: first,
            particle_count: count,
            byte_offset: first as u64 * stride,
        });
        first += count;
    }
    chunks
}

fn buffer_barrier(plan: &BarrierPlan, buffer: vk::Buffer) -> vk::BufferMemoryBarrier<'static> {
    vk::BufferMemoryBarrier::default()
        .src_access_mask(plan.src_access)
        .dst_access_mask(plan.dst_access)
        .src_queue_family_index(plan.src_family)
        .dst_queue_family_index(plan.dst_family)
        .buffer(buffer)
        .offset(0)
        .size(vk::WHOLE_SIZE)
}

/// Record a compute plan. Recorded once per slot and resubmitted unchanged
/// every rotation, so the list allows simultaneous use.
pub fn record_compute_list(
    device: &Device,
    list: vk::CommandBuffer,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    set: vk::DescriptorSet,
    plan: &ComputePassPlan,
    ring: &ParticleRing,
) -> Result<(), vk::Result> {
    let begin = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
    unsafe {
        device.begin_command_buffer(list, &begin)?;
        device.cmd_bind_pipeline(list, vk::PipelineBindPoint::COMPUTE, pipeline);
        device.cmd_bind_descriptor_sets(
            list,
            vk::PipelineBindPoint::COMPUTE,
            layout,
            0,
            &[set],
            &[],
        );

        let barrier = buffer_barrier(&plan.barrier, ring.buffer_at(plan.barrier.buffer_index));
        device.cmd_pipeline_barrier(
            list,
            plan.barrier.src_stage,
            plan.barrier.dst_stage,
            vk::DependencyFlags::BY_REGION,
            &[],
            &[barrier],
            &[],
        );

        let [x, y, z] = plan.group_count;
        device.cmd_dispatch(list, x, y, z);
        device.end_command_buffer(list)?;
    }
    Ok(())
}

/// Everything a graphics recording needs besides the plan itself.
pub struct GraphicsRecordInfo<'a> {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    pub params: &'a FrameParams,
}

/// Record a graphics plan.
///
/// Re-recorded every frame because the target framebuffer changes with the
/// acquired image; the structure (barrier, bindings, draw) is fixed. The
/// barrier sits outside the render pass, as buffer barriers must.
pub fn record_graphics_list(
    device: &Device,
    list: vk::CommandBuffer,
    info: &GraphicsRecordInfo<'_>,
    plan: &GraphicsPassPlan,
    ring: &ParticleRing,
) -> Result<(), vk::Result> {
    let begin = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
    unsafe {
        device.begin_command_buffer(list, &begin)?;

        let barrier = buffer_barrier(&plan.barrier, ring.buffer_at(plan.barrier.buffer_index));
        device.cmd_pipeline_barrier(
            list,
            plan.barrier.src_stage,
            plan.barrier.dst_stage,
            vk::DependencyFlags::BY_REGION,
            &[],
            &[barrier],
            &[],
        );

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: info.clear_color,
            },
        }];
        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(info.render_pass)
            .framebuffer(info.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: info.extent,
            })
            .clear_values(&clear_values);
        device.cmd_begin_render_pass(list, &render_pass_begin, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(list, vk::PipelineBindPoint::GRAPHICS, info.pipeline);
        device.cmd_push_constants(
            list,
            info.layout,
            vk::ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(info.params),
        );
        device.cmd_bind_vertex_buffers(
            list,
            0,
            &[ring.buffer_at(plan.vertex_buffer_index)],
            &[0],
        );
        device.cmd_draw(list, plan.vertex_count, 1, 0, 0);
        device.cmd_end_render_pass(list);
        device.end_command_buffer(list)?;
    }
    Ok(())
}

/// Record the one-shot seed upload into `target`.
pub fn record_seed_upload(
    device: &Device,
    list: vk::CommandBuffer,
    target: vk::Buffer,
    particles: &[Particle],
    chunks: &[SeedChunk],
) -> Result<(), vk::Result> {
    let begin = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe {
        device.begin_command_buffer(list, &begin)?;
        for chunk in chunks {
            let first = chunk.first_particle as usize;
            let last = first + chunk.particle_count as usize;
            device.cmd_update_buffer(
                list,
                target,
                chunk.byte_offset,
                cast_slice(&particles[first..last]),
            );
        }
        device.end_command_buffer(list)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SEED_CHUNK_BYTES;
    use crate::particle::PARTICLE_STRIDE;

    const FAMILIES: QueueFamilies = QueueFamilies {
        graphics: 0,
        compute: 1,
    };

    #[test]
    fn test_compute_plan_targets_write_buffer() {
        let plan = plan_compute_pass(2, 3, 1000, 256, FAMILIES);
        assert_eq!(plan.barrier.buffer_index, 2);
        assert_eq!(plan.set_index, 2);
        assert_eq!(plan.group_count, [4, 1, 1]);
    }

    #[test]
    fn test_compute_barrier_transfers_graphics_to_compute() {
        let plan = plan_compute_pass(0, 3, 8, 8, FAMILIES);
        let barrier = plan.barrier;
        assert_eq!(barrier.src_access, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
        assert_eq!(barrier.dst_access, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(barrier.src_stage, vk::PipelineStageFlags::VERTEX_INPUT);
        assert_eq!(barrier.dst_stage, vk::PipelineStageFlags::COMPUTE_SHADER);
        assert_eq!(barrier.src_family, FAMILIES.graphics);
        assert_eq!(barrier.dst_family, FAMILIES.compute);
    }

    #[test]
    fn test_graphics_plan_reads_one_ahead() {
        for slot in 0..3 {
            let plan = plan_graphics_pass(slot, 3, 1000, FAMILIES);
            assert_eq!(plan.vertex_buffer_index, (slot + 1) % 3);
            assert_eq!(plan.barrier.buffer_index, plan.vertex_buffer_index);
            assert_eq!(plan.vertex_count, 1000);
        }
    }

    #[test]
    fn test_graphics_barrier_transfers_compute_to_graphics() {
        let barrier = plan_graphics_pass(0, 3, 8, FAMILIES).barrier;
        assert_eq!(barrier.src_access, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(barrier.dst_access, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
        assert_eq!(barrier.src_family, FAMILIES.compute);
        assert_eq!(barrier.dst_family, FAMILIES.graphics);
    }

    #[test]
    fn test_plans_are_idempotent() {
        for slot in 0..4 {
            assert_eq!(
                plan_compute_pass(slot, 4, 9999, 128, FAMILIES),
                plan_compute_pass(slot, 4, 9999, 128, FAMILIES)
            );
            assert_eq!(
                plan_graphics_pass(slot, 4, 9999, FAMILIES),
                plan_graphics_pass(slot, 4, 9999, FAMILIES)
            );
        }
    }

    #[test]
    fn test_compute_and_graphics_buffers_disjoint_per_frame() {
        for depth in 2..6 {
            for slot in 0..depth {
                let write = plan_compute_pass(slot, depth, 100, 64, FAMILIES);
                let read = plan_graphics_pass(slot, depth, 100, FAMILIES);
                assert_ne!(write.barrier.buffer_index, read.vertex_buffer_index);
            }
        }
    }

    #[test]
    fn test_single_buffer_plans_share_the_buffer() {
        // N = 1: no double buffering, the barriers alone serialize the stages.
        let write = plan_compute_pass(0, 1, 100, 64, FAMILIES);
        let read = plan_graphics_pass(0, 1, 100, FAMILIES);
        assert_eq!(write.barrier.buffer_index, 0);
        assert_eq!(read.vertex_buffer_index, 0);
    }

    #[test]
    fn test_dispatch_rounds_up_to_cover_all_particles() {
        let plan = plan_compute_pass(0, 2, 1000, 256, FAMILIES);
        assert_eq!(plan.group_count[0], 4);
        let exact = plan_compute_pass(0, 2, 1024, 256, FAMILIES);
        assert_eq!(exact.group_count[0], 4);
    }

    #[test]
    fn test_small_seed_fits_one_chunk() {
        let chunks = plan_seed_upload(8, PARTICLE_STRIDE, SEED_CHUNK_BYTES);
        assert_eq!(
            chunks,
            vec![SeedChunk {
                first_particle: 0,
                particle_count: 8,
                byte_offset: 0,
            }]
        );
    }

    #[test]
    fn test_seed_chunks_respect_limit_and_cover_everything() {
        let count = 100_000;
        let chunks = plan_seed_upload(count, PARTICLE_STRIDE, SEED_CHUNK_BYTES);
        let mut next = 0u32;
        for chunk in &chunks {
            assert_eq!(chunk.first_particle, next);
            assert_eq!(chunk.byte_offset, next as u64 * PARTICLE_STRIDE);
            assert!(chunk.particle_count as u64 * PARTICLE_STRIDE <= SEED_CHUNK_BYTES);
            next += chunk.particle_count;
        }
        assert_eq!(next, count);
    }

    #[test]
    fn test_oversized_record_still_makes_progress() {
        let chunks = plan_seed_upload(3, 100_000, SEED_CHUNK_BYTES);
        assert_eq!(chunks.len(), 3);
    }
}

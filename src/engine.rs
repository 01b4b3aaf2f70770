//! The frame engine: setup, the per-frame state machine, shutdown drain.
//!
//! One [`Engine`] owns every device resource and drives the loop
//!
//! ```text
//! WAIT_SLOT -> ACQUIRE_SURFACE -> SUBMIT_COMPUTE -> UPDATE_PARAMS
//!           -> SUBMIT_GRAPHICS -> PRESENT -> ADVANCE
//! ```
//!
//! The host blocks only at `WAIT_SLOT` (bounded by N frames of slack), at
//! the one-time seed upload and at the final drain. Ordering between the
//! compute writes and graphics reads of any one buffer is enforced entirely
//! on the device by the barriers and semaphores recorded into the command
//! lists.

use ash::vk;
use winit::window::Window;

use crate::camera::Camera;
use crate::clock::FrameClock;
use crate::config::{EngineConfig, SEED_CHUNK_BYTES};
use crate::error::{FrameError, SetupError};
use crate::gpu::buffers::ParticleRing;
use crate::gpu::commands::CommandSets;
use crate::gpu::context::GpuContext;
use crate::gpu::descriptors::DescriptorSets;
use crate::gpu::passes::{self, GraphicsRecordInfo, QueueFamilies};
use crate::gpu::pipeline::{
    ComputePipelineDesc, GraphicsPipelineDesc, Pipelines, SimulationShape, StageDesc,
};
use crate::gpu::shaders::ShaderModule;
use crate::gpu::swapchain::{Framebuffers, Swapchain};
use crate::gpu::sync::{Fence, FrameSlots};
use crate::particle::{seed_particles, PARTICLE_STRIDE};
use crate::rotation::RotationState;

/// The frame pipelining engine.
///
/// Device-owning fields are declared in release order; Rust drops fields in
/// declaration order, so the struct layout *is* the teardown sequence: slot
/// signals, command pools, descriptor pool, ring buffers, framebuffers,
/// pipelines, swapchain, and finally the device/surface/instance. [`Drop`]
/// drains in-flight work first, so nothing is destroyed while the GPU still
/// references it.
pub struct Engine {
    config: EngineConfig,
    rotation: RotationState,
    camera: Camera,
    clock: FrameClock,
    drained: bool,

    slots: FrameSlots,
    commands: CommandSets,
    descriptors: DescriptorSets,
    ring: ParticleRing,
    framebuffers: Framebuffers,
    pipelines: Pipelines,
    swapchain: Swapchain,
    context: GpuContext,
}

impl Engine {
    /// Create all device resources, seed the simulation and record the
    /// per-slot compute lists. After this returns the engine is ready for
    /// [`Engine::run_frame`].
    pub fn new(window: &Window, config: EngineConfig) -> Result<Self, SetupError> {
        config.validate()?;

        let context = GpuContext::new(window)?;
        let device = &context.device;

        let swapchain = Swapchain::new(&context, config.window_width, config.window_height)?;
        let depth = swapchain.image_count();

        // Shader modules only live until the pipelines are built.
        let simulate = ShaderModule::from_file(device, &config.shader_dir.join("simulate.comp.spv"))?;
        let vertex = ShaderModule::from_file(device, &config.shader_dir.join("particle.vert.spv"))?;
        let fragment = ShaderModule::from_file(device, &config.shader_dir.join("particle.frag.spv"))?;

        let pipelines = Pipelines::create(
            device,
            &ComputePipelineDesc {
                shader: StageDesc {
                    stage: vk::ShaderStageFlags::COMPUTE,
                    module: simulate.raw(),
                    entry: c"main",
                },
                shape: SimulationShape::new(config.particle_count, config.workgroup_size),
            },
            &GraphicsPipelineDesc {
                vertex: StageDesc {
                    stage: vk::ShaderStageFlags::VERTEX,
                    module: vertex.raw(),
                    entry: c"main",
                },
                fragment: StageDesc {
                    stage: vk::ShaderStageFlags::FRAGMENT,
                    module: fragment.raw(),
                    entry: c"main",
                },
                color_format: swapchain.format(),
                extent: swapchain.extent(),
            },
        )?;
        drop(simulate);
        drop(vertex);
        drop(fragment);

        let framebuffers = Framebuffers::new(
            device,
            pipelines.render_pass(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;

        let ring = ParticleRing::allocate(&context, depth, config.particle_count)?;
        let descriptors = DescriptorSets::for_ring(device, pipelines.set_layout(), &ring)?;
        let commands = CommandSets::new(
            device,
            context.compute.family,
            context.graphics.family,
            depth,
        )?;
        let slots = FrameSlots::create(device, depth, config.timeout_ns())?;

        let mut engine = Self {
            rotation: RotationState::new(depth),
            camera: Camera::new(),
            clock: FrameClock::new(),
            drained: false,
            slots,
            commands,
            descriptors,
            ring,
            framebuffers,
            pipelines,
            swapchain,
            context,
            config,
        };
        engine.upload_seed()?;
        engine.record_compute_lists()?;
        Ok(engine)
    }

    fn families(&self) -> QueueFamilies {
        QueueFamilies {
            graphics: self.context.graphics.family,
            compute: self.context.compute.family,
        }
    }

    /// One-time chunked upload of the initial particle state into the buffer
    /// frame 0's compute pass reads, blocking on a dedicated fence until the
    /// data has landed.
    fn upload_seed(&mut self) -> Result<(), SetupError> {
        let count = self.config.particle_count;
        let mut rng = rand::thread_rng();
        let particles = seed_particles(count, &mut rng);

        let chunks = passes::plan_seed_upload(count, PARTICLE_STRIDE, SEED_CHUNK_BYTES);
        log::info!("seeding {} particles in {} chunks", count, chunks.len());

        let target = self
            .ring
            .buffer_at(RotationState::seed_index(self.rotation.depth()));
        let device = &self.context.device;
        passes::record_seed_upload(device, self.commands.upload_list, target, &particles, &chunks)
            .map_err(SetupError::api("recording the seed upload"))?;

        let fence = Fence::new(device, false)?;
        let lists = [self.commands.upload_list];
        let submit = vk::SubmitInfo::default().command_buffers(&lists);
        unsafe {
            device.queue_submit(self.context.compute.queue, &[submit], fence.raw())
        }
        .map_err(SetupError::api("vkQueueSubmit"))?;
        fence
            .wait(self.config.timeout_ns())
            .map_err(SetupError::api("vkWaitForFences"))?;
        Ok(())
    }

    /// Record every slot's compute list once; they are resubmitted unchanged
    /// each rotation.
    fn record_compute_lists(&mut self) -> Result<(), SetupError> {
        let families = self.families();
        for slot in 0..self.rotation.depth() {
            let plan = passes::plan_compute_pass(
                slot,
                self.rotation.depth(),
                self.config.particle_count,
                self.config.workgroup_size,
                families,
            );
            passes::record_compute_list(
                &self.context.device,
                self.commands.compute_lists[slot as usize],
                self.pipelines.compute(),
                self.pipelines.compute_layout(),
                self.descriptors.get(slot),
                &plan,
                &self.ring,
            )
            .map_err(SetupError::api("recording a compute list"))?;
        }
        Ok(())
    }

    /// Number of frames in flight.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.rotation.depth()
    }

    /// Run one iteration of the frame state machine.
    ///
    /// Any error is fatal to the loop; the caller should stop calling
    /// `run_frame` and let the engine drain.
    pub fn run_frame(&mut self) -> Result<(), FrameError> {
        let slot = self.rotation.slot() as usize;
        let device = &self.context.device;

        // WAIT_SLOT: bound the host to N frames ahead and rearm the slot.
        self.slots.wait_and_reset(slot)?;

        // ACQUIRE_SURFACE: the semaphore fires device-side once the image is
        // actually writable.
        let image_index = self.swapchain.acquire(self.slots.surface_acquired(slot))?;

        // SUBMIT_COMPUTE: no submit-level dependencies; the in-list barrier
        // orders it against the graphics pass that read this buffer.
        let compute_lists = [self.commands.compute_lists[slot]];
        let compute_submit = vk::SubmitInfo::default().command_buffers(&compute_lists);
        unsafe {
            device.queue_submit(
                self.context.compute.queue,
                &[compute_submit],
                vk::Fence::null(),
            )
        }
        .map_err(|result| FrameError::Submit {
            queue: "compute",
            result,
        })?;

        // UPDATE_PARAMS: cheap host-side recompute of the camera block.
        let (_, delta) = self.clock.tick();
        self.camera.update(delta);
        let params = self.camera.frame_params(self.swapchain.aspect());
        if self.clock.frame() % 512 == 0 {
            log::debug!("frame {}: {:.1} fps", self.clock.frame(), self.clock.fps());
        }

        // SUBMIT_GRAPHICS: re-record against the acquired framebuffer, wait
        // for the surface at color-output, signal render-finished plus the
        // slot's completion fence.
        let plan = passes::plan_graphics_pass(
            slot as u32,
            self.rotation.depth(),
            self.ring.particle_count(),
            self.families(),
        );
        let record_info = GraphicsRecordInfo {
            pipeline: self.pipelines.graphics(),
            layout: self.pipelines.graphics_layout(),
            render_pass: self.pipelines.render_pass(),
            framebuffer: self.framebuffers.get(image_index),
            extent: self.swapchain.extent(),
            clear_color: self.config.clear_color,
            params: &params,
        };
        passes::record_graphics_list(
            device,
            self.commands.graphics_lists[slot],
            &record_info,
            &plan,
            &self.ring,
        )
        .map_err(FrameError::Record)?;

        let wait_semaphores = [self.slots.surface_acquired(slot)];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let graphics_lists = [self.commands.graphics_lists[slot]];
        let signal_semaphores = [self.slots.render_finished(slot)];
        let graphics_submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&graphics_lists)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            device.queue_submit(
                self.context.graphics.queue,
                &[graphics_submit],
                self.slots.completion_fence(slot),
            )
        }
        .map_err(|result| FrameError::Submit {
            queue: "graphics",
            result,
        })?;
        self.slots.mark_submitted(slot);

        // PRESENT: waits device-side on render-finished.
        self.swapchain.present(
            self.context.graphics.queue,
            self.slots.render_finished(slot),
            image_index,
        )?;

        // ADVANCE.
        self.rotation.advance();
        Ok(())
    }

    /// Wait for all in-flight work to complete.
    ///
    /// Idempotent; called automatically on drop. Destroying a buffer or
    /// signal still referenced by in-flight GPU work is undefined behavior,
    /// so this must finish before teardown starts.
    pub fn drain(&mut self) {
        if self.drained {
            return;
        }
        self.drained = true;
        log::info!("draining in-flight frames");
        if let Err(e) = self.slots.wait_all() {
            log::warn!("slot drain incomplete: {}", e);
        }
        self.context.wait_idle();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.drain();
    }
}

//! Pipeline construction.
//!
//! The two pipelines are just two data shapes, not two behaviors: each is
//! described by a plain descriptor struct and assembled by the same
//! stage-descriptor path. No trait object, no inheritance.

use std::ffi::CStr;
use std::mem::{offset_of, size_of};

use ash::{vk, Device};
use bytemuck::{Pod, Zeroable};

use crate::camera::FrameParams;
use crate::error::SetupError;
use crate::particle::Particle;

/// One shader stage to plug into a pipeline.
#[derive(Clone, Copy)]
pub struct StageDesc<'a> {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry: &'a CStr,
}

fn stage_info<'a>(
    desc: &StageDesc<'a>,
    specialization: Option<&'a vk::SpecializationInfo<'a>>,
) -> vk::PipelineShaderStageCreateInfo<'a> {
    let mut info = vk::PipelineShaderStageCreateInfo::default()
        .stage(desc.stage)
        .module(desc.module)
        .name(desc.entry);
    if let Some(specialization) = specialization {
        info = info.specialization_info(specialization);
    }
    info
}

/// Specialization constants baked into the simulate stage, constant ids 0..5.
///
/// `buffer_width` is the particle count; the dispatch shape stays
/// one-dimensional.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct SimulationShape {
    pub buffer_width: u32,
    pub buffer_height: u32,
    pub buffer_depth: u32,
    pub group_size_x: u32,
    pub group_size_y: u32,
    pub group_size_z: u32,
}

impl SimulationShape {
    pub fn new(particle_count: u32, workgroup_size: u32) -> Self {
        Self {
            buffer_width: particle_count,
            buffer_height: 1,
            buffer_depth: 1,
            group_size_x: workgroup_size,
            group_size_y: 1,
            group_size_z: 1,
        }
    }
}

/// Inputs to compute pipeline creation.
pub struct ComputePipelineDesc<'a> {
    pub shader: StageDesc<'a>,
    pub shape: SimulationShape,
}

/// Inputs to graphics pipeline creation.
pub struct GraphicsPipelineDesc<'a> {
    pub vertex: StageDesc<'a>,
    pub fragment: StageDesc<'a>,
    pub color_format: vk::Format,
    pub extent: vk::Extent2D,
}

/// Both pipelines, their layouts, the shared compute descriptor set layout
/// and the render pass.
pub struct Pipelines {
    device: Device,
    set_layout: vk::DescriptorSetLayout,
    compute_layout: vk::PipelineLayout,
    compute: vk::Pipeline,
    graphics_layout: vk::PipelineLayout,
    graphics: vk::Pipeline,
    render_pass: vk::RenderPass,
}

impl Pipelines {
    pub fn create(
        device: &Device,
        compute_desc: &ComputePipelineDesc<'_>,
        graphics_desc: &GraphicsPipelineDesc<'_>,
    ) -> Result<Self, SetupError> {
        let set_layout = create_set_layout(device)?;
        let (compute_layout, compute) = create_compute(device, set_layout, compute_desc)?;
        let render_pass = create_render_pass(device, graphics_desc.color_format)?;
        let (graphics_layout, graphics) =
            create_graphics(device, render_pass, graphics_desc)?;

        Ok(Self {
            device: device.clone(),
            set_layout,
            compute_layout,
            compute,
            graphics_layout,
            graphics,
            render_pass,
        })
    }

    #[inline]
    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    #[inline]
    pub fn compute(&self) -> vk::Pipeline {
        self.compute
    }

    #[inline]
    pub fn compute_layout(&self) -> vk::PipelineLayout {
        self.compute_layout
    }

    #[inline]
    pub fn graphics(&self) -> vk::Pipeline {
        self.graphics
    }

    #[inline]
    pub fn graphics_layout(&self) -> vk::PipelineLayout {
        self.graphics_layout
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for Pipelines {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.graphics, None);
            self.device
                .destroy_pipeline_layout(self.graphics_layout, None);
            self.device.destroy_render_pass(self.render_pass, None);
            self.device.destroy_pipeline(self.compute, None);
            self.device
                .destroy_pipeline_layout(self.compute_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

/// Two storage buffers visible to the compute stage: binding 0 is the source
/// (previous frame), binding 1 the destination (current frame).
fn create_set_layout(device: &Device) -> Result<vk::DescriptorSetLayout, SetupError> {
    let bindings = [
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::COMPUTE),
        vk::DescriptorSetLayoutBinding::default()
            .binding(1)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::COMPUTE),
    ];
    let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    unsafe { device.create_descriptor_set_layout(&info, None) }
        .map_err(SetupError::api("vkCreateDescriptorSetLayout"))
}

fn create_compute(
    device: &Device,
    set_layout: vk::DescriptorSetLayout,
    desc: &ComputePipelineDesc<'_>,
) -> Result<(vk::PipelineLayout, vk::Pipeline), SetupError> {
    let set_layouts = [set_layout];
    let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
    let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
        .map_err(SetupError::api("vkCreatePipelineLayout"))?;

    let entries: Vec<vk::SpecializationMapEntry> = (0..6)
        .map(|i| {
            vk::SpecializationMapEntry::default()
                .constant_id(i)
                .offset(i * 4)
                .size(4)
        })
        .collect();
    let shape_bytes = bytemuck::bytes_of(&desc.shape);
    let specialization = vk::SpecializationInfo::default()
        .map_entries(&entries)
        .data(shape_bytes);

    let stage = stage_info(&desc.shader, Some(&specialization));
    let info = vk::ComputePipelineCreateInfo::default()
        .stage(stage)
        .layout(layout);

    let pipelines = unsafe {
        device.create_compute_pipelines(vk::PipelineCache::null(), &[info], None)
    }
    .map_err(|(_, result)| {
        unsafe { device.destroy_pipeline_layout(layout, None) };
        SetupError::Api {
            call: "vkCreateComputePipelines",
            result,
        }
    })?;

    Ok((layout, pipelines[0]))
}

/// Single-subpass render pass clearing to the configured color and handing
/// the image straight to presentation.
fn create_render_pass(device: &Device, format: vk::Format) -> Result<vk::RenderPass, SetupError> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    // The color-output stage waits for the acquire semaphore; this dependency
    // folds the layout transition into the same stage.
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    unsafe { device.create_render_pass(&info, None) }
        .map_err(SetupError::api("vkCreateRenderPass"))
}

fn create_graphics(
    device: &Device,
    render_pass: vk::RenderPass,
    desc: &GraphicsPipelineDesc<'_>,
) -> Result<(vk::PipelineLayout, vk::Pipeline), SetupError> {
    let push_ranges = [vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::VERTEX)
        .offset(0)
        .size(size_of::<FrameParams>() as u32)];
    let layout_info = vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_ranges);
    let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
        .map_err(SetupError::api("vkCreatePipelineLayout"))?;

    let stages = [
        stage_info(&desc.vertex, None),
        stage_info(&desc.fragment, None),
    ];

    // The vertex stage reads a subset of the particle record straight out of
    // the simulation buffer; the stride skips the physics-only fields.
    let vertex_bindings = [vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(size_of::<Particle>() as u32)
        .input_rate(vk::VertexInputRate::VERTEX)];
    let vertex_attributes = [
        vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(offset_of!(Particle, position) as u32),
        vk::VertexInputAttributeDescription::default()
            .location(1)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(offset_of!(Particle, color) as u32),
        vk::VertexInputAttributeDescription::default()
            .location(2)
            .binding(0)
            .format(vk::Format::R32_SFLOAT)
            .offset(offset_of!(Particle, radius) as u32),
    ];
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::POINT_LIST);

    let viewports = [vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: desc.extent.width as f32,
        height: desc.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }];
    let scissors = [vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: desc.extent,
    }];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)];
    let color_blend =
        vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

    let info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
    }
    .map_err(|(_, result)| {
        unsafe { device.destroy_pipeline_layout(layout, None) };
        SetupError::Api {
            call: "vkCreateGraphicsPipelines",
            result,
        }
    })?;

    Ok((layout, pipelines[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_shape_is_one_dimensional() {
        let shape = SimulationShape::new(5000, 256);
        assert_eq!(shape.buffer_width, 5000);
        assert_eq!(shape.buffer_height, 1);
        assert_eq!(shape.buffer_depth, 1);
        assert_eq!(shape.group_size_x, 256);
        assert_eq!(shape.group_size_y, 1);
        assert_eq!(shape.group_size_z, 1);
    }

    #[test]
    fn test_simulation_shape_matches_six_spec_constants() {
        assert_eq!(size_of::<SimulationShape>(), 6 * 4);
    }
}

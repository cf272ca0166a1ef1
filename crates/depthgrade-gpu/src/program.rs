//! The resample program: registry lookup, pipeline, and per-frame bindings.

use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;

use depthgrade_core::PROGRAM_NAME;
use depthgrade_core::controller::PassInputs;

use crate::buffers::{EffectUniformsGpu, GpuLutHandle};

/// Named WGSL sources the backend can instantiate.
pub struct ShaderRegistry {
    sources: HashMap<String, Cow<'static, str>>,
}

impl Default for ShaderRegistry {
    /// Registry holding the built-in depth grading program.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(PROGRAM_NAME, include_str!("../shaders/depth_grading.wgsl"));
        registry
    }
}

impl ShaderRegistry {
    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Register or replace the source for `name`.
    pub fn register(&mut self, name: impl Into<String>, source: impl Into<Cow<'static, str>>) {
        self.sources.insert(name.into(), source.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(|s| s.as_ref())
    }
}

/// An instantiated resample pipeline plus the resources it owns.
pub struct GradingProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    lut0: GpuLutHandle,
    lut1: GpuLutHandle,
    format: wgpu::TextureFormat,
}

impl GradingProgram {
    /// Compile `source` for color targets of `format`.
    ///
    /// Validation errors surface through the device error scope, not here.
    pub fn new(device: &wgpu::Device, source: &str, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depthgrade_shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("depthgrade_layout"),
            entries: &[
                // binding 0: constants
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<EffectUniformsGpu>() as u64,
                        ),
                    },
                    count: None,
                },
                // binding 1: MainTex (copy of the color target)
                texture_entry(1, wgpu::TextureSampleType::Float { filterable: false }),
                // binding 2: camera depth
                texture_entry(2, wgpu::TextureSampleType::Depth),
                // bindings 3-4: Lut0, Lut1
                texture_entry(3, wgpu::TextureSampleType::Float { filterable: true }),
                texture_entry(4, wgpu::TextureSampleType::Float { filterable: true }),
                // binding 5: LUT sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depthgrade_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("depthgrade_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("depthgrade_lut_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("depthgrade_uniforms"),
            size: std::mem::size_of::<EffectUniformsGpu>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            lut0: GpuLutHandle::new(device, "depthgrade_lut0"),
            lut1: GpuLutHandle::new(device, "depthgrade_lut1"),
            format,
        }
    }

    /// Color target format this program renders to.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn luts(&self) -> (&GpuLutHandle, &GpuLutHandle) {
        (&self.lut0, &self.lut1)
    }

    /// Write constants and any LUT whose revision moved.
    pub fn upload(&mut self, queue: &wgpu::Queue, inputs: &PassInputs<'_>) {
        let uniforms = EffectUniformsGpu::from_inputs(inputs);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        self.lut0.sync(queue, &inputs.lut0);
        self.lut1.sync(queue, &inputs.lut1);
    }

    /// Bind group for one frame.
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        main_tex: &wgpu::TextureView,
        depth: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depthgrade_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(main_tex),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(depth),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&self.lut0.texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&self.lut1.texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Record the full-screen resample into `target`.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        target: &wgpu::TextureView,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("depthgrade_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

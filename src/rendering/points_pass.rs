use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use wgpu::{
    DepthBiasState, MultisampleState, PipelineCompilationOptions, RenderPassDescriptor,
    ShaderSource, StencilState,
};

use crate::{
    assets::LoadState,
    demo::DemoState,
    model::TextureId,
    rendering::texture::{Texture, TextureCache, DEPTH_FORMAT},
};

const PARTICLE_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: size_of::<Vec3>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
};

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PointsUniform {
    color: Vec4,
    size: Vec4,
}

impl PointsUniform {
    /// Sized so a particle covers as many pixels as a size-attenuated GL point would.
    fn new(demo: &DemoState) -> Self {
        let particles = &demo.config.particles;
        let half_fov = (demo.camera.fov_y_degrees * 0.5).to_radians();

        Self {
            color: Vec3::from(particles.color).extend(1.0),
            size: Vec4::new(particles.size * half_fov.tan(), 0.0, 0.0, 0.0),
        }
    }
}

pub struct PointsTextureViews<'a> {
    pub color: &'a wgpu::TextureView,
    /// Surface view the multisampled color is resolved into.
    pub resolve_target: Option<&'a wgpu::TextureView>,
    pub depth: &'a wgpu::TextureView,
}

/// Additively blended camera-facing particle quads, drawn after opaque geometry.
/// As the last pass it also resolves multisampled color.
pub struct PointsPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    alpha_map: Option<TextureId>,
    particle_buffer: wgpu::Buffer,
    particle_capacity: usize,
    particle_count: u32,
}

impl PointsPass {
    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
        frame_bind_group_layout: &wgpu::BindGroupLayout,
        textures: &mut TextureCache,
        demo: &DemoState,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Points bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Points uniform buffer"),
            size: size_of::<PointsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &uniform_buffer,
            0,
            bytemuck::cast_slice(&[PointsUniform::new(demo)]),
        );

        let bind_group = Self::create_bind_group(
            device,
            &bind_group_layout,
            &uniform_buffer,
            textures.get_or_upload(device, queue, &demo.scene, None),
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Points pipeline layout"),
            bind_group_layouts: &[frame_bind_group_layout, &bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Points shader"),
            source: ShaderSource::Wgsl(include_str!("../shaders/points.wgsl").into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Points render pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[PARTICLE_LAYOUT],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(ADDITIVE_BLEND),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState {
                count: sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        });

        let particle_capacity = demo.particles.len().max(1);
        let particle_buffer = Self::create_particle_buffer(device, particle_capacity);

        Self {
            pipeline,
            bind_group_layout,
            bind_group,
            uniform_buffer,
            alpha_map: None,
            particle_buffer,
            particle_capacity,
            particle_count: 0,
        }
    }

    fn create_particle_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle position buffer"),
            size: (size_of::<Vec3>() * capacity) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        alpha_map: &Texture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Points bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&alpha_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&alpha_map.sampler),
                },
            ],
        })
    }

    /// Uploads particle positions if they moved and picks up a newly loaded alpha map.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        textures: &mut TextureCache,
        demo: &mut DemoState,
    ) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[PointsUniform::new(demo)]),
        );

        if demo.particles.take_dirty() {
            if demo.particles.len() > self.particle_capacity {
                self.particle_capacity = demo.particles.len();
                self.particle_buffer = Self::create_particle_buffer(device, self.particle_capacity);
            }

            if !demo.particles.is_empty() {
                queue.write_buffer(
                    &self.particle_buffer,
                    0,
                    bytemuck::cast_slice(demo.particles.as_flat()),
                );
            }
            self.particle_count = demo.particles.len() as u32;
        }

        let alpha_map = match &demo.particle_alpha_map {
            LoadState::Loaded(id) => Some(*id),
            LoadState::Pending | LoadState::Failed(_) => None,
        };

        if alpha_map != self.alpha_map {
            let texture = textures.get_or_upload(device, queue, &demo.scene, alpha_map);
            self.bind_group = Self::create_bind_group(
                device,
                &self.bind_group_layout,
                &self.uniform_buffer,
                texture,
            );
            self.alpha_map = alpha_map;
        }
    }

    pub fn render(
        &self,
        views: &PointsTextureViews,
        encoder: &mut wgpu::CommandEncoder,
        frame_bind_group: &wgpu::BindGroup,
    ) {
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Points pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: views.color,
                resolve_target: views.resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: if views.resolve_target.is_some() {
                        wgpu::StoreOp::Discard
                    } else {
                        wgpu::StoreOp::Store
                    },
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: views.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        // Still begun without particles so the resolve happens.
        if self.particle_count == 0 {
            return;
        }

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, frame_bind_group, &[]);
        render_pass.set_bind_group(1, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
        render_pass.draw(0..6, 0..self.particle_count);
    }
}

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use wgpu::{
    DepthBiasState, MultisampleState, PipelineCompilationOptions, RenderPassDescriptor,
    ShaderSource, StencilState,
};

use crate::{
    config::{DirectionalLightConfig, ShadowConfig},
    model::{Instance, ModelId, VERTEX_LAYOUT},
    rendering::{render_model::RenderModel, texture::DEPTH_FORMAT},
};

/// World to light clip space for a directional light shining from its
/// position toward the origin through an orthographic box.
pub fn light_view_projection(light: &DirectionalLightConfig, shadow: &ShadowConfig) -> Mat4 {
    let position = Vec3::from(light.position);
    let direction = position.normalize_or(Vec3::Y);
    let up = if direction.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };

    let extent = shadow.extent;
    let projection =
        Mat4::orthographic_rh(-extent, extent, -extent, extent, shadow.near, shadow.far);

    projection * Mat4::look_at_rh(position, Vec3::ZERO, up)
}

/// Renders shadow casters into a depth map from the directional light.
/// The mesh pass samples it through [`ShadowPass::bind_group`].
pub struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    view: wgpu::TextureView,
    enabled: bool,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl ShadowPass {
    pub fn create(
        device: &wgpu::Device,
        frame_bind_group_layout: &wgpu::BindGroupLayout,
        shadow: Option<&ShadowConfig>,
    ) -> Self {
        // A 1x1 map keeps the mesh pass bind group valid when shadows are off.
        let map_size = shadow.map_or(1, |shadow| shadow.map_size.max(1));

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow map"),
            size: wgpu::Extent3d {
                width: map_size,
                height: map_size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Linear filtering on a comparison sampler gives 2x2 PCF per tap.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow bind group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow pipeline layout"),
            bind_group_layouts: &[frame_bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow shader"),
            source: ShaderSource::Wgsl(include_str!("../shaders/shadow.wgsl").into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow render pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[VERTEX_LAYOUT, Instance::descriptor()],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: StencilState::default(),
                bias: DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            view,
            enabled: shadow.is_some(),
            bind_group_layout,
            bind_group,
        }
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame_bind_group: &wgpu::BindGroup,
        render_models: &HashMap<ModelId, RenderModel>,
    ) {
        if !self.enabled {
            return;
        }

        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Shadow pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, frame_bind_group, &[]);

        for render_model in render_models.values() {
            let instance_count = render_model.instance_count();
            if !render_model.cast_shadow || instance_count == 0 {
                continue;
            }

            render_model.instance_buffer.bind(&mut render_pass);

            for primitive in &render_model.primitives {
                render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..primitive.num_indices, 0, 0..instance_count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightingConfig;
    use approx::assert_relative_eq;
    use glam::Vec4;

    fn default_light() -> (DirectionalLightConfig, ShadowConfig) {
        let light = LightingConfig::default().directional.unwrap();
        (light, light.shadow.unwrap())
    }

    #[test]
    fn origin_lands_in_the_middle_of_the_shadow_map() {
        let (light, shadow) = default_light();
        let clip = light_view_projection(&light, &shadow) * Vec4::new(0.0, 0.0, 0.0, 1.0);

        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-5);
        let distance = Vec3::from(light.position).length();
        assert_relative_eq!(
            clip.z,
            (distance - shadow.near) / (shadow.far - shadow.near),
            epsilon = 1e-5
        );
    }

    #[test]
    fn points_outside_the_box_fall_outside_clip_space() {
        let (light, shadow) = default_light();
        let matrix = light_view_projection(&light, &shadow);

        let far_side = Vec3::from(light.position).normalize().cross(Vec3::Y).normalize() * 6.0;
        let clip = matrix * far_side.extend(1.0);

        assert!(clip.x.abs() > 1.0 || clip.y.abs() > 1.0);
    }

    #[test]
    fn light_straight_above_still_has_a_basis() {
        let light = DirectionalLightConfig {
            position: [0.0, 10.0, 0.0],
            ..default_light().0
        };
        let matrix = light_view_projection(&light, &ShadowConfig::default());

        assert!(matrix.is_finite());
        let clip = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.z, 9.5 / 499.5, epsilon = 1e-5);
    }
}

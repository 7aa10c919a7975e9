use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::{
    camera::PerspectiveCamera,
    config::LightingConfig,
    rendering::shadow_pass::light_view_projection,
};

/// Per-frame camera and light data shared by every pass.
///
/// Light colors are premultiplied by intensity. Spot `w` components carry
/// range, decay and cone cosine respectively.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniformState {
    pub view_proj: Mat4,
    /// World to shadow map clip space of the directional light.
    pub light_view_proj: Mat4,
    pub camera_position: Vec4,
    pub camera_right: Vec4,
    pub camera_up: Vec4,
    pub ambient: Vec4,
    pub directional_color: Vec4,
    pub directional_direction: Vec4,
    pub spot_color: Vec4,
    pub spot_position: Vec4,
    pub spot_direction: Vec4,
    /// Enabled flag, depth bias, shadow map texel size.
    pub shadow: Vec4,
}

impl FrameUniformState {
    pub fn new(camera: &PerspectiveCamera, lighting: &LightingConfig) -> Self {
        let camera_matrix = camera.world_matrix();

        let ambient = Vec3::from(lighting.ambient.color) * lighting.ambient.intensity;

        let (directional_color, directional_direction) = match &lighting.directional {
            Some(light) => (
                Vec3::from(light.color) * light.intensity,
                Vec3::from(light.position).normalize_or_zero(),
            ),
            None => (Vec3::ZERO, Vec3::Y),
        };

        let shadow_camera = lighting
            .directional
            .as_ref()
            .and_then(|light| Some((light, light.shadow.as_ref()?)));
        let (light_view_proj, shadow) = match shadow_camera {
            Some((light, shadow)) => (
                light_view_projection(light, shadow),
                Vec4::new(1.0, shadow.bias, 1.0 / shadow.map_size.max(1) as f32, 0.0),
            ),
            None => (Mat4::IDENTITY, Vec4::ZERO),
        };

        let (spot_color, spot_position, spot_direction) = match &lighting.spot {
            Some(light) => {
                let position = Vec3::from(light.position);
                let direction = (Vec3::from(light.target) - position).normalize_or(Vec3::NEG_Y);
                (
                    (Vec3::from(light.color) * light.intensity).extend(light.distance),
                    position.extend(light.decay),
                    direction.extend(light.angle.cos()),
                )
            }
            None => (Vec4::ZERO, Vec4::ZERO, Vec4::new(0.0, -1.0, 0.0, 1.0)),
        };

        Self {
            view_proj: camera.view_projection_matrix(),
            light_view_proj,
            camera_position: camera.position.extend(1.0),
            camera_right: camera_matrix.x_axis,
            camera_up: camera_matrix.y_axis,
            ambient: ambient.extend(0.0),
            directional_color: directional_color.extend(0.0),
            directional_direction: directional_direction.extend(0.0),
            spot_color,
            spot_position,
            spot_direction,
            shadow,
        }
    }
}

pub struct FrameUniform {
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl FrameUniform {
    pub fn new(device: &wgpu::Device, initial_state: FrameUniformState) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame uniform buffer"),
            contents: bytemuck::cast_slice(&[initial_state]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame uniform bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame uniform bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, state: FrameUniformState) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[state]));
    }
}

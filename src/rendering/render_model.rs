use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use wgpu::util::DeviceExt;

use crate::{
    model::{Instance, Material, Model, ModelId, ModelPrimitive, TextureId},
    rendering::texture::TextureCache,
    scene_graph::{Renderable, Scene},
};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct MaterialUniform {
    base_color: Vec4,
    /// x: receives shadows
    flags: Vec4,
}

impl MaterialUniform {
    fn new(material: &Material, receive_shadow: bool) -> Self {
        Self {
            base_color: material.base_color,
            flags: Vec4::new(f32::from(u8::from(receive_shadow)), 0.0, 0.0, 0.0),
        }
    }
}

/// Stores `new` in `current` and reports whether it differed.
fn replace_if_changed<T: PartialEq>(current: &mut T, new: T) -> bool {
    if *current == new {
        return false;
    }

    *current = new;
    true
}

pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
    pub double_sided: bool,
    material: MaterialUniform,
    material_buffer: wgpu::Buffer,
    pub material_bind_group: wgpu::BindGroup,
    texture: Option<TextureId>,
}

/// Everything needed to (re)build material bind groups.
pub struct MaterialContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub layout: &'a wgpu::BindGroupLayout,
    pub textures: &'a mut TextureCache,
    pub scene: &'a Scene,
}

impl RenderPrimitive {
    fn from_primitive(
        context: &mut MaterialContext,
        model: &Model,
        primitive: &ModelPrimitive,
    ) -> Self {
        let vertex_buffer_name = format!(
            "Vertex buffer ({}, primitive {})",
            model.name, primitive.index
        );
        let index_buffer_name = format!(
            "Index buffer ({}, primitive {})",
            model.name, primitive.index
        );

        let vertex_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&vertex_buffer_name),
                contents: bytemuck::cast_slice(&primitive.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&index_buffer_name),
                contents: bytemuck::cast_slice(&primitive.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let material = MaterialUniform::new(&primitive.material, model.receive_shadow);
        let material_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Material uniform buffer"),
                contents: bytemuck::cast_slice(&[material]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let texture = primitive.material.base_color_texture;
        let material_bind_group = Self::material_bind_group(context, &material_buffer, texture);

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: primitive.indices.len() as u32,
            double_sided: primitive.material.double_sided,
            material,
            material_buffer,
            material_bind_group,
            texture,
        }
    }

    fn material_bind_group(
        context: &mut MaterialContext,
        material_buffer: &wgpu::Buffer,
        texture: Option<TextureId>,
    ) -> wgpu::BindGroup {
        let texture = context
            .textures
            .get_or_upload(context.device, context.queue, context.scene, texture);

        context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Material bind group"),
                layout: context.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: material_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&texture.sampler),
                    },
                ],
            })
    }

    /// Picks up material changes made after upload, such as a texture that finished loading.
    fn sync_material(
        &mut self,
        context: &mut MaterialContext,
        model: &Model,
        primitive: &ModelPrimitive,
    ) {
        let material = MaterialUniform::new(&primitive.material, model.receive_shadow);
        if replace_if_changed(&mut self.material, material) {
            context
                .queue
                .write_buffer(&self.material_buffer, 0, bytemuck::cast_slice(&[material]));
        }
        self.double_sided = primitive.material.double_sided;

        let texture = primitive.material.base_color_texture;
        if texture != self.texture {
            self.material_bind_group =
                Self::material_bind_group(context, &self.material_buffer, texture);
            self.texture = texture;
        }
    }
}

pub struct RenderModel {
    pub primitives: Vec<RenderPrimitive>,
    pub cast_shadow: bool,
    pub instance_buffer: InstanceBuffer,
    instances: Vec<Instance>,
    instances_changed: bool,
}

impl RenderModel {
    pub fn from_model(context: &mut MaterialContext, model: &Model) -> Self {
        let primitives = model
            .primitives
            .iter()
            .map(|primitive| RenderPrimitive::from_primitive(context, model, primitive))
            .collect();

        RenderModel {
            primitives,
            cast_shadow: model.cast_shadow,
            instance_buffer: InstanceBuffer::new(context.device, &model.name, 1),
            instances: Vec::new(),
            instances_changed: true,
        }
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }
}

/// Uploads models the renderer has not seen yet and refreshes materials of known ones.
pub fn sync_render_models(
    context: &mut MaterialContext,
    render_models: &mut HashMap<ModelId, RenderModel>,
) {
    let scene = context.scene;
    for (model_id, model) in scene.models.iter() {
        match render_models.get_mut(&model_id) {
            Some(render_model) => {
                render_model.cast_shadow = model.cast_shadow;
                for (render_primitive, primitive) in
                    render_model.primitives.iter_mut().zip(&model.primitives)
                {
                    render_primitive.sync_material(context, model, primitive);
                }
            }
            None => {
                log::info!(
                    "Uploading model {} with {} primitives",
                    model.name,
                    model.primitives.len()
                );
                let render_model = RenderModel::from_model(context, model);
                render_models.insert(model_id, render_model);
            }
        }
    }
}

/// Collects the world matrices of every object drawn with each model and uploads
/// the ones that moved since the previous frame.
pub fn gather_instances(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    scene: &Scene,
    render_models: &mut HashMap<ModelId, RenderModel>,
) {
    let mut previous_counts = HashMap::with_capacity(render_models.len());
    for (model_id, render_model) in render_models.iter_mut() {
        previous_counts.insert(*model_id, render_model.instances.len());
        render_model.instances.clear();
    }

    for (_, object) in scene.objects.iter() {
        let Renderable::Model(model_id) = object.renderable else {
            continue;
        };

        if let Some(render_model) = render_models.get_mut(&model_id) {
            render_model.instances_changed |= object.transform.has_changed();
            render_model.instances.push(Instance {
                model: *object.transform.get_world_matrix(),
                normal: *object.transform.get_inverse_transpose_world_matrix(),
            });
        }
    }

    for (model_id, render_model) in render_models.iter_mut() {
        let count_changed = previous_counts.get(model_id) != Some(&render_model.instances.len());
        if render_model.instances_changed || count_changed {
            render_model
                .instance_buffer
                .write(device, queue, &render_model.instances);
            render_model.instances_changed = false;
        }
    }
}

pub struct InstanceBuffer {
    buffer: wgpu::Buffer,
    label: String,
    capacity: usize,
}

impl InstanceBuffer {
    pub fn new(device: &wgpu::Device, name: &str, capacity: usize) -> Self {
        let label = format!("Instance buffer ({})", name);
        let buffer = Self::create(device, &label, capacity);

        Self {
            buffer,
            label,
            capacity,
        }
    }

    fn create(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (size_of::<Instance>() * capacity.max(1)) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Writes `instances`, growing the buffer when it is too small.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, instances: &[Instance]) {
        if instances.is_empty() {
            return;
        }

        if instances.len() > self.capacity {
            self.capacity = instances.len().next_power_of_two();
            self.buffer = Self::create(device, &self.label, self.capacity);
        }

        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(instances));
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(1, self.buffer.slice(..));
    }
}

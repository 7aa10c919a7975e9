use std::mem::offset_of;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use id_arena::Id;

pub type ModelId = Id<Model>;
pub type TextureId = Id<TextureData>;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

pub const VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};

/// Surface description of a primitive. `T` identifies the base color texture:
/// an image index while a model is still CPU-side, a [`TextureId`] once it
/// belongs to a scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material<T = TextureId> {
    /// Linear RGBA.
    pub base_color: Vec4,
    pub base_color_texture: Option<T>,
    /// Drawn without back-face culling.
    pub double_sided: bool,
}

impl<T> Default for Material<T> {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            base_color_texture: None,
            double_sided: false,
        }
    }
}

impl<T> Material<T> {
    pub fn map_texture<U>(self, f: impl FnOnce(T) -> U) -> Material<U> {
        Material {
            base_color: self.base_color,
            base_color_texture: self.base_color_texture.map(f),
            double_sided: self.double_sided,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelPrimitive<T = TextureId> {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Material<T>,
}

#[derive(Debug, Clone)]
pub struct Model<T = TextureId> {
    pub name: String,
    pub primitives: Vec<ModelPrimitive<T>>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl<T> Model<T> {
    pub fn new(name: impl Into<String>, primitives: Vec<ModelPrimitive<T>>) -> Self {
        Self {
            name: name.into(),
            primitives,
            cast_shadow: false,
            receive_shadow: false,
        }
    }

    pub fn map_textures<U>(self, mut f: impl FnMut(T) -> U) -> Model<U> {
        Model {
            name: self.name,
            cast_shadow: self.cast_shadow,
            receive_shadow: self.receive_shadow,
            primitives: self
                .primitives
                .into_iter()
                .map(|primitive| ModelPrimitive {
                    index: primitive.index,
                    vertices: primitive.vertices,
                    indices: primitive.indices,
                    material: primitive.material.map_texture(&mut f),
                })
                .collect(),
        }
    }
}

/// Decoded RGBA8 image, rows top to bottom.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub srgb: bool,
    /// Address modes along U and V.
    pub wrap: [wgpu::AddressMode; 2],
}

impl TextureData {
    pub fn from_rgba8(label: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);

        Self {
            label: label.into(),
            width,
            height,
            pixels,
            srgb: true,
            wrap: [wgpu::AddressMode::ClampToEdge; 2],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Instance {
    pub model: Mat4,
    pub normal: Mat4,
}

impl Instance {
    pub fn descriptor() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4,
            9 => Float32x4,
            10 => Float32x4,
            11 => Float32x4,
            12 => Float32x4
        ];

        wgpu::VertexBufferLayout {
            array_stride: size_of::<Instance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

use std::path::Path;

use anyhow::Context;
use glam::{Quat, Vec2, Vec3, Vec4};
use gltf::{buffer, image::Format, texture::WrappingMode};
use itertools::izip;

use crate::{
    model::{Material, Model, ModelPrimitive, TextureData, Vertex},
    scene_graph::transform::EULER_ORDER,
};

/// A glTF scene decoded off the main thread, ready to be spawned into a [`crate::scene_graph::Scene`].
///
/// Meshes refer to `images` by index.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub nodes: Vec<LoadedNode>,
    pub root_nodes: Vec<usize>,
    pub meshes: Vec<Model<usize>>,
    pub images: Vec<TextureData>,
}

#[derive(Debug, Clone)]
pub struct LoadedNode {
    pub name: String,
    pub translation: Vec3,
    /// Euler angles in [`EULER_ORDER`].
    pub rotation: Vec3,
    pub scale: Vec3,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

pub type Buffers<'a> = &'a [buffer::Data];

pub fn load_gltf(path: &Path) -> anyhow::Result<LoadedModel> {
    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Failed to import {}", path.display()))?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("No scenes in gltf")?;

    let meshes = document
        .meshes()
        .map(|mesh| mesh_from_gltf(mesh, &buffers))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let nodes = document
        .nodes()
        .map(|node| {
            let (translation, rotation, scale) = node.transform().decomposed();
            let (x, y, z) = Quat::from_array(rotation).to_euler(EULER_ORDER);

            LoadedNode {
                name: node
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("Node {}", node.index())),
                translation: Vec3::from(translation),
                rotation: Vec3::new(x, y, z),
                scale: Vec3::from(scale),
                mesh: node.mesh().map(|mesh| mesh.index()),
                children: node.children().map(|child| child.index()).collect(),
            }
        })
        .collect();

    let mut images = images
        .into_iter()
        .enumerate()
        .map(|(index, image)| image_to_rgba8(format!("{} image {}", path.display(), index), image))
        .collect::<Vec<_>>();
    apply_sampler_wraps(&document, &mut images);

    Ok(LoadedModel {
        nodes,
        root_nodes: scene.nodes().map(|node| node.index()).collect(),
        meshes,
        images,
    })
}

fn mesh_from_gltf(mesh: gltf::Mesh, buffers: Buffers) -> anyhow::Result<Model<usize>> {
    let name = mesh
        .name()
        .map(String::from)
        .unwrap_or_else(|| format!("Mesh {}", mesh.index()));

    let mut model = Model::new(name, Vec::new());

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Skipping {:?} primitive {} of {}",
                primitive.mode(),
                primitive.index(),
                model.name
            );
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .with_context(|| format!("Primitive without positions in {}", model.name))?
            .collect();
        let vertex_count = positions.len();

        let normals: Vec<[f32; 3]> = match reader.read_normals() {
            Some(normals) => normals.collect(),
            None => vec![[0.0, 1.0, 0.0]; vertex_count],
        };
        let tex_coords: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
            Some(tex_coords) => tex_coords.into_f32().collect(),
            None => vec![[0.0, 0.0]; vertex_count],
        };

        let vertices = izip!(positions, normals, tex_coords)
            .map(|(position, normal, tex_coords)| Vertex {
                position: Vec3::from(position),
                normal: Vec3::from(normal),
                tex_coords: Vec2::from(tex_coords),
            })
            .collect::<Vec<Vertex>>();

        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertex_count as u32).collect(),
        };

        let material = primitive.material();
        let pbr = material.pbr_metallic_roughness();

        model.primitives.push(ModelPrimitive {
            index: primitive.index(),
            vertices,
            indices,
            material: Material {
                base_color: Vec4::from(pbr.base_color_factor()),
                base_color_texture: pbr
                    .base_color_texture()
                    .map(|info| info.texture().source().index()),
                double_sided: material.double_sided(),
            },
        });
    }

    if model.primitives.is_empty() {
        return Err(anyhow::anyhow!("Mesh without primitives: {}", model.name));
    }

    Ok(model)
}

/// Copies each texture's sampler wrap modes onto the image it samples.
fn apply_sampler_wraps(document: &gltf::Document, images: &mut [TextureData]) {
    for texture in document.textures() {
        let sampler = texture.sampler();
        if let Some(image) = images.get_mut(texture.source().index()) {
            image.wrap = [address_mode(sampler.wrap_s()), address_mode(sampler.wrap_t())];
        }
    }
}

fn address_mode(mode: WrappingMode) -> wgpu::AddressMode {
    match mode {
        WrappingMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrappingMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrappingMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn image_to_rgba8(label: String, image: gltf::image::Data) -> TextureData {
    let pixels = match image.format {
        Format::R8G8B8A8 => image.pixels,
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|rg| [rg[0], rg[1], 0, 255])
            .collect(),
        Format::R8 => image.pixels.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        other => {
            log::warn!("Unsupported image format {:?} in {}, using white", other, label);
            vec![255; (image.width * image.height * 4) as usize]
        }
    };

    // glTF samplers repeat unless they say otherwise.
    TextureData {
        wrap: [wgpu::AddressMode::Repeat; 2],
        ..TextureData::from_rgba8(label, image.width, image.height, pixels)
    }
}

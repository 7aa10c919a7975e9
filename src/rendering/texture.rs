use std::collections::HashMap;

use wgpu::{TexelCopyBufferLayout, TexelCopyTextureInfo};

use crate::{
    model::{TextureData, TextureId},
    scene_graph::Scene,
};

pub struct Texture {
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
}

impl Texture {
    pub fn from_data(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> Self {
        let size = wgpu::Extent3d {
            width: data.width.max(1),
            height: data.height.max(1),
            depth_or_array_layers: 1,
        };

        let format = if data.srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&data.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data.pixels,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );

        Self::from_wgpu_texture(texture, device, data.wrap)
    }

    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::from_data(
            device,
            queue,
            &TextureData::from_rgba8("White texture", 1, 1, vec![255; 4]),
        )
    }

    fn from_wgpu_texture(
        texture: wgpu::Texture,
        device: &wgpu::Device,
        [wrap_u, wrap_v]: [wgpu::AddressMode; 2],
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wrap_u,
            address_mode_v: wrap_v,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            _texture: texture,
            view,
            sampler,
        }
    }
}

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Attachment that follows the surface size.
pub struct RenderTarget {
    view: wgpu::TextureView,
    label: String,
    format: wgpu::TextureFormat,
    sample_count: u32,
}

impl RenderTarget {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        format: wgpu::TextureFormat,
        sample_count: u32,
        label: impl Into<String>,
    ) -> Self {
        let label: String = label.into();
        let view = Self::create_view(device, config, format, sample_count, &label);

        RenderTarget {
            view,
            label,
            format,
            sample_count,
        }
    }

    fn create_view(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        format: wgpu::TextureFormat,
        sample_count: u32,
        label: &str,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn resize(&mut self, device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) {
        self.view = Self::create_view(device, config, self.format, self.sample_count, &self.label);
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// GPU copies of scene textures, uploaded on first use.
pub struct TextureCache {
    white: Texture,
    textures: HashMap<TextureId, Texture>,
}

impl TextureCache {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            white: Texture::white(device, queue),
            textures: HashMap::new(),
        }
    }

    /// Returns the texture for `id`, or plain white when there is none.
    pub fn get_or_upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &Scene,
        id: Option<TextureId>,
    ) -> &Texture {
        let Some((id, data)) = id.and_then(|id| scene.textures.get(id).map(|data| (id, data)))
        else {
            return &self.white;
        };

        self.textures.entry(id).or_insert_with(|| {
            log::debug!("Uploading texture {} ({}x{})", data.label, data.width, data.height);
            Texture::from_data(device, queue, data)
        })
    }
}

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use wgpu::CommandEncoderDescriptor;
use winit::window::Window;

use crate::{
    demo::DemoState,
    engine::RenderSurface,
    model::ModelId,
    rendering::{
        frame_uniform::{FrameUniform, FrameUniformState},
        mesh_pass::{MeshPass, MeshTextureViews},
        points_pass::{PointsPass, PointsTextureViews},
        render_model::{gather_instances, sync_render_models, MaterialContext, RenderModel},
        shadow_pass::ShadowPass,
        texture::{RenderTarget, TextureCache, DEPTH_FORMAT},
    },
    viewport::ViewportSize,
};

pub struct Renderer {
    pub window: Arc<Window>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    size: ViewportSize,
    pixel_ratio: f32,

    depth_target: RenderTarget,
    /// Present when rendering with more than one sample.
    msaa_target: Option<RenderTarget>,
    frame_uniform: FrameUniform,
    textures: TextureCache,
    render_models: HashMap<ModelId, RenderModel>,

    shadow_pass: ShadowPass,
    mesh_pass: MeshPass,
    points_pass: PointsPass,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, demo: &DemoState) -> anyhow::Result<Renderer> {
        let size = demo.viewport.size();
        let pixel_ratio = demo.viewport.pixel_ratio();
        let (width, height) = drawing_buffer_size(size, pixel_ratio);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to open graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .context("Surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sample_count = msaa_sample_count(demo.config.antialias, |count| {
            [surface_format, DEPTH_FORMAT].into_iter().all(|format| {
                adapter
                    .get_texture_format_features(format)
                    .flags
                    .sample_count_supported(count)
            })
        });
        log::info!("Rendering with {} sample(s) per pixel", sample_count);

        let depth_target =
            RenderTarget::new(&device, &config, DEPTH_FORMAT, sample_count, "Depth texture");
        let msaa_target = (sample_count > 1).then(|| {
            RenderTarget::new(
                &device,
                &config,
                surface_format,
                sample_count,
                "Multisampled color texture",
            )
        });

        let frame_uniform = FrameUniform::new(
            &device,
            FrameUniformState::new(&demo.camera, demo.lighting()),
        );

        let mut textures = TextureCache::new(&device, &queue);

        let shadow_config = demo
            .lighting()
            .directional
            .as_ref()
            .and_then(|light| light.shadow.as_ref());
        let shadow_pass =
            ShadowPass::create(&device, &frame_uniform.bind_group_layout, shadow_config);
        let mesh_pass = MeshPass::create(
            &device,
            surface_format,
            sample_count,
            &frame_uniform.bind_group_layout,
            &shadow_pass.bind_group_layout,
        );
        let points_pass = PointsPass::create(
            &device,
            &queue,
            surface_format,
            sample_count,
            &frame_uniform.bind_group_layout,
            &mut textures,
            demo,
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            pixel_ratio,
            depth_target,
            msaa_target,
            frame_uniform,
            textures,
            render_models: HashMap::new(),
            shadow_pass,
            mesh_pass,
            points_pass,
        })
    }

    /// Reconfigures the surface to match the current logical size and pixel ratio.
    pub fn reconfigure(&mut self) {
        let (width, height) = drawing_buffer_size(self.size, self.pixel_ratio);
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_target.resize(&self.device, &self.config);
        if let Some(msaa_target) = &mut self.msaa_target {
            msaa_target.resize(&self.device, &self.config);
        }
    }
}

impl RenderSurface for Renderer {
    fn set_size(&mut self, size: ViewportSize) {
        self.size = size;
        self.reconfigure();
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
        self.reconfigure();
    }

    fn render(&mut self, demo: &mut DemoState) -> Result<(), wgpu::SurfaceError> {
        self.frame_uniform.update(
            &self.queue,
            FrameUniformState::new(&demo.camera, demo.lighting()),
        );

        sync_render_models(
            &mut MaterialContext {
                device: &self.device,
                queue: &self.queue,
                layout: &self.mesh_pass.material_bind_group_layout,
                textures: &mut self.textures,
                scene: &demo.scene,
            },
            &mut self.render_models,
        );
        gather_instances(&self.device, &self.queue, &demo.scene, &mut self.render_models);

        self.points_pass
            .prepare(&self.device, &self.queue, &mut self.textures, demo);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render encoder"),
            });

        let (color, resolve_target) = match &self.msaa_target {
            Some(msaa_target) => (msaa_target.view(), Some(&view)),
            None => (&view, None),
        };

        self.shadow_pass
            .render(&mut encoder, &self.frame_uniform.bind_group, &self.render_models);

        self.mesh_pass.render(
            &MeshTextureViews {
                color,
                depth: self.depth_target.view(),
            },
            &mut encoder,
            &self.frame_uniform.bind_group,
            &self.shadow_pass.bind_group,
            &self.render_models,
        );

        self.points_pass.render(
            &PointsTextureViews {
                color,
                resolve_target,
                depth: self.depth_target.view(),
            },
            &mut encoder,
            &self.frame_uniform.bind_group,
        );

        self.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        output.present();

        Ok(())
    }
}

/// 4x MSAA when antialiasing is on and every attachment format supports it.
fn msaa_sample_count(antialias: bool, supported: impl Fn(u32) -> bool) -> u32 {
    const MSAA_SAMPLES: u32 = 4;

    if !antialias {
        return 1;
    }

    if supported(MSAA_SAMPLES) {
        MSAA_SAMPLES
    } else {
        log::warn!("{}x MSAA is not supported, rendering without it", MSAA_SAMPLES);
        1
    }
}

/// Drawing buffer size in physical pixels for a logical size at `pixel_ratio`.
pub fn drawing_buffer_size(size: ViewportSize, pixel_ratio: f32) -> (u32, u32) {
    let scale = |logical: u32| (logical as f32 * pixel_ratio).round() as u32;
    (scale(size.width), scale(size.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawing_buffer_scales_with_pixel_ratio() {
        assert_eq!(drawing_buffer_size(ViewportSize::new(800, 600), 1.0), (800, 600));
        assert_eq!(drawing_buffer_size(ViewportSize::new(800, 600), 2.0), (1600, 1200));
        assert_eq!(drawing_buffer_size(ViewportSize::new(333, 100), 1.5), (500, 150));
    }

    #[test]
    fn antialiasing_uses_four_samples_when_supported() {
        assert_eq!(msaa_sample_count(true, |count| count <= 4), 4);
        assert_eq!(msaa_sample_count(true, |count| count == 1), 1);
        assert_eq!(msaa_sample_count(false, |_| true), 1);
    }
}

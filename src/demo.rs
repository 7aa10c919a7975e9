use std::collections::HashMap;

use glam::Vec3;
use rand::Rng;

use crate::{
    animation::AnimatedObject,
    assets::{AssetEvent, AssetPayload, AssetRegistry, AssetRequest, LoadState},
    camera::{OrbitControls, PerspectiveCamera},
    config::{LightingConfig, ModelConfig, SceneConfig},
    engine::RenderSurface,
    geometry,
    model::{Model, ModelId, TextureId},
    particles::ParticleField,
    scene_graph::{Object3D, Renderable, Scene},
    viewport::{Viewport, ViewportSize},
};

/// What an in-flight asset request will be used for.
enum PendingAsset {
    Model { animated: usize, config: ModelConfig },
    PlanetTexture,
    ParticleAlphaMap,
}

struct Planet {
    model: ModelId,
    texture: LoadState<TextureId>,
}

/// Everything the frame loop reads and mutates.
pub struct DemoState {
    pub config: SceneConfig,
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub particles: ParticleField,
    pub particle_alpha_map: LoadState<TextureId>,
    pub animated: Vec<AnimatedObject>,
    pub viewport: Viewport,
    /// Index into `animated` for each entry of `config.models`.
    model_slots: Vec<usize>,
    planet: Option<Planet>,
    pending: HashMap<AssetRequest, PendingAsset>,
}

impl DemoState {
    pub fn new(config: SceneConfig, viewport: Viewport, rng: &mut impl Rng) -> Self {
        let mut scene = Scene::new();

        let particles = ParticleField::random(config.particles.count, config.particles.spread, rng);
        let mut points = Object3D::named("particles");
        points.renderable = Renderable::Points;
        scene.add_object(points);

        let mut animated = Vec::new();
        let mut planet = None;

        if let Some(planet_config) = &config.planet {
            let model = scene.add_model(Model {
                cast_shadow: planet_config.cast_shadow,
                receive_shadow: planet_config.receive_shadow,
                ..Model::new(
                    "planet",
                    vec![geometry::sphere(
                        planet_config.radius,
                        planet_config.width_segments,
                        planet_config.height_segments,
                    )],
                )
            });

            let mut object = Object3D::named("planet");
            object.renderable = Renderable::Model(model);
            object
                .transform
                .set_position(Vec3::from(planet_config.position));
            let object_id = scene.add_object(object);

            animated.push(AnimatedObject::new(
                "planet",
                LoadState::Loaded(object_id),
                planet_config.idle,
            ));

            planet = Some(Planet {
                model,
                texture: if planet_config.texture.is_some() {
                    LoadState::Pending
                } else {
                    LoadState::Failed("no texture configured".to_string())
                },
            });
        }

        let mut model_slots = Vec::with_capacity(config.models.len());
        for model in &config.models {
            model_slots.push(animated.len());
            animated.push(AnimatedObject::new(
                model.name.clone(),
                LoadState::Pending,
                model.idle,
            ));
        }

        let camera = PerspectiveCamera::from_config(&config.camera, viewport.aspect());
        let controls = OrbitControls::from_config(&config.camera);

        Self {
            scene,
            camera,
            controls,
            particles,
            particle_alpha_map: LoadState::Pending,
            animated,
            viewport,
            model_slots,
            planet,
            pending: HashMap::new(),
            config,
        }
    }

    pub fn lighting(&self) -> &LightingConfig {
        &self.config.lighting
    }

    /// Starts loading every model and texture the scene uses. Results are applied
    /// later through [`DemoState::apply_asset_event`].
    pub fn request_assets(&mut self, registry: &mut AssetRegistry) {
        for (config, &slot) in self.config.models.iter().zip(&self.model_slots) {
            let request = registry.load_model(&config.path);
            self.pending.insert(
                request,
                PendingAsset::Model {
                    animated: slot,
                    config: config.clone(),
                },
            );
        }

        if let Some(texture) = self.config.planet.as_ref().and_then(|p| p.texture.as_ref()) {
            let request = registry.load_texture(texture);
            self.pending.insert(request, PendingAsset::PlanetTexture);
        }

        match &self.config.particles.alpha_map {
            Some(alpha_map) => {
                let request = registry.load_texture(alpha_map);
                self.pending.insert(request, PendingAsset::ParticleAlphaMap);
            }
            None => {
                self.particle_alpha_map = LoadState::Failed("no alpha map configured".to_string())
            }
        }
    }

    pub fn has_pending_assets(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Puts a finished load into the scene. Must not be called while a frame is in progress.
    pub fn apply_asset_event(&mut self, event: AssetEvent) {
        self.apply_asset(event);

        if !self.has_pending_assets() {
            log::info!("All assets settled, {} failed", self.failed_asset_count());
        }
    }

    fn failed_asset_count(&self) -> usize {
        let models = self
            .animated
            .iter()
            .filter(|animated| animated.handle.is_failed())
            .count();
        let planet = self
            .planet
            .as_ref()
            .is_some_and(|planet| planet.texture.is_failed());

        models + usize::from(planet) + usize::from(self.particle_alpha_map.is_failed())
    }

    fn apply_asset(&mut self, event: AssetEvent) {
        let Some(pending) = self.pending.remove(&event.request) else {
            log::warn!("Ignoring unknown asset {}", event.path.display());
            return;
        };

        let payload = match event.result {
            Ok(payload) => payload,
            Err(error) => {
                log::warn!("Failed to load {}: {:#}", event.path.display(), error);
                self.mark_failed(pending, format!("{error:#}"));
                return;
            }
        };

        match (pending, payload) {
            (PendingAsset::Model { animated, config }, AssetPayload::Model(mut loaded)) => {
                for mesh in &mut loaded.meshes {
                    mesh.cast_shadow = config.cast_shadow;
                    mesh.receive_shadow = config.receive_shadow;
                }
                let root = self.scene.spawn_model(&config.name, loaded);
                self.scene.with_transform(root, |transform| {
                    transform.set_transform(
                        Vec3::from(config.position),
                        Vec3::from(config.rotation),
                        Vec3::splat(config.scale),
                    )
                });
                self.animated[animated].handle = LoadState::Loaded(root);
                log::info!("Loaded model {} from {}", config.name, event.path.display());
            }
            (PendingAsset::PlanetTexture, AssetPayload::Texture(texture)) => {
                let texture_id = self.scene.add_texture(texture);
                if let Some(planet) = &mut self.planet {
                    for primitive in &mut self.scene.models[planet.model].primitives {
                        primitive.material.base_color_texture = Some(texture_id);
                    }
                    planet.texture = LoadState::Loaded(texture_id);
                }
                log::info!("Loaded planet texture {}", event.path.display());
            }
            (PendingAsset::ParticleAlphaMap, AssetPayload::Texture(mut texture)) => {
                // Sampled as coverage, not color.
                texture.srgb = false;
                self.particle_alpha_map = LoadState::Loaded(self.scene.add_texture(texture));
                log::info!("Loaded particle alpha map {}", event.path.display());
            }
            (pending, _) => {
                log::warn!("Unexpected asset type for {}", event.path.display());
                self.mark_failed(pending, "unexpected asset type".to_string());
            }
        }
    }

    fn mark_failed(&mut self, pending: PendingAsset, reason: String) {
        match pending {
            PendingAsset::Model { animated, .. } => {
                self.animated[animated].handle = LoadState::Failed(reason)
            }
            PendingAsset::PlanetTexture => {
                if let Some(planet) = &mut self.planet {
                    planet.texture = LoadState::Failed(reason);
                }
            }
            PendingAsset::ParticleAlphaMap => self.particle_alpha_map = LoadState::Failed(reason),
        }
    }

    #[cfg(test)]
    pub fn animated_object(&self, name: &str) -> Option<&AnimatedObject> {
        self.animated.iter().find(|animated| animated.name == name)
    }

    /// Applies a window resize: viewport, camera aspect, then surface size and pixel ratio.
    pub fn handle_resize<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        size: ViewportSize,
        device_pixel_ratio: f64,
    ) {
        if size.is_empty() {
            log::debug!("Ignoring resize to {}x{}", size.width, size.height);
            return;
        }

        self.viewport.resize(size, device_pixel_ratio);
        self.camera.set_aspect(self.viewport.aspect());

        surface.set_size(size);
        surface.set_pixel_ratio(self.viewport.pixel_ratio());

        log::debug!(
            "Resized to {}x{} at pixel ratio {}",
            size.width,
            size.height,
            self.viewport.pixel_ratio()
        );
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::{
        assets::gltf_loader::{LoadedModel, LoadedNode},
        engine::{AnimationLoop, CancellationToken, FrameScheduler},
        model::TextureData,
    };
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use std::{path::PathBuf, time::Duration};

    /// Records what the frame loop asks of the render surface.
    #[derive(Default)]
    pub struct RecordingSurface {
        pub size: Option<ViewportSize>,
        pub pixel_ratio: Option<f32>,
        pub frames: Vec<FrameSnapshot>,
        pub cancel_after: Option<(usize, CancellationToken)>,
    }

    pub struct FrameSnapshot {
        pub object_count: usize,
        pub particles_dirty: bool,
        pub camera_position: Vec3,
    }

    impl RenderSurface for RecordingSurface {
        fn set_size(&mut self, size: ViewportSize) {
            self.size = Some(size);
        }

        fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
            self.pixel_ratio = Some(pixel_ratio);
        }

        fn render(&mut self, demo: &mut DemoState) -> Result<(), wgpu::SurfaceError> {
            self.frames.push(FrameSnapshot {
                object_count: demo.scene.object_count(),
                particles_dirty: demo.particles.take_dirty(),
                camera_position: demo.camera.position,
            });

            if let Some((limit, token)) = &self.cancel_after {
                if self.frames.len() >= *limit {
                    token.cancel();
                }
            }

            Ok(())
        }
    }

    #[derive(Default)]
    pub struct CountingScheduler(pub usize);

    impl FrameScheduler for CountingScheduler {
        fn request_next_frame(&mut self) {
            self.0 += 1;
        }
    }

    pub fn demo(config: SceneConfig) -> DemoState {
        let viewport = Viewport::new(ViewportSize::new(800, 600), 1.0, config.max_pixel_ratio);
        DemoState::new(config, viewport, &mut StdRng::seed_from_u64(7))
    }

    fn bare_config() -> SceneConfig {
        SceneConfig {
            planet: None,
            ..SceneConfig::default()
        }
    }

    fn single_node_model() -> LoadedModel {
        LoadedModel {
            nodes: vec![LoadedNode {
                name: "mesh".to_string(),
                translation: Vec3::ZERO,
                rotation: Vec3::ZERO,
                scale: Vec3::ONE,
                mesh: None,
                children: vec![],
            }],
            root_nodes: vec![0],
            meshes: vec![],
            images: vec![],
        }
    }

    #[test]
    fn ticking_before_loads_leaves_only_particles() {
        let mut demo = demo(bare_config());
        let mut registry = AssetRegistry::new("nowhere");
        demo.request_assets(&mut registry);

        let mut engine = AnimationLoop::new(CancellationToken::new());
        let mut surface = RecordingSurface::default();
        let mut scheduler = CountingScheduler::default();

        for frame in 0..3 {
            engine
                .tick(&mut demo, &mut surface, &mut scheduler, frame as f64 * 16.0)
                .unwrap();
        }

        assert_eq!(demo.scene.object_count(), 1);
        let only = demo.scene.objects.iter().next().unwrap().1;
        assert_eq!(only.renderable, Renderable::Points);
        assert!(demo.animated.iter().all(|animated| animated.handle.is_pending()));
        assert_eq!(scheduler.0, 3);
    }

    #[test]
    fn default_scene_has_planet_and_pending_models() {
        let demo = demo(SceneConfig::default());

        assert_eq!(demo.scene.object_count(), 2);
        assert!(demo.animated_object("planet").unwrap().handle.get().is_some());
        assert!(demo.animated_object("astronaut").unwrap().handle.is_pending());
        assert!(demo.animated_object("flying-saucer").unwrap().handle.is_pending());
        assert_eq!(demo.particles.len(), 1500);
    }

    #[test]
    fn resize_updates_camera_and_surface() {
        let mut demo = demo(SceneConfig::default());
        let mut surface = RecordingSurface::default();

        demo.handle_resize(&mut surface, ViewportSize::new(1920, 1080), 3.0);

        assert_relative_eq!(demo.camera.aspect, 1920.0 / 1080.0);
        assert_eq!(surface.size, Some(ViewportSize::new(1920, 1080)));
        assert_eq!(surface.pixel_ratio, Some(2.0));

        demo.handle_resize(&mut surface, ViewportSize::new(640, 480), 1.5);
        assert_relative_eq!(demo.camera.aspect, 640.0 / 480.0);
        assert_eq!(surface.pixel_ratio, Some(1.5));
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut demo = demo(SceneConfig::default());
        let mut surface = RecordingSurface::default();
        let aspect = demo.camera.aspect;

        demo.handle_resize(&mut surface, ViewportSize::new(0, 1080), 1.0);

        assert_eq!(demo.camera.aspect, aspect);
        assert!(surface.size.is_none());
    }

    #[test]
    fn loaded_model_gets_configured_transform_and_animates() {
        let mut demo = demo(bare_config());
        let mut registry = AssetRegistry::new("nowhere");
        demo.request_assets(&mut registry);

        let request = *demo
            .pending
            .iter()
            .find(|(_, pending)| {
                matches!(pending, PendingAsset::Model { config, .. } if config.name == "astronaut")
            })
            .unwrap()
            .0;

        demo.apply_asset_event(AssetEvent {
            request,
            path: PathBuf::from("models/astronaut.glb"),
            result: Ok(AssetPayload::Model(single_node_model())),
        });

        let root = *demo.animated_object("astronaut").unwrap().handle.get().unwrap();
        let transform = demo.scene.get_object_transform(root).unwrap();
        assert_eq!(transform.scale(), Vec3::splat(0.5));
        assert_eq!(transform.position(), Vec3::new(-1.3, -10.0, 0.0));

        let mut engine = AnimationLoop::new(CancellationToken::new());
        engine
            .tick(
                &mut demo,
                &mut RecordingSurface::default(),
                &mut CountingScheduler::default(),
                0.0,
            )
            .unwrap();

        let transform = demo.scene.get_object_transform(root).unwrap();
        assert_eq!(transform.position().y, 0.0);
        assert_relative_eq!(transform.rotation().x, 0.0015);
    }

    #[test]
    fn models_sharing_a_name_keep_their_own_config() {
        let mut far = ModelConfig::astronaut();
        far.position = [5.0, 0.0, 0.0];
        let mut demo = demo(SceneConfig {
            models: vec![far, ModelConfig::astronaut()],
            ..bare_config()
        });
        let mut registry = AssetRegistry::new("nowhere");
        demo.request_assets(&mut registry);

        let mut requested = demo
            .pending
            .values()
            .filter_map(|pending| match pending {
                PendingAsset::Model { animated, config } => Some((*animated, config.position)),
                _ => None,
            })
            .collect::<Vec<_>>();
        requested.sort_by_key(|(animated, _)| *animated);

        assert_eq!(
            requested,
            vec![(0, [5.0, 0.0, 0.0]), (1, [-1.3, -10.0, 0.0])]
        );

        let requests = demo
            .pending
            .iter()
            .filter_map(|(request, pending)| match pending {
                PendingAsset::Model { animated, .. } => Some((*animated, *request)),
                _ => None,
            })
            .collect::<HashMap<_, _>>();
        for slot in [1, 0] {
            demo.apply_asset_event(AssetEvent {
                request: requests[&slot],
                path: PathBuf::from("models/astronaut.glb"),
                result: Ok(AssetPayload::Model(single_node_model())),
            });
        }

        let positions = demo
            .animated
            .iter()
            .map(|animated| {
                let root = *animated.handle.get().unwrap();
                demo.scene.get_object_transform(root).unwrap().position()
            })
            .collect::<Vec<_>>();
        assert_eq!(
            positions,
            vec![Vec3::new(5.0, 0.0, 0.0), Vec3::new(-1.3, -10.0, 0.0)]
        );
    }

    #[test]
    fn loaded_meshes_take_shadow_flags_from_config() {
        let mut saucer = ModelConfig::flying_saucer();
        saucer.receive_shadow = false;
        let mut demo = demo(SceneConfig {
            models: vec![saucer],
            ..bare_config()
        });
        let mut registry = AssetRegistry::new("nowhere");
        demo.request_assets(&mut registry);

        let request = *demo
            .pending
            .iter()
            .find(|(_, pending)| matches!(pending, PendingAsset::Model { .. }))
            .unwrap()
            .0;

        let mut loaded = single_node_model();
        loaded.nodes[0].mesh = Some(0);
        loaded.meshes.push(Model::new("hull", vec![]));
        demo.apply_asset_event(AssetEvent {
            request,
            path: PathBuf::from("models/flying-saucer.glb"),
            result: Ok(AssetPayload::Model(loaded)),
        });

        let (_, hull) = demo.scene.models.iter().next().unwrap();
        assert!(hull.cast_shadow);
        assert!(!hull.receive_shadow);
    }

    #[test]
    fn failed_loads_are_recorded() {
        let mut demo = demo(bare_config());
        let mut registry = AssetRegistry::new("nowhere");
        demo.request_assets(&mut registry);

        while demo.has_pending_assets() {
            let event = registry
                .wait(Duration::from_secs(10))
                .expect("every load should finish");
            demo.apply_asset_event(event);
        }

        assert!(demo.animated_object("astronaut").unwrap().handle.is_failed());
        assert!(demo.animated_object("flying-saucer").unwrap().handle.is_failed());
        assert!(demo.particle_alpha_map.is_failed());
        assert_eq!(demo.scene.object_count(), 1);
    }

    #[test]
    fn planet_texture_is_attached_to_the_sphere() {
        let mut demo = demo(SceneConfig {
            models: vec![],
            ..SceneConfig::default()
        });
        let mut registry = AssetRegistry::new("nowhere");
        demo.request_assets(&mut registry);

        let request = *demo
            .pending
            .iter()
            .find(|(_, pending)| matches!(pending, PendingAsset::PlanetTexture))
            .unwrap()
            .0;

        demo.apply_asset_event(AssetEvent {
            request,
            path: PathBuf::from("diffuse.jpg"),
            result: Ok(AssetPayload::Texture(TextureData::from_rgba8(
                "diffuse",
                1,
                1,
                vec![0, 0, 255, 255],
            ))),
        });

        let planet = demo.planet.as_ref().unwrap();
        let texture = planet.texture.get().copied();
        assert!(texture.is_some());
        assert_eq!(
            demo.scene.models[planet.model].primitives[0]
                .material
                .base_color_texture,
            texture
        );
    }
}

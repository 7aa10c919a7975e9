use std::{
    f32::consts::{FRAC_PI_3, PI},
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

pub type Rgb = [f32; 3];

const WHITE: Rgb = [1.0, 1.0, 1.0];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub asset_root: PathBuf,
    pub camera: CameraConfig,
    pub particles: ParticleConfig,
    pub planet: Option<PlanetConfig>,
    pub models: Vec<ModelConfig>,
    pub lighting: LightingConfig,
    pub max_pixel_ratio: f32,
    /// Renders with 4x MSAA when the surface format supports it.
    pub antialias: bool,
}

impl SceneConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene file {}", path.display()))?;

        Self::parse(&source).with_context(|| format!("Invalid scene file {}", path.display()))
    }

    pub fn parse(source: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(source)?)
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            camera: CameraConfig::default(),
            particles: ParticleConfig::default(),
            planet: Some(PlanetConfig::default()),
            models: vec![ModelConfig::astronaut(), ModelConfig::flying_saucer()],
            lighting: LightingConfig::default(),
            max_pixel_ratio: 2.0,
            antialias: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 2000.0,
            position: [0.0, 0.0, 4.0],
            target: [0.0, 0.0, 0.0],
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::MAX,
        }
    }
}

/// Vertical drift applied to every particle: `sin(t * time_frequency + (x + z) * spatial_frequency) * amplitude`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub time_frequency: f64,
    pub spatial_frequency: f64,
    pub amplitude: f32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            time_frequency: 0.001,
            spatial_frequency: 3.0,
            amplitude: 0.001,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    pub spread: f32,
    pub size: f32,
    pub color: Rgb,
    pub alpha_map: Option<PathBuf>,
    pub wave: WaveConfig,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 1500,
            spread: 6.0,
            size: 0.07,
            color: WHITE,
            alpha_map: Some(PathBuf::from("particles/11.png")),
            wave: WaveConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bob {
    pub axis: Axis,
    pub amplitude: f32,
    #[serde(default = "default_bob_frequency")]
    pub time_frequency: f64,
}

fn default_bob_frequency() -> f64 {
    0.001
}

/// Continuous "idle" motion of a single object.
///
/// `rotation_per_frame` accumulates into the Euler rotation every frame.
/// `bob` overwrites one position axis with a sine of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct IdleProfile {
    pub rotation_per_frame: [f32; 3],
    pub bob: Option<Bob>,
}

impl IdleProfile {
    pub fn spin(axis: Axis, angle: f32) -> Self {
        let mut rotation_per_frame = [0.0; 3];
        rotation_per_frame[axis.index()] = angle;

        Self {
            rotation_per_frame,
            bob: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlanetConfig {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub position: [f32; 3],
    pub texture: Option<PathBuf>,
    pub idle: IdleProfile,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            radius: 5.5,
            width_segments: 50,
            height_segments: 20,
            position: [7.0, -5.0, -7.0],
            texture: Some(PathBuf::from("textures/planet/globe/diffuse.jpg")),
            idle: IdleProfile::spin(Axis::Y, 0.001),
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub idle: IdleProfile,
    #[serde(default = "default_true")]
    pub cast_shadow: bool,
    #[serde(default = "default_true")]
    pub receive_shadow: bool,
}

fn default_scale() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl ModelConfig {
    pub fn astronaut() -> Self {
        Self {
            name: "astronaut".to_string(),
            path: PathBuf::from("models/astronaut.glb"),
            position: [-1.3, -10.0, 0.0],
            rotation: [0.0; 3],
            scale: 0.5,
            idle: IdleProfile {
                rotation_per_frame: [0.0015, 0.0, 0.0],
                bob: Some(Bob {
                    axis: Axis::Y,
                    amplitude: 0.2,
                    time_frequency: default_bob_frequency(),
                }),
            },
            cast_shadow: true,
            receive_shadow: true,
        }
    }

    pub fn flying_saucer() -> Self {
        Self {
            name: "flying-saucer".to_string(),
            path: PathBuf::from("models/flying-saucer.glb"),
            position: [3.0, 1.0, -4.0],
            rotation: [0.0, -0.7, 0.4],
            scale: 0.007,
            idle: IdleProfile::spin(Axis::Y, 0.003),
            cast_shadow: true,
            receive_shadow: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AmbientLightConfig {
    pub color: Rgb,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DirectionalLightConfig {
    pub color: Rgb,
    pub intensity: f32,
    pub position: [f32; 3],
    /// Shines toward the origin. Shadows are off when `None`.
    #[serde(default)]
    pub shadow: Option<ShadowConfig>,
}

/// Orthographic shadow camera of a directional light.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub map_size: u32,
    /// Half width of the shadow camera box.
    pub extent: f32,
    pub near: f32,
    pub far: f32,
    /// Subtracted from the receiver depth before comparing.
    pub bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 512,
            extent: 5.0,
            near: 0.5,
            far: 500.0,
            bias: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpotLightConfig {
    pub color: Rgb,
    pub intensity: f32,
    /// Range of the light, 0 means unlimited.
    pub distance: f32,
    pub angle: f32,
    pub decay: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: AmbientLightConfig,
    pub directional: Option<DirectionalLightConfig>,
    pub spot: Option<SpotLightConfig>,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient: AmbientLightConfig {
                color: [0x88 as f32 / 255.0; 3],
                intensity: 0.4,
            },
            directional: Some(DirectionalLightConfig {
                color: WHITE,
                intensity: 2.5,
                position: [-1.0, 2.0, 3.0],
                shadow: Some(ShadowConfig::default()),
            }),
            spot: Some(SpotLightConfig {
                color: WHITE,
                intensity: 120.0,
                distance: PI,
                angle: FRAC_PI_3,
                decay: 2.0,
                position: [3.0, 1.0, -4.0],
                target: [7.0, -5.0, -7.0],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scene_matches_original_layout() {
        let config = SceneConfig::default();

        assert_eq!(config.particles.count, 1500);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.max_pixel_ratio, 2.0);

        let astronaut = &config.models[0];
        assert_eq!(astronaut.idle.rotation_per_frame, [0.0015, 0.0, 0.0]);
        assert_eq!(astronaut.idle.bob.map(|bob| bob.axis), Some(Axis::Y));

        let planet = config.planet.expect("planet enabled by default");
        assert_eq!(planet.idle.rotation_per_frame, [0.0, 0.001, 0.0]);
        assert!(!planet.cast_shadow);
    }

    #[test]
    fn directional_light_casts_shadows_by_default() {
        let config = SceneConfig::default();
        let directional = config.lighting.directional.unwrap();

        let shadow = directional.shadow.expect("shadows on by default");
        assert_eq!(shadow.map_size, 512);
        assert_eq!(shadow.extent, 5.0);
        assert!(config.antialias);

        let config = SceneConfig::parse(
            r#"(
                antialias: false,
                lighting: (
                    directional: Some((color: (1.0, 1.0, 1.0), intensity: 1.0, position: (0.0, 5.0, 0.0))),
                ),
            )"#,
        )
        .unwrap();

        assert!(!config.antialias);
        assert!(config.lighting.directional.unwrap().shadow.is_none());
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = SceneConfig::parse(
            r#"(
                planet: None,
                particles: (count: 4),
                models: [
                    (
                        name: "saucer",
                        path: "models/flying-saucer.glb",
                        idle: (rotation_per_frame: (0.0, 0.003, 0.002)),
                    ),
                ],
            )"#,
        )
        .unwrap();

        assert!(config.planet.is_none());
        assert_eq!(config.particles.count, 4);
        assert_eq!(config.particles.spread, 6.0);
        assert_eq!(config.models[0].scale, 1.0);
        assert!(config.models[0].cast_shadow);
        assert!(config.models[0].receive_shadow);
        assert!(config.antialias);
        assert_eq!(config.models[0].idle.rotation_per_frame, [0.0, 0.003, 0.002]);
        assert!(config.models[0].idle.bob.is_none());
        assert_eq!(config.camera.fov_degrees, 45.0);
    }

    #[test]
    fn shipped_tumbling_scene_parses() {
        let config = SceneConfig::parse(include_str!("../scenes/tumbling.ron")).unwrap();

        let saucer = config
            .models
            .iter()
            .find(|model| model.name == "flying-saucer")
            .unwrap();
        let spinning_axes = saucer
            .idle
            .rotation_per_frame
            .iter()
            .filter(|angle| **angle != 0.0)
            .count();

        assert_eq!(spinning_axes, 2);
    }

    #[test]
    fn missing_file_reports_path() {
        let error = SceneConfig::load("does/not/exist.ron").unwrap_err();

        assert!(format!("{error:#}").contains("does/not/exist.ron"));
    }
}

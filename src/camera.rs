use std::f32::consts::PI;

use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: Vec3::from(config.position),
            target: Vec3::from(config.target),
            up: Vec3::Y,
            fov_y_degrees: config.fov_degrees,
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Camera-to-world matrix.
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix().inverse()
    }
}

const EPS: f32 = 0.000001;

/// Point on a sphere around the orbit target. `phi` is measured from +Y,
/// `theta` around Y starting at +Z.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }

        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;

        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

/// Damped orbit around a target point driven by pointer input.
///
/// Input only accumulates pending motion; [`OrbitControls::update`] applies a
/// fraction of it each frame and decays the rest.
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    spherical_delta: Vec2,
    pan_offset: Vec3,
    scale: f32,
}

impl OrbitControls {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            target: Vec3::from(config.target),
            enable_damping: true,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            spherical_delta: Vec2::ZERO,
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        }
    }

    /// Queues a rotation for a pointer drag of `delta` pixels.
    pub fn rotate_by_pixels(&mut self, delta: Vec2, viewport_height: f32) {
        let radians_per_pixel = 2.0 * PI * self.rotate_speed / viewport_height.max(1.0);

        self.spherical_delta.x -= delta.x * radians_per_pixel;
        self.spherical_delta.y -= delta.y * radians_per_pixel;
    }

    /// Queues a screen-space pan so the target follows the pointer.
    pub fn pan_by_pixels(&mut self, delta: Vec2, viewport_height: f32, camera: &PerspectiveCamera) {
        let offset = camera.position - self.target;
        let target_distance =
            offset.length() * (camera.fov_y_degrees.to_radians() / 2.0).tan();
        let world_per_pixel = 2.0 * target_distance * self.pan_speed / viewport_height.max(1.0);

        let camera_matrix = camera.world_matrix();
        let right = camera_matrix.x_axis.truncate();
        let up = camera_matrix.y_axis.truncate();

        self.pan_offset += right * (-delta.x * world_per_pixel) + up * (delta.y * world_per_pixel);
    }

    /// Queues a zoom. Positive steps move towards the target.
    pub fn dolly(&mut self, steps: f32) {
        let zoom_scale = 0.95f32.powf(self.zoom_speed * steps.abs());

        if steps > 0.0 {
            self.scale *= zoom_scale;
        } else if steps < 0.0 {
            self.scale /= zoom_scale;
        }
    }

    pub fn has_pending_motion(&self) -> bool {
        self.spherical_delta != Vec2::ZERO || self.pan_offset != Vec3::ZERO || self.scale != 1.0
    }

    /// Moves `camera` one step towards the pending input and returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        if !self.has_pending_motion() {
            return false;
        }

        let step = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        let mut spherical = Spherical::from_offset(camera.position - self.target);
        spherical.theta += self.spherical_delta.x * step;
        spherical.phi = (spherical.phi + self.spherical_delta.y * step).clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset * step;

        let previous = camera.position;
        camera.position = self.target + spherical.to_offset();
        camera.target = self.target;

        if self.enable_damping {
            self.spherical_delta *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
            if self.spherical_delta.length_squared() < EPS * EPS {
                self.spherical_delta = Vec2::ZERO;
            }
            if self.pan_offset.length_squared() < EPS * EPS {
                self.pan_offset = Vec3::ZERO;
            }
        } else {
            self.spherical_delta = Vec2::ZERO;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn setup() -> (PerspectiveCamera, OrbitControls) {
        let config = CameraConfig::default();
        (
            PerspectiveCamera::from_config(&config, 16.0 / 9.0),
            OrbitControls::from_config(&config),
        )
    }

    #[test]
    fn spherical_round_trip_preserves_offset() {
        let offset = Vec3::new(1.0, 2.0, -3.0);
        let back = Spherical::from_offset(offset).to_offset();

        assert_relative_eq!(back.x, offset.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, offset.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, offset.z, epsilon = 1e-5);
    }

    #[test]
    fn no_input_is_a_no_op() {
        let (mut camera, mut controls) = setup();
        let before = camera.position;

        assert!(!controls.update(&mut camera));
        assert_eq!(camera.position, before);
    }

    #[test]
    fn damped_rotation_moves_a_fraction_per_frame() {
        let (mut camera, mut controls) = setup();
        controls.rotate_by_pixels(Vec2::new(-100.0, 0.0), 1000.0);
        let total = 2.0 * PI * 100.0 / 1000.0;

        assert!(controls.update(&mut camera));
        let theta = Spherical::from_offset(camera.position).theta;
        assert_relative_eq!(theta, total * 0.05, epsilon = 1e-5);
        assert_relative_eq!(camera.position.length(), 4.0, epsilon = 1e-5);

        for _ in 0..2000 {
            controls.update(&mut camera);
        }
        let theta = Spherical::from_offset(camera.position).theta;
        assert_relative_eq!(theta, total, epsilon = 1e-3);
        assert!(!controls.has_pending_motion());
    }

    #[test]
    fn undamped_rotation_snaps() {
        let (mut camera, mut controls) = setup();
        controls.enable_damping = false;
        controls.rotate_by_pixels(Vec2::new(-250.0, 0.0), 1000.0);

        controls.update(&mut camera);

        let theta = Spherical::from_offset(camera.position).theta;
        assert_relative_eq!(theta, PI / 2.0, epsilon = 1e-5);
        assert!(!controls.has_pending_motion());
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let (mut camera, mut controls) = setup();
        controls.enable_damping = false;
        controls.rotate_by_pixels(Vec2::new(0.0, 10_000.0), 100.0);

        controls.update(&mut camera);

        assert!(camera.position.y > 0.0);
        assert!(camera.position.x.abs() + camera.position.z.abs() > 0.0);
    }

    #[test]
    fn dolly_in_shrinks_the_radius() {
        let (mut camera, mut controls) = setup();
        controls.dolly(1.0);

        controls.update(&mut camera);

        assert_relative_eq!(camera.position.length(), 4.0 * 0.95, epsilon = 1e-5);
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let (mut camera, mut controls) = setup();
        controls.enable_damping = false;
        controls.pan_by_pixels(Vec2::new(-100.0, 0.0), 1000.0, &camera);

        controls.update(&mut camera);

        assert!(controls.target.x > 0.0);
        assert_relative_eq!(camera.position.x, controls.target.x, epsilon = 1e-5);
        assert_relative_eq!(camera.position.z, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn aspect_feeds_the_projection() {
        let (mut camera, _) = setup();
        camera.set_aspect(2.0);

        let projection = camera.projection_matrix();
        assert_relative_eq!(projection.y_axis.y / projection.x_axis.x, 2.0, epsilon = 1e-5);
    }
}

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::cell::{Cell, Ref, RefCell};

/// Euler order used for every rotation in the scene.
pub const EULER_ORDER: EulerRot = EulerRot::XYZ;

#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    rotation: Vec3,
    scale: Vec3,

    local_matrix: RefCell<Mat4>,
    world_matrix: RefCell<Mat4>,
    inverse_transpose_world_matrix: RefCell<Mat4>,
    local_dirty: Cell<bool>,
    world_dirty: Cell<bool>,
    has_changed_since_last_update: Cell<bool>,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            local_matrix: RefCell::new(Mat4::IDENTITY),
            world_matrix: RefCell::new(Mat4::IDENTITY),
            inverse_transpose_world_matrix: RefCell::new(Mat4::IDENTITY),
            local_dirty: Cell::new(true),
            world_dirty: Cell::new(true),
            has_changed_since_last_update: Cell::new(true),
        }
    }

    pub fn get_local_matrix(&self) -> Ref<Mat4> {
        if self.local_dirty.get() {
            let matrix =
                Mat4::from_scale_rotation_translation(self.scale, self.quaternion(), self.position);

            self.local_matrix.replace(matrix);
            self.local_dirty.set(false);
            self.invalidate_world();
        }

        self.local_matrix.borrow()
    }

    pub fn get_world_matrix(&self) -> Ref<Mat4> {
        self.world_matrix.borrow()
    }

    pub fn get_inverse_transpose_world_matrix(&self) -> Ref<Mat4> {
        self.inverse_transpose_world_matrix.borrow()
    }

    pub fn set_world_matrix(&self, world_matrix: Mat4) {
        self.world_matrix.replace(world_matrix);
        self.world_dirty.set(false);
        self.has_changed_since_last_update.set(true);
        self.inverse_transpose_world_matrix
            .replace(world_matrix.inverse().transpose());
    }

    pub fn invalidate_local(&self) {
        self.local_dirty.set(true);
        self.world_dirty.set(true);
        self.has_changed_since_last_update.set(true);
    }

    pub fn invalidate_world(&self) {
        self.world_dirty.set(true);
    }

    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty.get()
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.invalidate_local();
    }

    /// Overwrites a single position component (0 = x, 1 = y, 2 = z).
    pub fn set_position_axis(&mut self, axis: usize, value: f32) {
        self.position[axis] = value;
        self.invalidate_local();
    }

    /// Adds `delta` to the Euler angles. Angles are never wrapped.
    pub fn rotate_euler(&mut self, delta: Vec3) {
        self.rotation += delta;
        self.invalidate_local();
    }

    pub fn set_transform(&mut self, position: Vec3, rotation: Vec3, scale: Vec3) {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self.invalidate_local();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn quaternion(&self) -> Quat {
        Quat::from_euler(EULER_ORDER, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn reset_flags(&self) {
        self.has_changed_since_last_update.set(false);
    }

    /// Whether anything about the transform changed since the last [`Transform::reset_flags`].
    pub fn has_changed(&self) -> bool {
        self.has_changed_since_last_update.get()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

use glam::Vec3;

use crate::{
    assets::LoadState,
    config::IdleProfile,
    scene_graph::{ObjectId, Scene},
};

/// An object that plays an [`IdleProfile`] once it is present in the scene.
pub struct AnimatedObject {
    pub name: String,
    pub handle: LoadState<ObjectId>,
    pub profile: IdleProfile,
}

impl AnimatedObject {
    pub fn new(name: impl Into<String>, handle: LoadState<ObjectId>, profile: IdleProfile) -> Self {
        Self {
            name: name.into(),
            handle,
            profile,
        }
    }

    /// Applies one frame of idle motion. Does nothing until the handle is loaded.
    pub fn apply(&self, scene: &mut Scene, now_ms: f64) {
        let Some(&object_id) = self.handle.get() else {
            return;
        };

        let profile = self.profile;
        scene.with_transform(object_id, |transform| {
            let rotation = Vec3::from(profile.rotation_per_frame);
            if rotation != Vec3::ZERO {
                transform.rotate_euler(rotation);
            }

            if let Some(bob) = profile.bob {
                let offset = (now_ms * bob.time_frequency).sin() as f32 * bob.amplitude;
                transform.set_position_axis(bob.axis.index(), offset);
            }
        });
    }
}

use id_arena::Id;

use crate::model::ModelId;
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

/// What, if anything, the renderer draws for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Renderable {
    /// Groups and lights.
    #[default]
    None,
    Model(ModelId),
    /// The particle field.
    Points,
}

#[derive(Default)]
pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub renderable: Renderable,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
}

impl Object3D {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

use glam::Mat4;
use id_arena::Arena;

use crate::assets::gltf_loader::{LoadedModel, LoadedNode};
use crate::model::{Model, ModelId, TextureData, TextureId};
use crate::scene_graph::object3d::{Object3D, ObjectId, Renderable};
use crate::scene_graph::transform::Transform;

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<Model>,
    pub textures: Arena<TextureData>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            textures: Arena::new(),
        }
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    #[cfg(test)]
    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    #[cfg(test)]
    pub fn get_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn add_model(&mut self, model: Model) -> ModelId {
        self.models.alloc(model)
    }

    pub fn add_texture(&mut self, texture: TextureData) -> TextureId {
        self.textures.alloc(texture)
    }

    /// Adds a loaded model under a new root group named `name` and returns the root.
    pub fn spawn_model(&mut self, name: &str, loaded: LoadedModel) -> ObjectId {
        let LoadedModel {
            nodes,
            root_nodes,
            meshes,
            images,
        } = loaded;

        let texture_ids: Vec<TextureId> = images
            .into_iter()
            .map(|image| self.add_texture(image))
            .collect();

        let model_ids: Vec<ModelId> = meshes
            .into_iter()
            .map(|mesh| self.add_model(mesh.map_textures(|image| texture_ids[image])))
            .collect();

        let root = self.add_object(Object3D::named(name));

        for node_index in root_nodes {
            self.spawn_node(&nodes, node_index, root, &model_ids);
        }

        root
    }

    fn spawn_node(
        &mut self,
        nodes: &[LoadedNode],
        node_index: usize,
        parent: ObjectId,
        model_ids: &[ModelId],
    ) -> ObjectId {
        let node = &nodes[node_index];

        let mut object = Object3D::named(node.name.clone());
        object
            .transform
            .set_transform(node.translation, node.rotation, node.scale);

        if let Some(mesh) = node.mesh {
            object.renderable = Renderable::Model(model_ids[mesh]);
        }

        let object_id = self.add_object(object);
        self.set_object_parent(object_id, Some(parent));

        for &child in &node.children {
            self.spawn_node(nodes, child, object_id, model_ids);
        }

        object_id
    }

    /// Updates all object transforms in hierarchical order
    fn update_transforms(&self) {
        let root_objects = self
            .objects
            .iter()
            .filter(|(_, object)| object.parent_id.is_none())
            .map(|(id, _)| id);

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY, false);
        }
    }

    fn update_object_transform_recursive(
        &self,
        object_id: ObjectId,
        parent_world_matrix: Mat4,
        parent_changed: bool,
    ) {
        if let Some(object) = self.objects.get(object_id) {
            let local_matrix = *object.transform.get_local_matrix();
            let changed = parent_changed || object.transform.is_world_dirty();

            if changed {
                object
                    .transform
                    .set_world_matrix(parent_world_matrix * local_matrix);
            }

            let world_matrix = *object.transform.get_world_matrix();
            for &child_id in &object.child_ids {
                self.update_object_transform_recursive(child_id, world_matrix, changed);
            }
        }
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    /// Sets the parent of an object and updates child relationships
    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(old_parent_id) = self.objects.get(child_id).and_then(|c| c.parent_id) {
            if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;
        }

        if let Some(new_parent) = new_parent_id.and_then(|id| self.objects.get_mut(id)) {
            new_parent.child_ids.push(child_id);
        }

        self.invalidate_object_hierarchy(child_id);
    }

    /// Mutates an object's transform. Unknown ids are ignored.
    pub fn with_transform(&mut self, object_id: ObjectId, f: impl FnOnce(&mut Transform)) {
        if let Some(object) = self.objects.get_mut(object_id) {
            f(&mut object.transform);
        }
    }

    pub fn get_object_transform(&self, object_id: ObjectId) -> Option<&Transform> {
        self.objects.get(object_id).map(|object| &object.transform)
    }

    pub fn early_update(&mut self) {
        for (_, object) in self.objects.iter() {
            object.transform.reset_flags();
        }
    }

    pub fn late_update(&mut self) {
        self.update_transforms();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

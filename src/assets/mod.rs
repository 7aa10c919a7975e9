//! Fire-and-forget asset loading.
//!
//! Every request is decoded on the rayon pool and reported back through a
//! channel. The frame loop drains finished loads between frames with
//! [`AssetRegistry::poll`], so a completion never runs while a frame is in
//! progress. There is no cancellation and no timeout: a load that never
//! finishes leaves its [`LoadState`] pending forever.

pub mod gltf_loader;
pub mod texture_loader;

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{channel, Receiver, Sender},
};

use crate::model::TextureData;
use gltf_loader::LoadedModel;

/// Presence of something that arrives asynchronously.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadState<T> {
    #[default]
    Pending,
    Loaded(T),
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn get(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetRequest(u64);

pub enum AssetPayload {
    Model(LoadedModel),
    Texture(TextureData),
}

pub struct AssetEvent {
    pub request: AssetRequest,
    pub path: PathBuf,
    pub result: anyhow::Result<AssetPayload>,
}

pub struct AssetRegistry {
    root: PathBuf,
    sender: Sender<AssetEvent>,
    receiver: Receiver<AssetEvent>,
    next_request: u64,
}

impl AssetRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (sender, receiver) = channel();

        Self {
            root: root.into(),
            sender,
            receiver,
            next_request: 0,
        }
    }

    pub fn load_model(&mut self, path: impl AsRef<Path>) -> AssetRequest {
        self.spawn(path.as_ref(), |path| {
            gltf_loader::load_gltf(path).map(AssetPayload::Model)
        })
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> AssetRequest {
        self.spawn(path.as_ref(), |path| {
            texture_loader::load_texture(path).map(AssetPayload::Texture)
        })
    }

    /// Returns every load that finished since the last call, in completion order.
    pub fn poll(&self) -> Vec<AssetEvent> {
        self.receiver.try_iter().collect()
    }

    fn spawn<F>(&mut self, path: &Path, load: F) -> AssetRequest
    where
        F: FnOnce(&Path) -> anyhow::Result<AssetPayload> + Send + 'static,
    {
        let request = AssetRequest(self.next_request);
        self.next_request += 1;

        let path = self.root.join(path);
        let sender = self.sender.clone();
        log::debug!("Loading {}", path.display());

        rayon::spawn(move || {
            let result = load(&path);
            // The registry may already be gone, in which case nobody is waiting.
            let _ = sender.send(AssetEvent {
                request,
                path,
                result,
            });
        });

        request
    }

    #[cfg(test)]
    pub fn wait(&self, timeout: std::time::Duration) -> Option<AssetEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

use std::path::Path;

use anyhow::Context;

use crate::model::TextureData;

pub fn load_texture(path: &Path) -> anyhow::Result<TextureData> {
    let image = image::open(path)
        .with_context(|| format!("Failed to load texture {}", path.display()))?
        .into_rgba8();
    let (width, height) = image.dimensions();

    Ok(TextureData::from_rgba8(
        path.display().to_string(),
        width,
        height,
        image.into_raw(),
    ))
}

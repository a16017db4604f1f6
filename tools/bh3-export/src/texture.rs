//! Texture lookup for exported models (TGA -> embedded PNG)

use anyhow::{Context, Result};
use bh3_common::scene::Image;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Extension of the game's model textures
pub const TEXTURE_EXT: &str = "tga";

/// Texture file the game pairs with a model: `<model dir>/<mesh name>.tga`
pub fn texture_path(model_path: &Path, mesh_name: &str) -> PathBuf {
    model_path.with_file_name(format!("{}.{}", mesh_name, TEXTURE_EXT))
}

/// Best-effort texture for a model.
///
/// Returns `None` when the texture is missing or cannot be transcoded; the
/// export carries on untextured.
pub fn find_texture(model_path: &Path, mesh_name: &str) -> Option<Image> {
    if mesh_name.trim().is_empty() {
        return None;
    }
    let path = texture_path(model_path, mesh_name);
    if !path.is_file() {
        tracing::debug!("No texture at {:?}", path);
        return None;
    }

    match encode_png(&path, mesh_name) {
        Ok(image) => {
            tracing::info!("Embedding texture {:?} ({} bytes)", path, image.data.len());
            Some(image)
        }
        Err(e) => {
            tracing::warn!("Ignoring texture {:?}: {:#}", path, e);
            None
        }
    }
}

/// Decode any supported image file and re-encode it as PNG
pub fn encode_png(path: &Path, name: &str) -> Result<Image> {
    let img = image::open(path).with_context(|| format!("Failed to load image: {:?}", path))?;

    let mut data = Vec::new();
    img.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .with_context(|| format!("Failed to encode PNG from {:?}", path))?;

    Ok(Image {
        name: Some(name.to_string()),
        mime_type: "image/png".to_string(),
        data,
    })
}

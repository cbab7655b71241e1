//! Texture binding lookup in appearance asset graphs.

use crate::document::{AssetProperty, ASSET_TYPE, BITMAP_PROPERTY, TEXTURE_ASSET_TYPE};
use std::path::{Path, PathBuf};

/// A bitmap referenced by a material's appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    /// Path relative to the texture library, with `/` separators.
    pub source: String,
}

impl TextureBinding {
    /// Build from a raw bitmap property value.
    ///
    /// The value may list several `|`-separated alternatives; the first wins.
    pub fn from_bitmap_value(value: &str) -> Option<Self> {
        let first = value.split('|').next()?.trim();
        if first.is_empty() {
            return None;
        }
        Some(Self {
            source: first.replace('\\', "/"),
        })
    }

    /// File name component, used as the texture reference in the MTL file.
    pub fn file_name(&self) -> Option<&str> {
        self.source.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Absolute location under a texture library root.
    pub fn resolve_in(&self, library: &Path) -> PathBuf {
        self.source
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(library.to_path_buf(), |path, part| path.join(part))
    }
}

/// Returns `true` if the composite is tagged as a texture or carries a bitmap.
pub fn is_texture_asset(asset: &AssetProperty) -> bool {
    let tagged = asset
        .child(ASSET_TYPE)
        .and_then(|p| p.as_str())
        .map_or(false, |t| t == TEXTURE_ASSET_TYPE);
    tagged || asset.child(BITMAP_PROPERTY).is_some()
}

/// Depth-first search for the first texture asset reachable from `property`.
///
/// Composites are searched through their children, everything else through
/// its connected properties. The host guarantees the graph is acyclic.
pub fn find_texture_asset(property: &AssetProperty) -> Option<&AssetProperty> {
    if property.is_asset() {
        if is_texture_asset(property) {
            return Some(property);
        }
        property.children().iter().find_map(find_texture_asset)
    } else {
        property.connected.iter().find_map(find_texture_asset)
    }
}

/// Locate the bitmap bound anywhere in an appearance asset.
pub fn locate_texture(appearance: &AssetProperty) -> Option<TextureBinding> {
    let texture = find_texture_asset(appearance)?;
    let value = texture.child(BITMAP_PROPERTY)?.as_str()?;
    TextureBinding::from_bitmap_value(value)
}

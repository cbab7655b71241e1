//! Render tree loading from JSON files.

use super::SceneFile;
use crate::error::Result;
use std::path::Path;

/// Load a render tree from a JSON file.
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<SceneFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let scene = load_scene_from_str(&contents)?;
    log::debug!(
        "Loaded scene '{}' from {} ({} documents, {} top-level nodes)",
        scene.view.name,
        path.display(),
        scene.documents.len(),
        scene.view.nodes.len()
    );
    Ok(scene)
}

/// Parse a render tree from JSON text.
pub fn load_scene_from_str(contents: &str) -> Result<SceneFile> {
    Ok(serde_json::from_str(contents)?)
}

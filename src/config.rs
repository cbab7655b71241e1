//! Export configuration.

use std::path::PathBuf;

/// Coarsest tessellation level the host accepts.
pub const MAX_LEVEL_OF_DETAIL: u8 = 15;

/// The host's "normal" tessellation level.
pub const DEFAULT_LEVEL_OF_DETAIL: u8 = 8;

/// Environment variable consulted for the texture library root.
pub const TEXTURE_LIBRARY_ENV: &str = "RENDER_EXPORT_TEXTURE_LIBRARY";

/// Main exporter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Tessellation level of detail requested from the host, `0..=15`.
    /// The mapping to triangle density is host-defined.
    pub level_of_detail: u8,
    /// Root directory that appearance bitmap paths are relative to.
    pub texture_library: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            level_of_detail: DEFAULT_LEVEL_OF_DETAIL,
            texture_library: None,
        }
    }
}

impl ExportConfig {
    /// Set the level of detail, clamped to the host range.
    pub fn with_level_of_detail(mut self, level: u8) -> Self {
        self.level_of_detail = level.min(MAX_LEVEL_OF_DETAIL);
        self
    }

    pub fn with_texture_library(mut self, root: impl Into<PathBuf>) -> Self {
        self.texture_library = Some(root.into());
        self
    }

    /// Fill in the texture library from [`TEXTURE_LIBRARY_ENV`] if unset.
    pub fn with_texture_library_from_env(mut self) -> Self {
        if self.texture_library.is_none() {
            self.texture_library = std::env::var_os(TEXTURE_LIBRARY_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from);
        }
        self
    }
}

//! Material resolution and caching.
//!
//! The host reports a material before every batch, usually unchanged, so
//! resolution is memoized by material identity. A cache entry is never
//! replaced once created, and the reserved invalid identity always maps to
//! one shared default material built when the cache is.

pub mod texture;

pub use texture::{find_texture_asset, is_texture_asset, locate_texture, TextureBinding};

use crate::document::{Document, Material};
use crate::error::{ExportError, Result};
use crate::types::{Color, ElementId, MaterialNode};
use std::collections::HashMap;
use std::rc::Rc;

/// Name of the shared fallback material.
pub const DEFAULT_MATERIAL_NAME: &str = "Default";

/// How translucent geometry is blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    Blend,
}

/// Host transparency range used to derive alpha: `alpha = 1 - t / K`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransparencyScale(pub f64);

impl TransparencyScale {
    /// Material-node transparency, a fraction in `0..=1`.
    pub const FRACTION: TransparencyScale = TransparencyScale(1.0);
    /// Material-element transparency, a percentage in `0..=100`.
    pub const PERCENT: TransparencyScale = TransparencyScale(100.0);

    pub fn alpha(&self, transparency: f64) -> f32 {
        (1.0 - transparency / self.0).clamp(0.0, 1.0) as f32
    }
}

/// A fully resolved shading description.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMaterial {
    /// Name used in the output (palette entry or glTF material name).
    pub name: String,
    pub color: Color,
    /// Opacity in `0..=1`.
    pub alpha: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub texture: Option<TextureBinding>,
}

impl ResolvedMaterial {
    /// Neutral gray, opaque, double-sided.
    pub fn fallback() -> Self {
        Self {
            name: DEFAULT_MATERIAL_NAME.to_string(),
            color: Color::NEUTRAL_GRAY,
            alpha: 1.0,
            alpha_mode: AlphaMode::Opaque,
            double_sided: true,
            texture: None,
        }
    }

    /// Build from a host color and transparency on the given scale.
    ///
    /// Any non-zero transparency yields a blended material.
    pub fn from_color(
        name: impl Into<String>,
        color: Color,
        transparency: f64,
        scale: TransparencyScale,
    ) -> Self {
        let (alpha, alpha_mode) = if transparency != 0.0 {
            (scale.alpha(transparency), AlphaMode::Blend)
        } else {
            (1.0, AlphaMode::Opaque)
        };
        Self {
            name: name.into(),
            color,
            alpha,
            alpha_mode,
            double_sided: true,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: Option<TextureBinding>) -> Self {
        self.texture = texture;
        self
    }

    /// RGBA base color factor.
    pub fn base_color(&self) -> [f32; 4] {
        let [r, g, b] = self.color.to_rgb();
        [r, g, b, self.alpha]
    }

    pub fn is_translucent(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }
}

/// Resolve a material from the values carried by the material node itself.
///
/// Transparency is a fraction. When `with_texture` is set the appearance
/// graph is searched for a bitmap.
pub fn resolve_from_node(
    node: &MaterialNode,
    name: impl Into<String>,
    with_texture: bool,
) -> ResolvedMaterial {
    let texture = if with_texture {
        node.effective_appearance().and_then(locate_texture)
    } else {
        None
    };
    ResolvedMaterial::from_color(
        name,
        node.color,
        node.transparency,
        TransparencyScale::FRACTION,
    )
    .with_texture(texture)
}

/// Find the material element `material_id` names in `document`.
pub fn lookup_material(document: &Document, material_id: ElementId) -> Result<&Material> {
    document.material(material_id).ok_or_else(|| {
        ExportError::MaterialResolution(format!(
            "material {} not found in document '{}'",
            material_id, document.title
        ))
    })
}

/// Resolve a material element. Transparency is a percentage and the name is
/// the element's unique ID.
pub fn resolve_from_material(material: &Material) -> ResolvedMaterial {
    ResolvedMaterial::from_color(
        material.unique_id.clone(),
        material.color,
        material.transparency as f64,
        TransparencyScale::PERCENT,
    )
}

/// Identity-keyed memo of resolved materials for one export run.
#[derive(Debug)]
pub struct MaterialCache {
    fallback: Rc<ResolvedMaterial>,
    entries: HashMap<String, Rc<ResolvedMaterial>>,
    resolutions: usize,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self {
            fallback: Rc::new(ResolvedMaterial::fallback()),
            entries: HashMap::new(),
            resolutions: 0,
        }
    }

    /// The shared default material.
    pub fn fallback(&self) -> Rc<ResolvedMaterial> {
        Rc::clone(&self.fallback)
    }

    /// Return the cached entry for `key`, resolving it on first access.
    ///
    /// A failed resolution is logged and the key is pinned to the default
    /// material, so the failure is neither retried nor propagated.
    pub fn get_or_resolve<F>(&mut self, key: &str, resolve: F) -> Rc<ResolvedMaterial>
    where
        F: FnOnce() -> Result<ResolvedMaterial>,
    {
        if let Some(cached) = self.entries.get(key) {
            return Rc::clone(cached);
        }

        self.resolutions += 1;
        let material = match resolve() {
            Ok(resolved) => {
                log::debug!("Resolved material {} ({:?})", key, resolved.alpha_mode);
                Rc::new(resolved)
            }
            Err(e) => {
                log::warn!("Falling back to default material for {}: {}", key, e);
                self.fallback()
            }
        };
        self.entries.insert(key.to_string(), Rc::clone(&material));
        material
    }

    pub fn get(&self, key: &str) -> Option<&Rc<ResolvedMaterial>> {
        self.entries.get(key)
    }

    /// How many times a resolver closure actually ran.
    pub fn resolutions(&self) -> usize {
        self.resolutions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MaterialCache {
    fn default() -> Self {
        Self::new()
    }
}

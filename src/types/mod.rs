//! Shared types used throughout the library.
//!
//! These are the payloads the host traversal hands to an
//! [`ExportContext`](crate::context::ExportContext): node descriptions for
//! views, links, instances, materials and faces, plus the tessellated
//! [`PolymeshTopology`] batches that carry the actual geometry.

mod transform;

pub use transform::Transform;

use crate::document::{AssetProperty, Document};
use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An element identifier, stable within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub i64);

impl ElementId {
    /// The reserved "no element" identity.
    pub const INVALID: ElementId = ElementId(-1);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An 8-bit RGB color as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const NEUTRAL_GRAY: Color = Color::new(128, 128, 128);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Normalized `[0, 1]` channels.
    pub fn to_rgb(&self) -> [f32; 3] {
        [
            self.red as f32 / 255.0,
            self.green as f32 / 255.0,
            self.blue as f32 / 255.0,
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::NEUTRAL_GRAY
    }
}

/// Disposition returned by the `*_begin` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderNodeAction {
    /// Descend into the node's children.
    Proceed,
    /// Skip the node's subtree entirely.
    Skip,
}

/// The 3D view being exported.
#[derive(Debug, Clone, Default)]
pub struct ViewNode {
    pub view_id: ElementId,
    pub name: String,
    /// Tessellation level of detail requested by the exporter.
    /// `None` lets the host pick a resolution-based default.
    pub level_of_detail: Option<u8>,
}

/// A linked model placed in the host document.
#[derive(Debug, Clone)]
pub struct LinkNode {
    pub name: String,
    pub transform: Transform,
    /// The linked document; element and material IDs inside the link resolve here.
    pub document: Arc<Document>,
}

/// A placement of repeated geometry within one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
}

/// The material applied to the polymesh batches that follow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialNode {
    pub material_id: ElementId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Color,
    /// Fractional transparency, `0.0` opaque to `1.0` fully transparent.
    #[serde(default)]
    pub transparency: f64,
    #[serde(default)]
    pub appearance: Option<AssetProperty>,
    #[serde(default)]
    pub appearance_override: Option<AssetProperty>,
}

impl MaterialNode {
    pub fn new(material_id: ElementId, color: Color, transparency: f64) -> Self {
        Self {
            material_id,
            name: String::new(),
            color,
            transparency,
            appearance: None,
            appearance_override: None,
        }
    }

    /// The appearance asset in effect: the override when present.
    pub fn effective_appearance(&self) -> Option<&AssetProperty> {
        self.appearance_override
            .as_ref()
            .or(self.appearance.as_ref())
    }
}

/// A light source. Accepted but not exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightNode {
    #[serde(default)]
    pub name: String,
}

/// A rich photorealistic content placement. Accepted but not exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcNode {
    #[serde(default)]
    pub name: String,
}

/// A face of an element's solid geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceNode {
    #[serde(default)]
    pub name: String,
}

/// One triangle of a polymesh batch, indexing the batch's own points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct PolymeshFacet {
    pub v1: u32,
    pub v2: u32,
    pub v3: u32,
}

impl PolymeshFacet {
    pub fn new(v1: u32, v2: u32, v3: u32) -> Self {
        Self { v1, v2, v3 }
    }

    pub fn indices(&self) -> [u32; 3] {
        [self.v1, self.v2, self.v3]
    }
}

impl From<[u32; 3]> for PolymeshFacet {
    fn from([v1, v2, v3]: [u32; 3]) -> Self {
        Self { v1, v2, v3 }
    }
}

impl From<PolymeshFacet> for [u32; 3] {
    fn from(facet: PolymeshFacet) -> Self {
        facet.indices()
    }
}

/// One tessellated batch of geometry in the local frame of the current scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolymeshTopology {
    pub points: Vec<[f64; 3]>,
    #[serde(default)]
    pub uvs: Vec<[f64; 2]>,
    pub facets: Vec<PolymeshFacet>,
    #[serde(default)]
    pub normals: Vec<[f64; 3]>,
}

impl PolymeshTopology {
    pub fn new(points: Vec<[f64; 3]>, facets: Vec<PolymeshFacet>) -> Self {
        Self {
            points,
            uvs: Vec::new(),
            facets,
            normals: Vec::new(),
        }
    }

    pub fn with_uvs(mut self, uvs: Vec<[f64; 2]>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    pub fn number_of_facets(&self) -> usize {
        self.facets.len()
    }

    /// Check that every facet references an existing point.
    pub fn validate(&self) -> Result<()> {
        let count = self.points.len();
        for (i, facet) in self.facets.iter().enumerate() {
            if facet.indices().iter().any(|&v| v as usize >= count) {
                return Err(ExportError::InvalidTopology(format!(
                    "facet {} {:?} out of range for {} points",
                    i,
                    facet.indices(),
                    count
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_normalization() {
        assert_eq!(Color::new(255, 0, 51).to_rgb(), [1.0, 0.0, 0.2]);
    }

    #[test]
    fn test_facet_json_is_index_triple() {
        let facet: PolymeshFacet = serde_json::from_str("[0, 2, 3]").unwrap();
        assert_eq!(facet, PolymeshFacet::new(0, 2, 3));
    }

    #[test]
    fn test_validate_rejects_out_of_range_facet() {
        let mesh = PolymeshTopology::new(
            vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![PolymeshFacet::new(0, 1, 3)],
        );
        assert!(matches!(mesh.validate(), Err(ExportError::InvalidTopology(_))));
    }

    #[test]
    fn test_override_appearance_wins() {
        let mut node = MaterialNode::new(ElementId(7), Color::default(), 0.0);
        node.appearance = Some(AssetProperty::string("base", "a"));
        node.appearance_override = Some(AssetProperty::string("over", "b"));
        assert_eq!(node.effective_appearance().unwrap().name, "over");
    }
}

//! Appearance asset property graphs.
//!
//! A material's appearance is a tree of named properties. Composite
//! properties ([`PropertyValue::Asset`]) hold child properties; any property
//! may additionally be driven by connected upstream properties, which is how
//! bitmap textures are attached to color slots.

use serde::{Deserialize, Serialize};

/// Property that tags an asset with its schema type.
pub const ASSET_TYPE: &str = "assettype";

/// Property holding a bitmap texture's file reference.
pub const BITMAP_PROPERTY: &str = "unifiedbitmap_Bitmap";

/// Value of [`ASSET_TYPE`] for texture assets.
pub const TEXTURE_ASSET_TYPE: &str = "texture";

/// A named property in an appearance asset graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetProperty {
    pub name: String,
    pub value: PropertyValue,
    /// Upstream properties connected to this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connected: Vec<AssetProperty>,
}

/// The typed value carried by an [`AssetProperty`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// A composite asset with child properties.
    Asset(Vec<AssetProperty>),
    String(String),
    Double(f64),
    Integer(i64),
    Boolean(bool),
    /// A slot whose value comes entirely from its connected properties.
    Reference,
}

impl AssetProperty {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            connected: Vec::new(),
        }
    }

    pub fn asset(name: impl Into<String>, children: Vec<AssetProperty>) -> Self {
        Self::new(name, PropertyValue::Asset(children))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::String(value.into()))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Reference)
    }

    pub fn with_connected(mut self, property: AssetProperty) -> Self {
        self.connected.push(property);
        self
    }

    /// Returns `true` for composite properties.
    pub fn is_asset(&self) -> bool {
        matches!(self.value, PropertyValue::Asset(_))
    }

    /// Child properties of a composite; empty for anything else.
    pub fn children(&self) -> &[AssetProperty] {
        match &self.value {
            PropertyValue::Asset(children) => children,
            _ => &[],
        }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&AssetProperty> {
        self.children().iter().find(|p| p.name == name)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

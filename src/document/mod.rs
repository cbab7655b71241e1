//! Host documents.
//!
//! A [`Document`] is the lookup table the exporter resolves element and
//! material IDs against. The root model is one document; every linked model
//! brings its own, so the same [`ElementId`] may name different things in
//! different documents.

mod asset;

pub use asset::{
    AssetProperty, PropertyValue, ASSET_TYPE, BITMAP_PROPERTY, TEXTURE_ASSET_TYPE,
};

use crate::types::{Color, ElementId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A model element. Elements without a category are not exportable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Element {
    pub fn new(id: ElementId, category: Option<&str>) -> Self {
        Self {
            id,
            name: String::new(),
            category: category.map(str::to_string),
        }
    }
}

/// A material element as stored in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: ElementId,
    /// Identity that stays stable across documents.
    pub unique_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Color,
    /// Transparency in percent, `0` opaque to `100` invisible.
    #[serde(default)]
    pub transparency: u8,
    #[serde(default)]
    pub appearance: Option<AssetProperty>,
}

impl Material {
    pub fn new(id: ElementId, unique_id: impl Into<String>, color: Color, transparency: u8) -> Self {
        Self {
            id,
            unique_id: unique_id.into(),
            name: String::new(),
            color,
            transparency,
            appearance: None,
        }
    }
}

/// A loaded host document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "DocumentData", into = "DocumentData")]
pub struct Document {
    pub title: String,
    elements: HashMap<ElementId, Element>,
    materials: HashMap<ElementId, Material>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.insert(element.id, element);
    }

    pub fn add_material(&mut self, material: Material) {
        self.materials.insert(material.id, material);
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.add_element(element);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.add_material(material);
        self
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn material(&self, id: ElementId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

#[derive(Serialize, Deserialize)]
struct DocumentData {
    title: String,
    #[serde(default)]
    elements: Vec<Element>,
    #[serde(default)]
    materials: Vec<Material>,
}

impl From<DocumentData> for Document {
    fn from(data: DocumentData) -> Self {
        let mut doc = Document::new(data.title);
        for element in data.elements {
            doc.add_element(element);
        }
        for material in data.materials {
            doc.add_material(material);
        }
        doc
    }
}

impl From<Document> for DocumentData {
    fn from(doc: Document) -> Self {
        let mut elements: Vec<_> = doc.elements.into_values().collect();
        elements.sort_by_key(|e| e.id);
        let mut materials: Vec<_> = doc.materials.into_values().collect();
        materials.sort_by_key(|m| m.id);
        DocumentData {
            title: doc.title,
            elements,
            materials,
        }
    }
}

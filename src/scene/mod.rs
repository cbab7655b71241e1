//! Serializable render trees.
//!
//! A [`SceneFile`] captures what a host traversal would report for one 3D
//! view: the documents involved, and the tree of links, elements, instances,
//! materials and polymesh batches. [`SceneWalker`] replays it against any
//! [`ExportContext`](crate::context::ExportContext).

mod loader;
mod walker;

pub use loader::{load_scene, load_scene_from_str};
pub use walker::{ExportSummary, SceneWalker};

use crate::document::Document;
use crate::types::{
    ElementId, LightNode, MaterialNode, PolymeshTopology, RpcNode, Transform,
};
use serde::{Deserialize, Serialize};

/// A render tree plus the documents it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneFile {
    /// Every document the tree references, root and linked.
    pub documents: Vec<Document>,
    /// Title of the document the view belongs to.
    pub root: String,
    pub view: SceneView,
}

/// The exported 3D view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneView {
    #[serde(default)]
    pub id: ElementId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<RenderNode>,
}

/// Top-level nodes of a view or a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderNode {
    Element {
        id: ElementId,
        #[serde(default)]
        contents: Vec<ElementNode>,
    },
    Link {
        #[serde(default)]
        name: String,
        /// Title of the linked document.
        document: String,
        #[serde(default)]
        transform: Transform,
        #[serde(default)]
        children: Vec<RenderNode>,
    },
}

/// Nodes reported between an element's begin and end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementNode {
    Instance {
        #[serde(default)]
        name: String,
        #[serde(default)]
        transform: Transform,
        #[serde(default)]
        contents: Vec<ElementNode>,
    },
    Material(MaterialNode),
    Light(LightNode),
    Rpc(RpcNode),
    Face {
        #[serde(default)]
        name: String,
        #[serde(default)]
        polymeshes: Vec<PolymeshTopology>,
    },
    Polymesh(PolymeshTopology),
}

impl SceneFile {
    pub fn new(root: Document, view: SceneView) -> Self {
        Self {
            root: root.title.clone(),
            documents: vec![root],
            view,
        }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn document(&self, title: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.title == title)
    }
}

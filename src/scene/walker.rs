//! Replays a render tree through the callback protocol.

use super::{ElementNode, RenderNode, SceneFile};
use crate::context::ExportContext;
use crate::document::Document;
use crate::error::{ExportError, Result};
use crate::types::{
    ElementId, FaceNode, InstanceNode, LinkNode, RenderNodeAction, ViewNode,
};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

/// What a traversal visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub elements_exported: usize,
    pub elements_skipped: usize,
    pub polymeshes: usize,
    /// The context asked to stop before the tree was exhausted.
    pub canceled: bool,
}

/// Drives an [`ExportContext`] over a [`SceneFile`] in host order.
///
/// Nodes whose begin callback answers [`RenderNodeAction::Skip`] are not
/// descended into and get no end callback. Cancellation is polled before
/// every element; the enclosing link and view scopes are still closed.
/// The first error stops the traversal. `finish` is called in every case.
pub struct SceneWalker<'a> {
    scene: &'a SceneFile,
    documents: HashMap<&'a str, Arc<Document>>,
}

impl<'a> SceneWalker<'a> {
    pub fn new(scene: &'a SceneFile) -> Result<Self> {
        let documents: HashMap<&str, Arc<Document>> = scene
            .documents
            .iter()
            .map(|d| (d.title.as_str(), Arc::new(d.clone())))
            .collect();
        if !documents.contains_key(scene.root.as_str()) {
            return Err(ExportError::MissingDocument(scene.root.clone()));
        }
        Ok(Self { scene, documents })
    }

    /// The document the view belongs to, shared with the walker.
    pub fn root_document(&self) -> Arc<Document> {
        // Presence checked in `new`
        Arc::clone(&self.documents[self.scene.root.as_str()])
    }

    fn document(&self, title: &str) -> Result<Arc<Document>> {
        self.documents
            .get(title)
            .cloned()
            .ok_or_else(|| ExportError::MissingDocument(title.to_string()))
    }

    pub fn export<C: ExportContext + ?Sized>(&self, context: &mut C) -> Result<ExportSummary> {
        let mut summary = ExportSummary::default();
        let result = context
            .start()
            .and_then(|()| self.walk_view(context, &mut summary));
        let finished = context.finish();
        result?;
        finished?;
        log::info!(
            "Traversal done: {} exported, {} skipped, {} polymeshes{}",
            summary.elements_exported,
            summary.elements_skipped,
            summary.polymeshes,
            if summary.canceled { " (canceled)" } else { "" }
        );
        Ok(summary)
    }

    fn walk_view<C: ExportContext + ?Sized>(
        &self,
        context: &mut C,
        summary: &mut ExportSummary,
    ) -> Result<()> {
        let view = &self.scene.view;
        let mut node = ViewNode {
            view_id: view.id,
            name: view.name.clone(),
            level_of_detail: None,
        };
        if context.on_view_begin(&mut node) == RenderNodeAction::Skip {
            return Ok(());
        }
        log::debug!("View {} level of detail {:?}", node.name, node.level_of_detail);
        let _ = self.walk_nodes(&view.nodes, context, summary)?;
        context.on_view_end(view.id);
        Ok(())
    }

    fn walk_nodes<C: ExportContext + ?Sized>(
        &self,
        nodes: &[RenderNode],
        context: &mut C,
        summary: &mut ExportSummary,
    ) -> Result<ControlFlow<()>> {
        for node in nodes {
            let flow = match node {
                RenderNode::Element { id, contents } => {
                    self.walk_element(*id, contents, context, summary)?
                }
                RenderNode::Link {
                    name,
                    document,
                    transform,
                    children,
                } => {
                    let link = LinkNode {
                        name: name.clone(),
                        transform: *transform,
                        document: self.document(document)?,
                    };
                    if context.on_link_begin(&link) == RenderNodeAction::Skip {
                        continue;
                    }
                    let flow = self.walk_nodes(children, context, summary)?;
                    context.on_link_end(&link);
                    flow
                }
            };
            if flow.is_break() {
                return Ok(flow);
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn walk_element<C: ExportContext + ?Sized>(
        &self,
        id: ElementId,
        contents: &[ElementNode],
        context: &mut C,
        summary: &mut ExportSummary,
    ) -> Result<ControlFlow<()>> {
        if context.is_canceled() {
            log::info!("Export canceled before element {}", id);
            summary.canceled = true;
            return Ok(ControlFlow::Break(()));
        }
        if context.on_element_begin(id) == RenderNodeAction::Skip {
            summary.elements_skipped += 1;
            return Ok(ControlFlow::Continue(()));
        }
        self.walk_contents(contents, context, summary)?;
        context.on_element_end(id)?;
        summary.elements_exported += 1;
        Ok(ControlFlow::Continue(()))
    }

    fn walk_contents<C: ExportContext + ?Sized>(
        &self,
        contents: &[ElementNode],
        context: &mut C,
        summary: &mut ExportSummary,
    ) -> Result<()> {
        for node in contents {
            match node {
                ElementNode::Instance {
                    name,
                    transform,
                    contents,
                } => {
                    let instance = InstanceNode {
                        name: name.clone(),
                        transform: *transform,
                    };
                    if context.on_instance_begin(&instance) == RenderNodeAction::Skip {
                        continue;
                    }
                    self.walk_contents(contents, context, summary)?;
                    context.on_instance_end(&instance);
                }
                ElementNode::Material(material) => context.on_material(material)?,
                ElementNode::Light(light) => context.on_light(light),
                ElementNode::Rpc(rpc) => context.on_rpc(rpc),
                ElementNode::Face { name, polymeshes } => {
                    let face = FaceNode { name: name.clone() };
                    if context.on_face_begin(&face) == RenderNodeAction::Skip {
                        continue;
                    }
                    for polymesh in polymeshes {
                        context.on_polymesh(polymesh)?;
                        summary.polymeshes += 1;
                    }
                    context.on_face_end(&face);
                }
                ElementNode::Polymesh(polymesh) => {
                    context.on_polymesh(polymesh)?;
                    summary.polymeshes += 1;
                }
            }
        }
        Ok(())
    }
}

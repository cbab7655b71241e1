//! The traversal protocol handler shared by both output formats.
//!
//! [`Exporter`] owns everything that does not depend on the target format:
//! the transform and document stacks, the material cache, element skipping
//! and cancellation. Format-specific work is delegated to a
//! [`GeometrySink`].

use crate::config::ExportConfig;
use crate::context::{ExportContext, TraversalContext};
use crate::document::Document;
use crate::error::Result;
use crate::material::{
    lookup_material, resolve_from_material, resolve_from_node, MaterialCache, ResolvedMaterial,
};
use crate::types::{
    ElementId, InstanceNode, LightNode, LinkNode, MaterialNode, PolymeshTopology,
    RenderNodeAction, RpcNode, Transform, ViewNode,
};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where a format takes its material description from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialSource {
    /// Color and fractional transparency carried by the material node,
    /// keyed by element ID.
    Node { with_texture: bool },
    /// The material element in the current document, keyed by unique ID.
    Document,
}

/// Format-specific hooks driven by [`Exporter`].
pub trait GeometrySink {
    fn material_source(&self) -> MaterialSource;

    /// Prepare output artifacts. Called from `start`.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn begin_element(&mut self, element_id: ElementId);

    /// The material for the batches that follow changed.
    fn use_material(&mut self, material: &Rc<ResolvedMaterial>) -> Result<()>;

    /// Emit one batch; `transform` is the composed local-to-world placement.
    fn add_polymesh(&mut self, polymesh: &PolymeshTopology, transform: &Transform) -> Result<()>;

    fn end_element(&mut self, element_id: ElementId) -> Result<()>;

    /// Flush and release output artifacts. Called exactly once.
    fn close(&mut self) -> Result<()>;
}

/// Cooperative cancellation flag, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters collected during one export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub elements_exported: usize,
    pub elements_skipped: usize,
    pub polymeshes: usize,
    pub triangles: usize,
}

/// An [`ExportContext`] that tracks traversal state and feeds a [`GeometrySink`].
pub struct Exporter<S: GeometrySink> {
    sink: S,
    config: ExportConfig,
    context: TraversalContext,
    materials: MaterialCache,
    /// Last material node seen and the document it was resolved in.
    current_material: Option<(ElementId, Arc<Document>)>,
    current_element: Option<ElementId>,
    cancel: CancelToken,
    stats: ExportStats,
    closed: bool,
}

impl<S: GeometrySink> Exporter<S> {
    pub fn new(document: Arc<Document>, sink: S, config: ExportConfig) -> Self {
        Self {
            sink,
            config,
            context: TraversalContext::new(document),
            materials: MaterialCache::new(),
            current_material: None,
            current_element: None,
            cancel: CancelToken::new(),
            stats: ExportStats::default(),
            closed: false,
        }
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn context(&self) -> &TraversalContext {
        &self.context
    }

    pub fn materials(&self) -> &MaterialCache {
        &self.materials
    }

    pub fn stats(&self) -> ExportStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Material key for node-sourced materials. IDs are only unique per
    /// document, so materials inside links are qualified by document title.
    fn node_material_key(&self, id: ElementId) -> String {
        if self.context.documents().depth() == 1 {
            id.to_string()
        } else {
            let title: String = self
                .context
                .current_document()
                .title
                .chars()
                .map(|c| if c.is_whitespace() { '_' } else { c })
                .collect();
            format!("{}_{}", title, id)
        }
    }

    fn resolve_material(&mut self, node: &MaterialNode) -> Rc<ResolvedMaterial> {
        if node.material_id.is_invalid() {
            return self.materials.fallback();
        }

        match self.sink.material_source() {
            MaterialSource::Node { with_texture } => {
                let key = self.node_material_key(node.material_id);
                self.materials.get_or_resolve(&key, || {
                    Ok(resolve_from_node(node, key.clone(), with_texture))
                })
            }
            MaterialSource::Document => {
                let document = Arc::clone(self.context.current_document());
                match lookup_material(&document, node.material_id) {
                    Ok(material) => self
                        .materials
                        .get_or_resolve(&material.unique_id, || Ok(resolve_from_material(material))),
                    Err(e) => {
                        let key = format!("{}#{}", document.title, node.material_id);
                        self.materials.get_or_resolve(&key, || Err(e))
                    }
                }
            }
        }
    }
}

impl<S: GeometrySink> ExportContext for Exporter<S> {
    fn start(&mut self) -> Result<()> {
        log::info!(
            "Starting export of '{}' (level of detail {})",
            self.context.current_document().title,
            self.config.level_of_detail
        );
        self.sink.open()
    }

    fn on_view_begin(&mut self, node: &mut ViewNode) -> RenderNodeAction {
        log::trace!("ViewBegin {}", node.name);
        node.level_of_detail = Some(self.config.level_of_detail);
        RenderNodeAction::Proceed
    }

    fn on_view_end(&mut self, view_id: ElementId) {
        log::trace!("ViewEnd {}", view_id);
    }

    fn on_link_begin(&mut self, node: &LinkNode) -> RenderNodeAction {
        log::trace!("LinkBegin {}", node.name);
        self.context.enter_link(node);
        RenderNodeAction::Proceed
    }

    fn on_link_end(&mut self, node: &LinkNode) {
        log::trace!("LinkEnd {}", node.name);
        self.context.leave_link();
    }

    fn on_element_begin(&mut self, element_id: ElementId) -> RenderNodeAction {
        let document = self.context.current_document();
        if let Some(element) = document.element(element_id) {
            if element.category.is_none() {
                log::debug!("Skipping non-category element {}", element_id);
                self.stats.elements_skipped += 1;
                return RenderNodeAction::Skip;
            }
        }

        log::trace!("ElementBegin {}", element_id);
        self.current_element = Some(element_id);
        self.sink.begin_element(element_id);
        RenderNodeAction::Proceed
    }

    fn on_element_end(&mut self, element_id: ElementId) -> Result<()> {
        if self.current_element != Some(element_id) {
            log::trace!("Ignoring end of element {} that was not begun", element_id);
            return Ok(());
        }
        log::trace!("ElementEnd {}", element_id);
        self.current_element = None;
        self.stats.elements_exported += 1;
        self.sink.end_element(element_id)
    }

    fn on_instance_begin(&mut self, node: &InstanceNode) -> RenderNodeAction {
        log::trace!("InstanceBegin {}", node.name);
        self.context.enter_instance(&node.transform);
        RenderNodeAction::Proceed
    }

    fn on_instance_end(&mut self, node: &InstanceNode) {
        log::trace!("InstanceEnd {}", node.name);
        self.context.leave_instance();
    }

    fn on_material(&mut self, node: &MaterialNode) -> Result<()> {
        if let Some((id, document)) = &self.current_material {
            if *id == node.material_id && Arc::ptr_eq(document, self.context.current_document()) {
                return Ok(());
            }
        }

        log::trace!("Material {} {}", node.material_id, node.name);
        let material = self.resolve_material(node);
        self.sink.use_material(&material)?;
        self.current_material = Some((
            node.material_id,
            Arc::clone(self.context.current_document()),
        ));
        Ok(())
    }

    fn on_light(&mut self, node: &LightNode) {
        log::trace!("Light {} ignored", node.name);
    }

    fn on_rpc(&mut self, node: &RpcNode) {
        log::trace!("RPC {} ignored", node.name);
    }

    fn on_polymesh(&mut self, polymesh: &PolymeshTopology) -> Result<()> {
        let Some(element_id) = self.current_element else {
            log::warn!("Ignoring polymesh outside of an element");
            return Ok(());
        };
        polymesh.validate()?;

        if self.current_material.is_none() {
            let fallback = self.materials.fallback();
            self.sink.use_material(&fallback)?;
            self.current_material = Some((
                ElementId::INVALID,
                Arc::clone(self.context.current_document()),
            ));
        }

        log::debug!(
            "Polymesh for {}: {} points, {} facets",
            element_id,
            polymesh.number_of_points(),
            polymesh.number_of_facets()
        );
        self.stats.polymeshes += 1;
        self.stats.triangles += polymesh.number_of_facets();
        self.sink
            .add_polymesh(polymesh, self.context.current_transform())
    }

    fn is_canceled(&mut self) -> bool {
        self.cancel.is_canceled()
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::info!(
            "Finished export: {} elements, {} skipped, {} polymeshes, {} triangles",
            self.stats.elements_exported,
            self.stats.elements_skipped,
            self.stats.polymeshes,
            self.stats.triangles
        );
        self.sink.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Element, Material};
    use crate::types::{Color, PolymeshFacet};

    #[derive(Debug, PartialEq)]
    enum Event {
        Open,
        Begin(ElementId),
        Material(String),
        Polymesh(usize, [f64; 3]),
        End(ElementId),
        Close,
    }

    struct Recorder {
        source: MaterialSource,
        events: Vec<Event>,
        materials: Vec<Rc<ResolvedMaterial>>,
    }

    impl Recorder {
        fn new(source: MaterialSource) -> Self {
            Self {
                source,
                events: Vec::new(),
                materials: Vec::new(),
            }
        }
    }

    impl GeometrySink for Recorder {
        fn material_source(&self) -> MaterialSource {
            self.source
        }

        fn open(&mut self) -> Result<()> {
            self.events.push(Event::Open);
            Ok(())
        }

        fn begin_element(&mut self, element_id: ElementId) {
            self.events.push(Event::Begin(element_id));
        }

        fn use_material(&mut self, material: &Rc<ResolvedMaterial>) -> Result<()> {
            self.events.push(Event::Material(material.name.clone()));
            self.materials.push(Rc::clone(material));
            Ok(())
        }

        fn add_polymesh(&mut self, polymesh: &PolymeshTopology, transform: &Transform) -> Result<()> {
            let first = transform.of_point(polymesh.points[0]);
            self.events.push(Event::Polymesh(polymesh.number_of_points(), first));
            Ok(())
        }

        fn end_element(&mut self, element_id: ElementId) -> Result<()> {
            self.events.push(Event::End(element_id));
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.events.push(Event::Close);
            Ok(())
        }
    }

    fn triangle() -> PolymeshTopology {
        PolymeshTopology::new(
            vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            vec![PolymeshFacet::new(0, 1, 2)],
        )
    }

    fn host_document() -> Arc<Document> {
        Arc::new(
            Document::new("host")
                .with_element(Element::new(ElementId(1), Some("Walls")))
                .with_element(Element::new(ElementId(2), None))
                .with_material(Material::new(ElementId(100), "uid-100", Color::new(200, 10, 10), 0)),
        )
    }

    #[test]
    fn test_non_category_element_is_skipped() {
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        );
        assert_eq!(exporter.on_element_begin(ElementId(2)), RenderNodeAction::Skip);
        assert_eq!(exporter.on_element_begin(ElementId(1)), RenderNodeAction::Proceed);
        // Elements unknown to the document are exported
        exporter.on_element_end(ElementId(1)).unwrap();
        assert_eq!(exporter.on_element_begin(ElementId(99)), RenderNodeAction::Proceed);
        assert_eq!(exporter.stats().elements_skipped, 1);
    }

    #[test]
    fn test_repeated_material_is_resolved_once() {
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        );
        let node = MaterialNode::new(ElementId(100), Color::default(), 0.0);

        exporter.on_element_begin(ElementId(1));
        for _ in 0..5 {
            exporter.on_material(&node).unwrap();
        }
        exporter.on_element_end(ElementId(1)).unwrap();
        exporter.on_element_begin(ElementId(1));
        exporter.on_material(&MaterialNode::new(ElementId::INVALID, Color::default(), 0.0)).unwrap();
        exporter.on_material(&node).unwrap();

        assert_eq!(exporter.materials().resolutions(), 1);
        let sink = exporter.sink();
        assert_eq!(sink.materials.len(), 3);
        assert!(Rc::ptr_eq(&sink.materials[0], &sink.materials[2]));
        assert_eq!(sink.materials[0].name, "uid-100");
        assert_eq!(sink.materials[1].name, "Default");
    }

    #[test]
    fn test_invalid_material_always_maps_to_shared_default() {
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Node { with_texture: false }),
            ExportConfig::default(),
        );
        let invalid = MaterialNode::new(ElementId::INVALID, Color::new(1, 2, 3), 0.5);
        let other = MaterialNode::new(ElementId(100), Color::new(1, 2, 3), 0.0);

        exporter.on_material(&invalid).unwrap();
        exporter.on_material(&other).unwrap();
        exporter.on_material(&invalid).unwrap();

        let sink = exporter.sink();
        assert!(Rc::ptr_eq(&sink.materials[0], &sink.materials[2]));
        assert!(Rc::ptr_eq(&sink.materials[0], &exporter.materials().fallback()));
        assert_eq!(sink.materials[0].color, Color::NEUTRAL_GRAY);
    }

    #[test]
    fn test_missing_document_material_falls_back() {
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        );
        exporter
            .on_material(&MaterialNode::new(ElementId(555), Color::default(), 0.0))
            .unwrap();
        assert!(Rc::ptr_eq(&exporter.sink().materials[0], &exporter.materials().fallback()));
    }

    #[test]
    fn test_link_and_instance_transforms_apply_to_points() {
        let linked = Arc::new(
            Document::new("linked model")
                .with_element(Element::new(ElementId(1), Some("Floors")))
                .with_material(Material::new(ElementId(100), "linked-100", Color::new(0, 0, 255), 0)),
        );
        let link = LinkNode {
            name: "link".into(),
            transform: Transform::from_translation([100.0, 0.0, 0.0]),
            document: Arc::clone(&linked),
        };
        let instance = InstanceNode {
            name: "inst".into(),
            transform: Transform::from_translation([0.0, 10.0, 0.0]),
        };
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        );

        exporter.start().unwrap();
        exporter.on_link_begin(&link);
        exporter.on_element_begin(ElementId(1));
        exporter.on_instance_begin(&instance);
        exporter
            .on_material(&MaterialNode::new(ElementId(100), Color::default(), 0.0))
            .unwrap();
        exporter.on_polymesh(&triangle()).unwrap();
        exporter.on_instance_end(&instance);
        exporter.on_element_end(ElementId(1)).unwrap();
        exporter.on_link_end(&link);
        exporter.finish().unwrap();

        assert_eq!(exporter.context().transforms().depth(), 1);
        assert_eq!(exporter.context().documents().depth(), 1);
        assert_eq!(
            exporter.sink().events,
            vec![
                Event::Open,
                Event::Begin(ElementId(1)),
                Event::Material("linked-100".into()),
                Event::Polymesh(3, [101.0, 10.0, 0.0]),
                Event::End(ElementId(1)),
                Event::Close,
            ]
        );
    }

    #[test]
    fn test_same_material_id_in_link_is_not_short_circuited() {
        let linked = Arc::new(Document::new("other").with_material(Material::new(
            ElementId(100),
            "other-100",
            Color::new(0, 255, 0),
            0,
        )));
        let link = LinkNode {
            name: "link".into(),
            transform: Transform::IDENTITY,
            document: linked,
        };
        let node = MaterialNode::new(ElementId(100), Color::default(), 0.0);
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        );

        exporter.on_material(&node).unwrap();
        exporter.on_link_begin(&link);
        exporter.on_material(&node).unwrap();

        let names: Vec<_> = exporter.sink().materials.iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["uid-100", "other-100"]);
    }

    #[test]
    fn test_polymesh_without_material_uses_default() {
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        );
        exporter.on_element_begin(ElementId(1));
        exporter.on_polymesh(&triangle()).unwrap();
        assert_eq!(exporter.sink().events[1], Event::Material("Default".into()));
        assert_eq!(exporter.stats().triangles, 1);
    }

    #[test]
    fn test_invalid_topology_is_an_error() {
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        );
        exporter.on_element_begin(ElementId(1));
        let bad = PolymeshTopology::new(vec![[0.0; 3]], vec![PolymeshFacet::new(0, 1, 2)]);
        assert!(exporter.on_polymesh(&bad).is_err());
    }

    #[test]
    fn test_view_receives_level_of_detail_and_finish_is_idempotent() {
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default().with_level_of_detail(3),
        );
        let mut view = ViewNode::default();
        assert_eq!(exporter.on_view_begin(&mut view), RenderNodeAction::Proceed);
        assert_eq!(view.level_of_detail, Some(3));

        exporter.finish().unwrap();
        exporter.finish().unwrap();
        assert_eq!(exporter.sink().events, vec![Event::Close]);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let mut exporter = Exporter::new(
            host_document(),
            Recorder::new(MaterialSource::Document),
            ExportConfig::default(),
        )
        .with_cancel_token(token.clone());
        assert!(!exporter.is_canceled());
        token.cancel();
        assert!(exporter.is_canceled());
    }
}

//! Transform and document scope stacks.

use crate::document::Document;
use crate::types::{LinkNode, Transform};
use std::sync::Arc;

/// Composed local-to-world transforms for the current traversal path.
///
/// The identity entry is pushed at construction and is never popped.
#[derive(Debug, Clone)]
pub struct TransformStack {
    stack: Vec<Transform>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self {
            stack: vec![Transform::IDENTITY],
        }
    }

    /// The composed transform at the top of the stack.
    pub fn current(&self) -> &Transform {
        // Never empty: the root entry cannot be popped.
        &self.stack[self.stack.len() - 1]
    }

    /// Push `current * local`.
    pub fn push(&mut self, local: &Transform) {
        let composed = self.current().multiply(local);
        self.stack.push(composed);
    }

    /// Restore the parent scope's transform.
    ///
    /// # Panics
    ///
    /// Panics when only the root entry is left; a matching push is missing.
    pub fn pop(&mut self) -> Transform {
        assert!(
            self.stack.len() > 1,
            "transform stack underflow: pop without a matching push"
        );
        self.stack.pop().unwrap_or(Transform::IDENTITY)
    }

    /// Number of entries, including the root.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Documents that element and material IDs resolve against.
#[derive(Debug, Clone)]
pub struct DocumentStack {
    stack: Vec<Arc<Document>>,
}

impl DocumentStack {
    pub fn new(root: Arc<Document>) -> Self {
        Self { stack: vec![root] }
    }

    pub fn current(&self) -> &Arc<Document> {
        &self.stack[self.stack.len() - 1]
    }

    pub fn push(&mut self, document: Arc<Document>) {
        self.stack.push(document);
    }

    /// # Panics
    ///
    /// Panics when only the root document is left.
    pub fn pop(&mut self) -> Arc<Document> {
        assert!(
            self.stack.len() > 1,
            "document stack underflow: link end without a matching link begin"
        );
        let top = self.stack.pop();
        top.unwrap_or_else(|| Arc::clone(&self.stack[0]))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Per-run traversal state: both scope stacks, moved in lockstep on links.
#[derive(Debug, Clone)]
pub struct TraversalContext {
    transforms: TransformStack,
    documents: DocumentStack,
}

impl TraversalContext {
    pub fn new(root: Arc<Document>) -> Self {
        Self {
            transforms: TransformStack::new(),
            documents: DocumentStack::new(root),
        }
    }

    /// A link scope pushes both its document and its transform.
    pub fn enter_link(&mut self, link: &LinkNode) {
        self.documents.push(Arc::clone(&link.document));
        self.transforms.push(&link.transform);
    }

    pub fn leave_link(&mut self) {
        self.transforms.pop();
        self.documents.pop();
    }

    /// An instance scope only pushes a transform.
    pub fn enter_instance(&mut self, transform: &Transform) {
        self.transforms.push(transform);
    }

    pub fn leave_instance(&mut self) {
        self.transforms.pop();
    }

    pub fn current_transform(&self) -> &Transform {
        self.transforms.current()
    }

    pub fn current_document(&self) -> &Arc<Document> {
        self.documents.current()
    }

    pub fn transforms(&self) -> &TransformStack {
        &self.transforms
    }

    pub fn documents(&self) -> &DocumentStack {
        &self.documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn link(title: &str, transform: Transform) -> LinkNode {
        LinkNode {
            name: title.to_string(),
            transform,
            document: Arc::new(Document::new(title)),
        }
    }

    #[test]
    fn test_push_pop_restores_state() {
        let mut stack = TransformStack::new();
        let transforms = [
            Transform::from_translation([1.0, 2.0, 3.0]),
            Transform::from_rotation_z(FRAC_PI_2),
            Transform::from_translation([-4.0, 0.0, 0.5]),
        ];

        for t in &transforms {
            stack.push(t);
        }
        assert_eq!(stack.depth(), 4);
        for _ in &transforms {
            stack.pop();
        }
        assert_eq!(stack.depth(), 1);
        assert!(stack.current().is_identity());
    }

    #[test]
    fn test_push_composes_parent_first() {
        let mut stack = TransformStack::new();
        let t1 = Transform::from_translation([10.0, 0.0, 0.0]);
        let t2 = Transform::from_rotation_z(FRAC_PI_2);
        let t3 = Transform::from_translation([0.0, 0.0, 2.0]);
        stack.push(&t1);
        stack.push(&t2);
        stack.push(&t3);

        let expected = t1.multiply(&t2).multiply(&t3);
        assert!(stack.current().abs_diff_eq(&expected, 1e-12));

        let p = stack.current().of_point([1.0, 0.0, 0.0]);
        assert!((p[0] - 10.0).abs() < 1e-9);
        assert!((p[1] - 1.0).abs() < 1e-9);
        assert!((p[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "transform stack underflow")]
    fn test_transform_underflow_panics() {
        let mut stack = TransformStack::new();
        stack.pop();
    }

    #[test]
    #[should_panic(expected = "document stack underflow")]
    fn test_document_underflow_panics() {
        let mut stack = DocumentStack::new(Arc::new(Document::new("root")));
        stack.pop();
    }

    #[test]
    fn test_links_move_both_stacks_instances_only_transforms() {
        let mut ctx = TraversalContext::new(Arc::new(Document::new("root")));

        ctx.enter_link(&link("a", Transform::from_translation([1.0, 0.0, 0.0])));
        ctx.enter_instance(&Transform::from_translation([0.0, 1.0, 0.0]));
        ctx.enter_link(&link("b", Transform::from_translation([0.0, 0.0, 1.0])));

        assert_eq!(ctx.current_document().title, "b");
        assert_eq!(ctx.documents().depth(), 3);
        assert_eq!(ctx.transforms().depth(), 4);
        assert_eq!(ctx.current_transform().of_point([0.0; 3]), [1.0, 1.0, 1.0]);

        ctx.leave_link();
        assert_eq!(ctx.current_document().title, "a");
        ctx.leave_instance();
        assert_eq!(ctx.current_document().title, "a");
        ctx.leave_link();

        assert_eq!(ctx.current_document().title, "root");
        assert_eq!(ctx.documents().depth(), 1);
        assert!(ctx.current_transform().is_identity());
    }
}

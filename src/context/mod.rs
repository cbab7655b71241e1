//! The inbound traversal protocol.
//!
//! The host walks its render tree and calls into an [`ExportContext`] in a
//! fixed nested order:
//!
//! ```text
//! start
//!   view_begin
//!     [link_begin ... link_end]*          (recursive)
//!       element_begin
//!         [instance_begin ... instance_end]*   (recursive)
//!           material / light / rpc
//!           [face_begin] polymesh [face_end]
//!       element_end
//!   view_end
//! finish
//! ```
//!
//! `is_canceled` is polled before every element. Every `*_begin` returns a
//! [`RenderNodeAction`]; on [`RenderNodeAction::Skip`] the host neither
//! descends into the node nor calls the matching `*_end`.

mod stack;

pub use stack::{DocumentStack, TraversalContext, TransformStack};

use crate::error::Result;
use crate::types::{
    ElementId, FaceNode, InstanceNode, LightNode, LinkNode, MaterialNode, PolymeshTopology,
    RenderNodeAction, RpcNode, ViewNode,
};

/// Receiver of host traversal callbacks.
pub trait ExportContext {
    /// Called once before anything else; opens output artifacts.
    fn start(&mut self) -> Result<()>;

    /// The view may be annotated, e.g. with a tessellation level of detail.
    fn on_view_begin(&mut self, node: &mut ViewNode) -> RenderNodeAction;

    fn on_view_end(&mut self, view_id: ElementId);

    fn on_link_begin(&mut self, node: &LinkNode) -> RenderNodeAction;

    fn on_link_end(&mut self, node: &LinkNode);

    fn on_element_begin(&mut self, element_id: ElementId) -> RenderNodeAction;

    /// Flush the element's geometry.
    fn on_element_end(&mut self, element_id: ElementId) -> Result<()>;

    fn on_instance_begin(&mut self, node: &InstanceNode) -> RenderNodeAction;

    fn on_instance_end(&mut self, node: &InstanceNode);

    /// May be called for every batch, whether or not the material changed.
    fn on_material(&mut self, node: &MaterialNode) -> Result<()>;

    fn on_light(&mut self, _node: &LightNode) {}

    fn on_rpc(&mut self, _node: &RpcNode) {}

    fn on_face_begin(&mut self, _node: &FaceNode) -> RenderNodeAction {
        RenderNodeAction::Proceed
    }

    fn on_face_end(&mut self, _node: &FaceNode) {}

    fn on_polymesh(&mut self, polymesh: &PolymeshTopology) -> Result<()>;

    fn is_canceled(&mut self) -> bool {
        false
    }

    /// Called once at the end, also after cancellation or a failed callback.
    fn finish(&mut self) -> Result<()>;
}

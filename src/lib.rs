//! # Render Export
//!
//! Converts a CAD render tree into mesh interchange files.
//!
//! ## Overview
//!
//! A host application walks the 3D view and reports what it finds through
//! the [`ExportContext`] callbacks: links to other documents, elements,
//! nested instances, materials and tessellated polymesh batches. The
//! [`Exporter`] keeps the transform and document context for the current
//! position in that tree, resolves and caches materials, and hands world
//! space geometry to one of two sinks:
//!
//! - [`ObjSink`] streams Wavefront OBJ records and an MTL palette.
//! - [`GltfSink`] builds one glTF node per element, written as GLB or as
//!   `.gltf` with a `.bin` buffer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use render_export::{load_scene, ExportConfig, Exporter, GltfSink, SceneWalker};
//!
//! let scene = load_scene("house.json")?;
//! let walker = SceneWalker::new(&scene)?;
//!
//! let mut exporter = Exporter::new(walker.root_document(), GltfSink::new(), ExportConfig::default());
//! walker.export(&mut exporter)?;
//!
//! exporter.into_sink().into_model().save_glb("house.glb".as_ref())?;
//! ```

pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod export;
pub mod exporter;
pub mod geometry;
pub mod material;
pub mod scene;
pub mod types;

// Re-export main types for convenience
pub use config::ExportConfig;
pub use context::{ExportContext, TraversalContext};
pub use document::{AssetProperty, Document, Element, Material};
pub use error::{ExportError, Result};
pub use export::gltf::{GltfContainer, GltfExporter, GltfSink, SceneModel};
pub use export::obj::{create_obj_exporter, ObjExporter, ObjSink};
pub use exporter::{CancelToken, ExportStats, Exporter, GeometrySink, MaterialSource};
pub use material::{MaterialCache, ResolvedMaterial};
pub use scene::{load_scene, load_scene_from_str, ExportSummary, SceneFile, SceneWalker};
pub use types::{ElementId, PolymeshTopology, RenderNodeAction, Transform};

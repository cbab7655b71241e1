//! Output formats.
//!
//! This module provides the two geometry sinks: a streaming OBJ/MTL writer
//! and a node-graph glTF/GLB builder.

pub mod gltf;
pub mod obj;

pub use gltf::{GltfContainer, GltfExporter, GltfSink, SceneModel};
pub use obj::{create_obj_exporter, ObjExporter, ObjPaths, ObjSink};

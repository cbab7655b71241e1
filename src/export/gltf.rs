//! glTF/GLB export.
//!
//! Geometry is collected per element into a [`MeshBuilder`] and turned into
//! one scene node when the element ends. The finished [`SceneModel`] can be
//! written as a single binary GLB or as a `.gltf` text file with a separate
//! `.bin` buffer.

use crate::error::{ExportError, Result};
use crate::exporter::{Exporter, GeometrySink, MaterialSource};
use crate::geometry::{Mesh, MeshBuilder, Primitive};
use crate::material::{AlphaMode, ResolvedMaterial};
use crate::types::{ElementId, PolymeshTopology, Transform};
use gltf_json as json;
use json::validation::Checked::Valid;
use json::validation::USize64;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F534A;
const CHUNK_BIN: u32 = 0x004E4942;

/// Map a host point (Z up) into the glTF convention (Y up).
pub fn to_gltf_axes(point: [f64; 3]) -> [f32; 3] {
    let [x, y, z] = point;
    [y as f32, z as f32, x as f32]
}

/// The accumulated node graph: one mesh per exported element.
#[derive(Debug, Clone, Default)]
pub struct SceneModel {
    meshes: Vec<Mesh>,
}

impl SceneModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a finished mesh to a new node.
    pub fn add_node(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    pub fn node_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Serialize as a binary GLB container.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let (root, buffer) = self.build_root(None);
        let json_string = json::serialize::to_string(&root)
            .map_err(|e| ExportError::Export(format!("Failed to serialize glTF JSON: {}", e)))?;
        Ok(write_glb(json_string.as_bytes(), &buffer))
    }

    /// Serialize as glTF JSON text plus the binary buffer it references
    /// through `bin_uri`.
    pub fn to_gltf(&self, bin_uri: &str) -> Result<(String, Vec<u8>)> {
        let (root, buffer) = self.build_root(Some(bin_uri.to_string()));
        let json_string = json::serialize::to_string_pretty(&root)
            .map_err(|e| ExportError::Export(format!("Failed to serialize glTF JSON: {}", e)))?;
        Ok((json_string, buffer))
    }

    pub fn save_glb(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_glb()?)?;
        log::info!("Wrote {} ({} nodes)", path.display(), self.node_count());
        Ok(())
    }

    /// Write `<path>` and a `.bin` buffer with the same stem next to it.
    pub fn save_gltf(&self, path: &Path) -> Result<()> {
        let bin_path = path.with_extension("bin");
        let bin_uri = bin_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| ExportError::Export(format!("invalid output path {}", path.display())))?;
        let (text, buffer) = self.to_gltf(&bin_uri)?;
        fs::write(path, text)?;
        if !buffer.is_empty() {
            fs::write(&bin_path, buffer)?;
        }
        log::info!("Wrote {} ({} nodes)", path.display(), self.node_count());
        Ok(())
    }

    fn build_root(&self, uri: Option<String>) -> (json::Root, Vec<u8>) {
        let mut buffer: Vec<u8> = Vec::new();
        let mut accessors = Vec::new();
        let mut buffer_views = Vec::new();
        let mut materials: Vec<Rc<ResolvedMaterial>> = Vec::new();
        let mut meshes = Vec::new();
        let mut nodes = Vec::new();

        for mesh in &self.meshes {
            let mut primitives = Vec::new();
            for primitive in &mesh.primitives {
                let material = match materials
                    .iter()
                    .position(|m| Rc::ptr_eq(m, primitive.material()))
                {
                    Some(index) => index,
                    None => {
                        materials.push(Rc::clone(primitive.material()));
                        materials.len() - 1
                    }
                };
                primitives.push(append_primitive(
                    primitive,
                    material as u32,
                    &mut buffer,
                    &mut buffer_views,
                    &mut accessors,
                ));
            }

            let mesh_index = meshes.len() as u32;
            meshes.push(json::Mesh {
                extensions: Default::default(),
                extras: Default::default(),
                name: Some(mesh.name.clone()),
                primitives,
                weights: None,
            });
            nodes.push(json::Node {
                camera: None,
                children: None,
                extensions: Default::default(),
                extras: Default::default(),
                matrix: None,
                mesh: Some(json::Index::new(mesh_index)),
                name: Some(mesh.name.clone()),
                rotation: None,
                scale: None,
                translation: None,
                skin: None,
                weights: None,
            });
        }

        let buffers = if buffer.is_empty() {
            Vec::new()
        } else {
            vec![json::Buffer {
                byte_length: USize64(buffer.len() as u64),
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                uri,
            }]
        };

        let root = json::Root {
            accessors,
            buffers,
            buffer_views,
            materials: materials.iter().map(|m| create_material(m)).collect(),
            meshes,
            scenes: vec![json::Scene {
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                nodes: (0..nodes.len() as u32).map(json::Index::new).collect(),
            }],
            nodes,
            scene: Some(json::Index::new(0)),
            ..Default::default()
        };
        (root, buffer)
    }
}

/// Append a primitive's positions and indices to the buffer and describe them.
fn append_primitive(
    primitive: &Primitive,
    material: u32,
    buffer: &mut Vec<u8>,
    buffer_views: &mut Vec<json::buffer::View>,
    accessors: &mut Vec<json::Accessor>,
) -> json::mesh::Primitive {
    let pos_offset = buffer.len();
    for value in primitive.positions_flat() {
        buffer.extend_from_slice(&value.to_le_bytes());
    }
    let idx_offset = buffer.len();
    for index in &primitive.indices {
        buffer.extend_from_slice(&index.to_le_bytes());
    }
    let end = buffer.len();

    let pos_view = buffer_views.len() as u32;
    buffer_views.push(create_buffer_view(
        pos_offset,
        idx_offset - pos_offset,
        json::buffer::Target::ArrayBuffer,
    ));
    let idx_view = buffer_views.len() as u32;
    buffer_views.push(create_buffer_view(
        idx_offset,
        end - idx_offset,
        json::buffer::Target::ElementArrayBuffer,
    ));

    let (min, max) = primitive.bounds();
    let pos_accessor = accessors.len() as u32;
    accessors.push(create_accessor(
        pos_view,
        primitive.vertex_count(),
        json::accessor::Type::Vec3,
        json::accessor::ComponentType::F32,
        Some((min, max)),
    ));
    let idx_accessor = accessors.len() as u32;
    accessors.push(create_accessor(
        idx_view,
        primitive.indices.len(),
        json::accessor::Type::Scalar,
        json::accessor::ComponentType::U32,
        None,
    ));

    let mut attributes = BTreeMap::new();
    attributes.insert(
        Valid(json::mesh::Semantic::Positions),
        json::Index::new(pos_accessor),
    );
    json::mesh::Primitive {
        attributes,
        extensions: Default::default(),
        extras: Default::default(),
        indices: Some(json::Index::new(idx_accessor)),
        material: Some(json::Index::new(material)),
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
    }
}

fn create_buffer_view(
    offset: usize,
    size: usize,
    target: json::buffer::Target,
) -> json::buffer::View {
    json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64(size as u64),
        byte_offset: Some(USize64(offset as u64)),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: Some(Valid(target)),
    }
}

fn create_accessor(
    buffer_view: u32,
    count: usize,
    type_: json::accessor::Type,
    component_type: json::accessor::ComponentType,
    bounds: Option<([f32; 3], [f32; 3])>,
) -> json::Accessor {
    json::Accessor {
        buffer_view: Some(json::Index::new(buffer_view)),
        byte_offset: Some(USize64(0)),
        count: USize64(count as u64),
        component_type: Valid(json::accessor::GenericComponentType(component_type)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(type_),
        min: bounds.map(|(min, _)| json::Value::from(min.to_vec())),
        max: bounds.map(|(_, max)| json::Value::from(max.to_vec())),
        name: None,
        normalized: false,
        sparse: None,
    }
}

fn create_material(material: &ResolvedMaterial) -> json::Material {
    let alpha_mode = match material.alpha_mode {
        AlphaMode::Opaque => json::material::AlphaMode::Opaque,
        AlphaMode::Blend => json::material::AlphaMode::Blend,
    };
    json::Material {
        pbr_metallic_roughness: json::material::PbrMetallicRoughness {
            base_color_texture: None,
            base_color_factor: json::material::PbrBaseColorFactor(material.base_color()),
            metallic_factor: json::material::StrengthFactor(0.0),
            roughness_factor: json::material::StrengthFactor(1.0),
            metallic_roughness_texture: None,
            extensions: Default::default(),
            extras: Default::default(),
        },
        alpha_mode: Valid(alpha_mode),
        alpha_cutoff: None,
        double_sided: material.double_sided,
        name: Some(material.name.clone()),
        normal_texture: None,
        occlusion_texture: None,
        emissive_texture: None,
        emissive_factor: json::material::EmissiveFactor([0.0, 0.0, 0.0]),
        extensions: Default::default(),
        extras: Default::default(),
    }
}

/// Assemble a GLB container. The BIN chunk is omitted for an empty buffer.
fn write_glb(json_bytes: &[u8], buffer: &[u8]) -> Vec<u8> {
    // Pad JSON to 4-byte alignment
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let padded_json_len = json_bytes.len() + json_padding;

    let buffer_padding = (4 - (buffer.len() % 4)) % 4;
    let padded_buffer_len = buffer.len() + buffer_padding;

    let mut total_size = 12 + 8 + padded_json_len;
    if !buffer.is_empty() {
        total_size += 8 + padded_buffer_len;
    }

    let mut glb = Vec::with_capacity(total_size);

    // GLB Header
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(total_size as u32).to_le_bytes());

    // JSON Chunk
    glb.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(json_bytes);
    glb.extend(std::iter::repeat(0x20u8).take(json_padding));

    // BIN Chunk
    if !buffer.is_empty() {
        glb.extend_from_slice(&(padded_buffer_len as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(buffer);
        glb.extend(std::iter::repeat(0u8).take(buffer_padding));
    }

    glb
}

/// Container written when the sink is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GltfContainer {
    Glb,
    /// `.gltf` text plus a `.bin` buffer.
    Gltf,
}

impl GltfContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            GltfContainer::Glb => "glb",
            GltfContainer::Gltf => "gltf",
        }
    }
}

/// Collects element meshes into a [`SceneModel`].
#[derive(Debug, Default)]
pub struct GltfSink {
    model: SceneModel,
    builder: Option<MeshBuilder>,
    material: Option<Rc<ResolvedMaterial>>,
    outputs: Vec<(PathBuf, GltfContainer)>,
}

impl GltfSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also save the scene to `path` when the export finishes.
    pub fn with_output(mut self, path: impl Into<PathBuf>, container: GltfContainer) -> Self {
        self.outputs.push((path.into(), container));
        self
    }

    pub fn model(&self) -> &SceneModel {
        &self.model
    }

    pub fn into_model(self) -> SceneModel {
        self.model
    }
}

impl GeometrySink for GltfSink {
    fn material_source(&self) -> MaterialSource {
        MaterialSource::Document
    }

    fn begin_element(&mut self, element_id: ElementId) {
        self.builder = Some(MeshBuilder::new(element_id.to_string()));
    }

    fn use_material(&mut self, material: &Rc<ResolvedMaterial>) -> Result<()> {
        self.material = Some(Rc::clone(material));
        Ok(())
    }

    fn add_polymesh(&mut self, polymesh: &PolymeshTopology, transform: &Transform) -> Result<()> {
        let (Some(builder), Some(material)) = (self.builder.as_mut(), self.material.as_ref()) else {
            return Ok(());
        };
        let points: Vec<[f32; 3]> = polymesh
            .points
            .iter()
            .map(|p| to_gltf_axes(transform.of_point(*p)))
            .collect();

        let primitive = builder.use_primitive(material);
        for facet in &polymesh.facets {
            let [a, b, c] = facet.indices().map(|i| points[i as usize]);
            primitive.add_triangle(a, b, c);
        }
        Ok(())
    }

    fn end_element(&mut self, element_id: ElementId) -> Result<()> {
        let Some(builder) = self.builder.take() else {
            return Ok(());
        };
        match builder.build() {
            Some(mesh) => {
                log::debug!(
                    "Element {} produced {} primitives, {} triangles",
                    element_id,
                    mesh.primitives.len(),
                    mesh.triangle_count()
                );
                self.model.add_node(mesh);
            }
            None => log::debug!("Element {} produced no geometry", element_id),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // An unfinished element is dropped rather than half-exported
        self.builder = None;
        let mut first_error = None;
        for (path, container) in &self.outputs {
            let written = match container {
                GltfContainer::Glb => self.model.save_glb(path),
                GltfContainer::Gltf => self.model.save_gltf(path),
            };
            if let Err(e) = written {
                log::warn!("Failed to write {}: {}", path.display(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Node-graph exporter collecting into a [`GltfSink`].
pub type GltfExporter = Exporter<GltfSink>;

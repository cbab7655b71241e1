//! Wavefront OBJ export.
//!
//! OBJ is a simple, widely-supported text-based 3D format. Geometry is
//! streamed straight to the writer as batches arrive: every polymesh batch
//! becomes a fresh block of `v`/`vt` records, and its faces are offset by the
//! number of points written before it (OBJ indices are global and 1-based).
//! Materials go to a companion MTL palette, one entry per material identity.

use crate::config::ExportConfig;
use crate::error::Result;
use crate::exporter::{Exporter, GeometrySink, MaterialSource};
use crate::document::Document;
use crate::material::{ResolvedMaterial, TextureBinding};
use crate::types::{ElementId, PolymeshTopology, Transform};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Where located textures are copied from and to.
#[derive(Debug, Clone)]
pub struct TextureCopy {
    /// Texture library root the bitmap paths are relative to.
    pub library: PathBuf,
    /// Directory receiving the copies (next to the MTL file).
    pub destination: PathBuf,
}

/// Streams OBJ records and MTL entries to a pair of writers.
pub struct ObjSink<W: Write> {
    obj: W,
    mtl: W,
    mtl_name: String,
    textures: Option<TextureCopy>,
    /// Palette entries already written.
    written: HashSet<String>,
    material: Option<Rc<ResolvedMaterial>>,
    element: Option<ElementId>,
    /// `o` record already written for the current element.
    object_open: bool,
    /// Material last announced with `usemtl` inside the current object.
    active_usemtl: Option<String>,
    /// Points written so far; the index base of the next batch.
    vertex_offset: usize,
    uv_offset: usize,
}

impl<W: Write> ObjSink<W> {
    /// `mtl_name` is the file name the OBJ's `mtllib` record refers to.
    pub fn new(obj: W, mtl: W, mtl_name: impl Into<String>) -> Self {
        Self {
            obj,
            mtl,
            mtl_name: mtl_name.into(),
            textures: None,
            written: HashSet::new(),
            material: None,
            element: None,
            object_open: false,
            active_usemtl: None,
            vertex_offset: 0,
            uv_offset: 0,
        }
    }

    pub fn with_texture_copy(mut self, textures: TextureCopy) -> Self {
        self.textures = Some(textures);
        self
    }

    /// Running global vertex offset.
    pub fn vertex_offset(&self) -> usize {
        self.vertex_offset
    }

    /// Release the writers, e.g. to inspect in-memory output.
    pub fn into_writers(self) -> (W, W) {
        (self.obj, self.mtl)
    }

    fn write_palette_entry(&mut self, material: &ResolvedMaterial) -> Result<()> {
        let [r, g, b] = material.color.to_rgb();
        writeln!(self.mtl, "newmtl {}", material.name)?;
        writeln!(self.mtl, "Ka {} {} {}", r, g, b)?;
        writeln!(self.mtl, "Kd {} {} {}", r, g, b)?;
        writeln!(self.mtl, "d {}", material.alpha)?;
        if let Some(texture) = &material.texture {
            if let Some(file_name) = texture.file_name() {
                writeln!(self.mtl, "map_Kd {}", file_name)?;
                self.copy_texture(texture, file_name);
            }
        }
        writeln!(self.mtl)?;
        Ok(())
    }

    /// Copy a texture next to the palette. Failures are logged, never fatal.
    fn copy_texture(&self, texture: &TextureBinding, file_name: &str) {
        let Some(copy) = &self.textures else {
            return;
        };
        let source = texture.resolve_in(&copy.library);
        if !source.is_file() {
            log::warn!("Texture {} not found in library", source.display());
            return;
        }
        let target = copy.destination.join(file_name);
        match fs::copy(&source, &target) {
            Ok(_) => log::debug!("Copied texture {} to {}", source.display(), target.display()),
            Err(e) => log::warn!("Failed to copy texture {}: {}", source.display(), e),
        }
    }
}

impl<W: Write> GeometrySink for ObjSink<W> {
    fn material_source(&self) -> MaterialSource {
        MaterialSource::Node { with_texture: true }
    }

    fn open(&mut self) -> Result<()> {
        writeln!(self.obj, "# Render Export OBJ")?;
        writeln!(self.obj, "mtllib {}", self.mtl_name)?;
        writeln!(self.mtl, "# Render Export Material")?;
        writeln!(self.mtl)?;
        Ok(())
    }

    fn begin_element(&mut self, element_id: ElementId) {
        self.element = Some(element_id);
        self.object_open = false;
        self.active_usemtl = None;
    }

    fn use_material(&mut self, material: &Rc<ResolvedMaterial>) -> Result<()> {
        if self.written.insert(material.name.clone()) {
            self.write_palette_entry(material)?;
        }
        self.material = Some(Rc::clone(material));
        Ok(())
    }

    fn add_polymesh(&mut self, polymesh: &PolymeshTopology, transform: &Transform) -> Result<()> {
        if !self.object_open {
            let name = self.element.unwrap_or(ElementId::INVALID);
            writeln!(self.obj, "o {}", name)?;
            self.object_open = true;
        }
        if let Some(material) = &self.material {
            if self.active_usemtl.as_deref() != Some(material.name.as_str()) {
                writeln!(self.obj, "usemtl {}", material.name)?;
                self.active_usemtl = Some(material.name.clone());
            }
        }

        for point in &polymesh.points {
            let [x, y, z] = transform.of_point(*point);
            writeln!(self.obj, "v {} {} {}", x, y, z)?;
        }
        for uv in &polymesh.uvs {
            writeln!(self.obj, "vt {} {}", uv[0], uv[1])?;
        }

        // Texture coordinates are only referenced when they pair up with points
        let with_uvs = polymesh.uvs.len() == polymesh.points.len();
        let v_base = self.vertex_offset + 1;
        let vt_base = self.uv_offset + 1;
        for facet in &polymesh.facets {
            let [a, b, c] = facet.indices().map(|i| i as usize);
            if with_uvs {
                writeln!(
                    self.obj,
                    "f {}/{} {}/{} {}/{}",
                    a + v_base,
                    a + vt_base,
                    b + v_base,
                    b + vt_base,
                    c + v_base,
                    c + vt_base
                )?;
            } else {
                writeln!(self.obj, "f {} {} {}", a + v_base, b + v_base, c + v_base)?;
            }
        }

        self.vertex_offset += polymesh.number_of_points();
        self.uv_offset += polymesh.uvs.len();
        Ok(())
    }

    fn end_element(&mut self, _element_id: ElementId) -> Result<()> {
        self.element = None;
        self.object_open = false;
        self.active_usemtl = None;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Attempt both flushes before reporting either failure
        let obj = self.obj.flush();
        let mtl = self.mtl.flush();
        obj?;
        mtl?;
        Ok(())
    }
}

/// OBJ exporter writing `<stem>.obj` and `<stem>.mtl` files.
pub type ObjExporter = Exporter<ObjSink<BufWriter<File>>>;

/// Paths of the artifacts an OBJ export writes for a requested output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjPaths {
    pub obj: PathBuf,
    pub mtl: PathBuf,
}

impl ObjPaths {
    /// `<dir>/<stem>.obj` and `<dir>/<stem>.mtl` for any requested path.
    pub fn for_output(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self {
            obj: dir.join(format!("{}.obj", stem)),
            mtl: dir.join(format!("{}.mtl", stem)),
        }
    }

    pub fn mtl_file_name(&self) -> String {
        self.mtl
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Create both output files and an exporter streaming into them.
pub fn create_obj_exporter(
    document: Arc<Document>,
    output: &Path,
    config: ExportConfig,
) -> Result<ObjExporter> {
    let paths = ObjPaths::for_output(output);
    let obj = BufWriter::new(File::create(&paths.obj)?);
    let mtl = BufWriter::new(File::create(&paths.mtl)?);
    let mut sink = ObjSink::new(obj, mtl, paths.mtl_file_name());
    if let Some(library) = &config.texture_library {
        let destination = paths
            .mtl
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        sink = sink.with_texture_copy(TextureCopy {
            library: library.clone(),
            destination,
        });
    }
    log::debug!("Writing {} and {}", paths.obj.display(), paths.mtl.display());
    Ok(Exporter::new(document, sink, config))
}

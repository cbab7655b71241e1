//! Mesh geometry types for the node-graph exporter.
//!
//! Each exported element gets its own [`MeshBuilder`]. Triangles are added by
//! vertex value and grouped into one [`Primitive`] per material; identical
//! positions within a primitive are welded onto one index.

use crate::material::ResolvedMaterial;
use std::collections::HashMap;
use std::rc::Rc;

/// Triangles sharing one material.
#[derive(Debug, Clone)]
pub struct Primitive {
    material: Rc<ResolvedMaterial>,
    /// Vertex positions in the target coordinate convention.
    pub positions: Vec<[f32; 3]>,
    /// Triangle indices (3 per triangle).
    pub indices: Vec<u32>,
    lookup: HashMap<[u32; 3], u32>,
}

impl Primitive {
    pub fn new(material: Rc<ResolvedMaterial>) -> Self {
        Self {
            material,
            positions: Vec::new(),
            indices: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn material(&self) -> &Rc<ResolvedMaterial> {
        &self.material
    }

    /// Add a vertex and return its index, reusing an identical one.
    pub fn add_vertex(&mut self, position: [f32; 3]) -> u32 {
        let key = position.map(f32::to_bits);
        let next = self.positions.len() as u32;
        let index = *self.lookup.entry(key).or_insert(next);
        if index == next {
            self.positions.push(position);
        }
        index
    }

    /// Add a triangle by vertex values.
    pub fn add_triangle(&mut self, a: [f32; 3], b: [f32; 3], c: [f32; 3]) {
        let i0 = self.add_vertex(a);
        let i1 = self.add_vertex(b);
        let i2 = self.add_vertex(c);
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Axis-aligned bounds of the positions.
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in &self.positions {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        if self.positions.is_empty() {
            return ([0.0; 3], [0.0; 3]);
        }
        (min, max)
    }

    /// Positions as a flat array (for buffer upload).
    pub fn positions_flat(&self) -> Vec<f32> {
        self.positions.iter().flat_map(|p| *p).collect()
    }
}

/// An element's mesh under construction.
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    name: String,
    primitives: Vec<Primitive>,
}

impl MeshBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitives: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The primitive for `material`, created on first use.
    pub fn use_primitive(&mut self, material: &Rc<ResolvedMaterial>) -> &mut Primitive {
        let pos = match self
            .primitives
            .iter()
            .position(|p| Rc::ptr_eq(&p.material, material))
        {
            Some(pos) => pos,
            None => {
                self.primitives.push(Primitive::new(Rc::clone(material)));
                self.primitives.len() - 1
            }
        };
        &mut self.primitives[pos]
    }

    /// Returns `true` if no primitive holds a triangle.
    pub fn is_empty(&self) -> bool {
        self.primitives.iter().all(Primitive::is_empty)
    }

    /// Finish the mesh, dropping empty primitives. `None` if nothing is left.
    pub fn build(self) -> Option<Mesh> {
        let primitives: Vec<Primitive> = self
            .primitives
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|mut p| {
                p.lookup = HashMap::new();
                p
            })
            .collect();
        if primitives.is_empty() {
            return None;
        }
        Some(Mesh {
            name: self.name,
            primitives,
        })
    }
}

/// A finished, non-empty mesh.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(Primitive::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(Primitive::triangle_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::TransparencyScale;
    use crate::types::Color;

    fn material(name: &str) -> Rc<ResolvedMaterial> {
        Rc::new(ResolvedMaterial::from_color(
            name,
            Color::default(),
            0.0,
            TransparencyScale::PERCENT,
        ))
    }

    #[test]
    fn test_shared_vertices_are_welded() {
        let mut prim = Primitive::new(material("m"));
        prim.add_triangle([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]);
        prim.add_triangle([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]);

        assert_eq!(prim.vertex_count(), 4);
        assert_eq!(prim.triangle_count(), 2);
        assert_eq!(prim.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_primitives_grouped_by_material() {
        let red = material("red");
        let blue = material("blue");
        let mut builder = MeshBuilder::new("42");

        builder.use_primitive(&red).add_triangle([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        builder.use_primitive(&blue).add_triangle([0.0; 3], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        builder.use_primitive(&red).add_triangle([5.0; 3], [6.0, 5.0, 5.0], [5.0, 6.0, 5.0]);

        let mesh = builder.build().unwrap();
        assert_eq!(mesh.name, "42");
        assert_eq!(mesh.primitives.len(), 2);
        assert_eq!(mesh.primitives[0].triangle_count(), 2);
        assert_eq!(mesh.primitives[1].triangle_count(), 1);
        assert_eq!(mesh.triangle_count(), 3);
    }

    #[test]
    fn test_empty_builder_builds_nothing() {
        let mut builder = MeshBuilder::new("7");
        assert!(builder.is_empty());
        // A batch without facets leaves an empty primitive behind
        builder.use_primitive(&material("m"));
        assert!(builder.is_empty());
        assert!(builder.build().is_none());
    }

    #[test]
    fn test_bounds() {
        let mut prim = Primitive::new(material("m"));
        prim.add_triangle([-1.0, 2.0, 0.0], [3.0, -4.0, 1.0], [0.0, 0.0, 5.0]);
        assert_eq!(prim.bounds(), ([-1.0, -4.0, 0.0], [3.0, 2.0, 5.0]));
    }
}

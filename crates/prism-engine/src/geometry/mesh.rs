use thiserror::Error;

use crate::driver::VertexLayout;

/// Reasons a [`Mesh`] cannot be built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("mesh has no vertices")]
    Empty,

    #[error("positions must have 2 or 3 components, got {0}")]
    BadComponentCount(u32),

    #[error("{len} floats do not divide into {components}-component positions")]
    RaggedPositions { len: usize, components: u32 },

    #[error("{0} vertices/indices do not form whole triangles")]
    IncompleteTriangle(usize),

    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Triangle-list geometry: tightly packed `f32` positions plus optional `u32` indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    positions: Vec<f32>,
    components: u32,
    indices: Option<Vec<u32>>,
}

impl Mesh {
    pub fn new(
        positions: Vec<f32>,
        components: u32,
        indices: Option<Vec<u32>>,
    ) -> Result<Self, GeometryError> {
        if !(2..=3).contains(&components) {
            return Err(GeometryError::BadComponentCount(components));
        }
        if positions.is_empty() {
            return Err(GeometryError::Empty);
        }
        if positions.len() % components as usize != 0 {
            return Err(GeometryError::RaggedPositions {
                len: positions.len(),
                components,
            });
        }

        let vertex_count = positions.len() / components as usize;
        match &indices {
            Some(indices) => {
                if indices.is_empty() || indices.len() % 3 != 0 {
                    return Err(GeometryError::IncompleteTriangle(indices.len()));
                }
                if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                    return Err(GeometryError::IndexOutOfRange {
                        index,
                        vertex_count,
                    });
                }
            }
            None if vertex_count % 3 != 0 => {
                return Err(GeometryError::IncompleteTriangle(vertex_count));
            }
            None => {}
        }

        Ok(Self {
            positions,
            components,
            indices,
        })
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / self.components as usize
    }

    /// Position of vertex `i`, `components` floats long.
    pub fn vertex(&self, i: usize) -> Option<&[f32]> {
        let n = self.components as usize;
        self.positions.get(i * n..(i + 1) * n)
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn indices(&self) -> Option<&[u32]> {
        self.indices.as_deref()
    }

    /// Vertices (or indices) one draw call consumes.
    pub fn draw_count(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.len() as u32,
            None => self.vertex_count() as u32,
        }
    }

    /// Vertex index triples in draw order.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        match &self.indices {
            Some(indices) => indices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
            None => (0..self.vertex_count() as u32 / 3)
                .map(|t| [3 * t, 3 * t + 1, 3 * t + 2])
                .collect(),
        }
    }

    pub fn layout(&self) -> VertexLayout {
        VertexLayout::tightly_packed(self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_index() {
        let err = Mesh::new(vec![0.0; 6], 2, Some(vec![0, 1, 3])).unwrap_err();
        assert_eq!(
            err,
            GeometryError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn rejects_partial_triangles() {
        assert_eq!(
            Mesh::new(vec![0.0; 8], 2, Some(vec![0, 1])).unwrap_err(),
            GeometryError::IncompleteTriangle(2)
        );
        assert_eq!(
            Mesh::new(vec![0.0; 8], 2, None).unwrap_err(),
            GeometryError::IncompleteTriangle(4)
        );
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(
            Mesh::new(vec![0.0; 4], 4, None).unwrap_err(),
            GeometryError::BadComponentCount(4)
        );
        assert_eq!(Mesh::new(vec![], 3, None).unwrap_err(), GeometryError::Empty);
        assert!(matches!(
            Mesh::new(vec![0.0; 10], 3, None),
            Err(GeometryError::RaggedPositions { len: 10, .. })
        ));
    }

    #[test]
    fn vertex_slices_follow_component_count() {
        let mesh = Mesh::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, Some(vec![0, 1, 2])).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.vertex(1), Some(&[3.0, 4.0][..]));
        assert_eq!(mesh.vertex(3), None);
        assert_eq!(mesh.layout().stride, 8);
    }
}

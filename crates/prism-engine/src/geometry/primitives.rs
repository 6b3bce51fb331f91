//! The two built-in meshes.

use super::{GeometryError, Mesh};

/// Half of the edge length shared by both primitives.
pub const HALF_EXTENT: f32 = 0.5;

const QUAD_POSITIONS: [f32; 8] = [
    0.5, 0.5, // top right
    0.5, -0.5, // bottom right
    -0.5, -0.5, // bottom left
    -0.5, 0.5, // top left
];

const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

#[rustfmt::skip]
const CUBE_POSITIONS: [f32; 108] = [
    -0.5, -0.5, -0.5,
     0.5, -0.5, -0.5,
     0.5,  0.5, -0.5,
     0.5,  0.5, -0.5,
    -0.5,  0.5, -0.5,
    -0.5, -0.5, -0.5,

    -0.5, -0.5,  0.5,
     0.5, -0.5,  0.5,
     0.5,  0.5,  0.5,
     0.5,  0.5,  0.5,
    -0.5,  0.5,  0.5,
    -0.5, -0.5,  0.5,

    -0.5,  0.5,  0.5,
    -0.5,  0.5, -0.5,
    -0.5, -0.5, -0.5,
    -0.5, -0.5, -0.5,
    -0.5, -0.5,  0.5,
    -0.5,  0.5,  0.5,

     0.5,  0.5,  0.5,
     0.5,  0.5, -0.5,
     0.5, -0.5, -0.5,
     0.5, -0.5, -0.5,
     0.5, -0.5,  0.5,
     0.5,  0.5,  0.5,

    -0.5, -0.5, -0.5,
     0.5, -0.5, -0.5,
     0.5, -0.5,  0.5,
     0.5, -0.5,  0.5,
    -0.5, -0.5,  0.5,
    -0.5, -0.5, -0.5,

    -0.5,  0.5, -0.5,
     0.5,  0.5, -0.5,
     0.5,  0.5,  0.5,
     0.5,  0.5,  0.5,
    -0.5,  0.5,  0.5,
    -0.5,  0.5, -0.5,
];

/// Axis-aligned square spanning `[-0.5, 0.5]²`: four 2D corners, two indexed triangles.
pub fn quad() -> Result<Mesh, GeometryError> {
    Mesh::new(QUAD_POSITIONS.to_vec(), 2, Some(QUAD_INDICES.to_vec()))
}

/// Unit cube centred on the origin: 36 unindexed 3D vertices, two triangles per face.
pub fn cube() -> Result<Mesh, GeometryError> {
    Mesh::new(CUBE_POSITIONS.to_vec(), 3, None)
}

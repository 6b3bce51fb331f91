//! Vertex data and its GPU-resident counterpart.
//!
//! A [`Mesh`] is validated CPU-side data; a [`GeometryBuffer`] is the same
//! data uploaded once and described to the driver.

mod buffer;
mod mesh;
pub mod primitives;

pub use buffer::GeometryBuffer;
pub use mesh::{GeometryError, Mesh};

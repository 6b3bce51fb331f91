use crate::driver::{BufferId, BufferTarget, GraphicsDriver, VertexArrayId};

use super::Mesh;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DrawRange {
    Arrays(u32),
    Elements(u32),
}

/// A [`Mesh`] uploaded to driver-owned buffers.
///
/// Built once, bound before each draw and released exactly once.
#[derive(Debug)]
pub struct GeometryBuffer {
    vertex_array: VertexArrayId,
    vertex_buffer: BufferId,
    index_buffer: Option<BufferId>,
    range: DrawRange,
}

impl GeometryBuffer {
    /// Uploads `mesh` and records its layout in a new vertex array.
    pub fn build(driver: &mut dyn GraphicsDriver, mesh: &Mesh) -> Self {
        let vertex_array = driver.create_vertex_array();

        let vertex_buffer = driver.create_buffer();
        driver.buffer_data(
            vertex_buffer,
            BufferTarget::Array,
            bytemuck::cast_slice(mesh.positions()),
        );
        driver.vertex_attrib_layout(vertex_array, vertex_buffer, mesh.layout());

        let index_buffer = mesh.indices().map(|indices| {
            let buffer = driver.create_buffer();
            driver.buffer_data(
                buffer,
                BufferTarget::ElementArray,
                bytemuck::cast_slice(indices),
            );
            driver.element_buffer(vertex_array, buffer);
            buffer
        });

        let range = match index_buffer {
            Some(_) => DrawRange::Elements(mesh.draw_count()),
            None => DrawRange::Arrays(mesh.draw_count()),
        };

        log::debug!(
            "geometry uploaded: {} vertices x {} components, {}",
            mesh.vertex_count(),
            mesh.components(),
            match range {
                DrawRange::Elements(n) => format!("{n} indices"),
                DrawRange::Arrays(_) => "no indices".to_string(),
            }
        );

        Self {
            vertex_array,
            vertex_buffer,
            index_buffer,
            range,
        }
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    pub fn bind(&self, driver: &mut dyn GraphicsDriver) {
        driver.bind_vertex_array(Some(self.vertex_array));
    }

    /// Issues the draw for the whole mesh. Expects [`bind`](Self::bind) first.
    pub fn draw(&self, driver: &mut dyn GraphicsDriver) {
        match self.range {
            DrawRange::Arrays(count) => driver.draw_arrays(0, count),
            DrawRange::Elements(count) => driver.draw_elements(count),
        }
    }

    pub fn release(self, driver: &mut dyn GraphicsDriver) {
        driver.delete_vertex_array(self.vertex_array);
        driver.delete_buffer(self.vertex_buffer);
        if let Some(buffer) = self.index_buffer {
            driver.delete_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCall, RecordingDriver};
    use crate::geometry::primitives;

    fn words(bytes: &[u8]) -> impl Iterator<Item = [u8; 4]> + '_ {
        bytes.chunks_exact(4).map(|w| [w[0], w[1], w[2], w[3]])
    }

    #[test]
    fn quad_uploads_vertices_and_indices() {
        let mut driver = RecordingDriver::new();
        let geometry = GeometryBuffer::build(&mut driver, &primitives::quad().unwrap());
        assert!(geometry.is_indexed());
        assert_eq!(driver.live_objects(), 3);

        let positions: Vec<f32> = words(driver.buffer_contents(geometry.vertex_buffer).unwrap())
            .map(f32::from_ne_bytes)
            .collect();
        assert_eq!(positions, [0.5, 0.5, 0.5, -0.5, -0.5, -0.5, -0.5, 0.5]);

        let index_buffer = geometry.index_buffer.unwrap();
        assert_eq!(
            driver.buffer_target(index_buffer),
            Some(BufferTarget::ElementArray)
        );
        let indices: Vec<u32> = words(driver.buffer_contents(index_buffer).unwrap())
            .map(u32::from_ne_bytes)
            .collect();
        assert_eq!(indices, [0, 1, 3, 1, 2, 3]);
    }

    #[test]
    fn cube_draws_36_array_vertices() {
        let mut driver = RecordingDriver::new();
        let geometry = GeometryBuffer::build(&mut driver, &primitives::cube().unwrap());
        assert!(!geometry.is_indexed());
        assert_eq!(driver.live_objects(), 2);

        geometry.draw(&mut driver);
        // No program is bound yet, so the draw is dropped.
        assert_eq!(
            driver.calls().last(),
            Some(&DriverCall::DrawSkipped("no program in use"))
        );
    }

    #[test]
    fn release_frees_every_handle() {
        let mut driver = RecordingDriver::new();
        let geometry = GeometryBuffer::build(&mut driver, &primitives::quad().unwrap());
        geometry.release(&mut driver);
        assert_eq!(driver.live_objects(), 0);
    }
}

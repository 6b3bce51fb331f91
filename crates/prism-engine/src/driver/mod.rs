//! Graphics driver seam.
//!
//! The frame loop talks to the GPU exclusively through [`GraphicsDriver`]: a
//! small, handle-based command set (stages, programs, buffers, vertex arrays,
//! uniforms, clear/draw/present). Two implementations exist:
//! - [`WgpuDriver`] executes commands on a real device through wgpu
//! - [`RecordingDriver`] executes nothing and records every call; its log is
//!   unbounded, so it is meant for tests
//!
//! Failures below this seam are not reported to callers. A stage that does not
//! compile or a program that does not link still yields a handle; it simply
//! draws nothing. Diagnostics go to the log at `debug`.

mod recording;
pub mod reflect;
mod wgpu_backend;

pub use self::recording::{DriverCall, RecordingDriver};
pub use self::wgpu_backend::WgpuDriver;

use winit::dpi::PhysicalSize;

use crate::paint::Color;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// A compiled (or failed) shader stage.
    ShaderId
);
handle!(
    /// A program object: stages are attached to it, then it is linked.
    ProgramId
);
handle!(
    /// A GPU data buffer (vertex or index data).
    BufferId
);
handle!(
    /// An attribute-layout object tying buffers to vertex inputs.
    VertexArrayId
);

/// Issues handle values; zero is never handed out.
#[derive(Debug, Default)]
pub(crate) struct HandleAllocator {
    last: u32,
}

impl HandleAllocator {
    fn next(&mut self) -> u32 {
        self.last = self.last.wrapping_add(1).max(1);
        self.last
    }

    pub(crate) fn shader(&mut self) -> ShaderId {
        ShaderId(self.next())
    }

    pub(crate) fn program(&mut self) -> ProgramId {
        ProgramId(self.next())
    }

    pub(crate) fn buffer(&mut self) -> BufferId {
        BufferId(self.next())
    }

    pub(crate) fn vertex_array(&mut self) -> VertexArrayId {
        VertexArrayId(self.next())
    }
}

/// A resolved uniform location. Only valid for the program it came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformSlot {
    pub program: ProgramId,
    pub binding: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// What a buffer's contents are used for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// `u32` indices.
    ElementArray,
}

/// How raw vertex bytes map onto the position input (`@location(0)`).
///
/// Positions are always `f32` components.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub components: u32,
    /// Bytes between consecutive vertices.
    pub stride: u64,
    /// Byte offset of the first component.
    pub offset: u64,
}

impl VertexLayout {
    /// Layout for `components` floats per vertex with nothing in between.
    pub const fn tightly_packed(components: u32) -> Self {
        Self {
            components,
            stride: components as u64 * std::mem::size_of::<f32>() as u64,
            offset: 0,
        }
    }
}

/// Which render targets a clear touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR: Self = Self {
        color: true,
        depth: false,
    };
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
}

/// Outcome of presenting a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PresentStatus {
    Presented,
    /// Nothing was shown this frame (surface busy or reconfigured).
    Skipped,
    /// The device or surface is gone; no further frame can be shown.
    Lost,
}

/// GPU command set consumed by the frame loop.
///
/// Calls mirror a classic immediate-mode API: bind state first, then draw.
/// Deleting a handle that is unknown or already deleted is a no-op.
pub trait GraphicsDriver {
    // ── stages and programs ───────────────────────────────────────────────

    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId;

    /// Sets the stage source and compiles it. Failures leave the stage invalid.
    fn compile_shader(&mut self, shader: ShaderId, source: &str);

    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> ProgramId;

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);

    /// Links attached stages. Failures leave the program inert.
    fn link_program(&mut self, program: ProgramId);

    /// Makes `program` current for subsequent draws. `None` unbinds.
    fn use_program(&mut self, program: Option<ProgramId>);

    fn delete_program(&mut self, program: ProgramId);

    /// Resolves a uniform name. `None` for unknown names and unlinked programs.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformSlot>;

    /// Uploads a column-major 4x4 matrix.
    fn uniform_matrix4(&mut self, slot: UniformSlot, value: &[f32; 16]);

    // ── buffers and layouts ───────────────────────────────────────────────

    fn create_vertex_array(&mut self) -> VertexArrayId;

    fn create_buffer(&mut self) -> BufferId;

    /// Replaces the buffer's storage with `data`.
    fn buffer_data(&mut self, buffer: BufferId, target: BufferTarget, data: &[u8]);

    /// Sources the position input of `vertex_array` from `buffer`.
    fn vertex_attrib_layout(
        &mut self,
        vertex_array: VertexArrayId,
        buffer: BufferId,
        layout: VertexLayout,
    );

    /// Attaches an index buffer to `vertex_array`.
    fn element_buffer(&mut self, vertex_array: VertexArrayId, buffer: BufferId);

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);

    fn delete_buffer(&mut self, buffer: BufferId);

    // ── frame ─────────────────────────────────────────────────────────────

    fn enable_depth_test(&mut self);

    fn set_clear_color(&mut self, color: Color);

    fn clear(&mut self, mask: ClearMask);

    /// Follows a window resize.
    fn set_viewport(&mut self, size: PhysicalSize<u32>);

    /// Draws `count` vertices starting at `first` as a triangle list.
    fn draw_arrays(&mut self, first: u32, count: u32);

    /// Draws `count` indices from the bound element buffer as a triangle list.
    fn draw_elements(&mut self, count: u32);

    /// Finishes the frame and shows it.
    fn present(&mut self) -> PresentStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_at_one_and_are_unique() {
        let mut ids = HandleAllocator::default();
        let a = ids.shader();
        let b = ids.program();
        let c = ids.buffer();
        assert_eq!(a.raw(), 1);
        assert_ne!(b.raw(), a.raw());
        assert_ne!(c.raw(), b.raw());
    }

    #[test]
    fn tightly_packed_stride() {
        assert_eq!(VertexLayout::tightly_packed(2).stride, 8);
        assert_eq!(VertexLayout::tightly_packed(3).stride, 12);
        assert_eq!(VertexLayout::tightly_packed(3).offset, 0);
    }
}

//! Viewer entry point.
//!
//! Wires the real window host and wgpu driver to a [`FrameLoop`](crate::frame::FrameLoop)
//! and runs it until the window closes.

mod viewer;

pub use viewer::{ViewerConfig, run};

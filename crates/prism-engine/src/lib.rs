//! Prism engine crate.
//!
//! Renders a single primitive (a flat square or a rotating cube) with a
//! programmable pipeline. The frame loop talks to the GPU through the
//! [`driver::GraphicsDriver`] seam and to the platform through
//! [`window::WindowHost`], so the whole cycle runs headless in tests.

pub mod core;
pub mod device;
pub mod driver;
pub mod frame;
pub mod geometry;
pub mod logging;
pub mod paint;
pub mod program;
pub mod time;
pub mod transform;
pub mod window;

//! Color model shared by the frame loop and the drivers.

pub mod color;

pub use color::Color;

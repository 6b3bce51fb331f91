//! The render loop.
//!
//! [`FrameLoop`] is the single owner of every GPU handle the viewer creates.
//! Each iteration clears, binds a program (fresh or persistent), pushes
//! uniforms, draws, presents and polls events.

mod config;
mod frame_loop;

pub use config::{FrameLoopConfig, Variant};
pub use frame_loop::{FrameLoop, FrameStats, LoopState};

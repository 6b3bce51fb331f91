//! Time subsystem.
//!
//! Provides frame timing without coupling to the runtime:
//! - one `FrameClock` per window host
//! - `elapsed()` is the seconds-since-start timer that drives animation
//! - `tick()` once per presented frame yields clamped deltas for diagnostics

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};

//! Window hosting.
//!
//! The frame loop sees the platform only through [`WindowHost`]: poll events,
//! ask whether a close was requested, read the timer, pick up resizes.
//! [`WinitHost`] owns a real `winit` window; [`ScriptedHost`] replays a fixed
//! script for tests and headless runs.

mod scripted;
mod winit_host;

pub use scripted::ScriptedHost;
pub use winit_host::WinitHost;

use winit::dpi::PhysicalSize;

/// Initial window parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    /// Logical width.
    pub width: u32,
    /// Logical height.
    pub height: u32,
}

impl WindowConfig {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "prism".to_string(),
            width: 800,
            height: 600,
        }
    }
}

pub trait WindowHost {
    /// Processes pending platform events without blocking.
    fn poll_events(&mut self);

    /// Whether the user asked to close the window. Sticky once set.
    fn close_requested(&self) -> bool;

    /// Seconds since the host was initialized.
    fn time(&self) -> f64;

    /// Latest drawable size if it changed since the last call.
    fn take_resize(&mut self) -> Option<PhysicalSize<u32>>;
}

use anyhow::{Context, Result};

use crate::device::GpuInit;
use crate::driver::WgpuDriver;
use crate::frame::{FrameLoop, FrameLoopConfig, FrameStats};
use crate::window::{WindowConfig, WinitHost};

/// Everything needed to open a window and render one primitive.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub gpu: GpuInit,
    pub frame: FrameLoopConfig,
}

impl ViewerConfig {
    /// The flat orange square.
    pub fn square() -> Self {
        Self {
            window: WindowConfig::titled("2D Square"),
            gpu: GpuInit::default(),
            frame: FrameLoopConfig::quad(),
        }
    }

    /// The rotating orange cube.
    pub fn cube() -> Self {
        Self {
            window: WindowConfig::titled("3D Cube"),
            gpu: GpuInit::default(),
            frame: FrameLoopConfig::cube(),
        }
    }
}

/// Opens the window, runs the frame loop until close and tears everything down.
///
/// Only startup can fail; once the loop runs, problems degrade the picture
/// instead of ending the program.
pub fn run(config: ViewerConfig) -> Result<FrameStats> {
    let ViewerConfig { window, gpu, frame } = config;

    let mut host = WinitHost::new(window).context("window initialization failed")?;
    // Declared after `host` so the surface goes before the event loop.
    let mut driver =
        WgpuDriver::new(host.window(), gpu).context("GPU initialization failed")?;

    let frame_loop = FrameLoop::new(&mut driver, frame).context("invalid geometry")?;
    Ok(frame_loop.run(&mut driver, &mut host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_the_two_programs() {
        let square = ViewerConfig::square();
        assert_eq!(square.window.title, "2D Square");
        assert_eq!((square.window.width, square.window.height), (800, 600));
        assert!(!square.frame.rebuilds_program_per_frame());

        let cube = ViewerConfig::cube();
        assert_eq!(cube.window.title, "3D Cube");
        assert!(cube.frame.rebuilds_program_per_frame());
        assert!(!cube.gpu.prefer_srgb);
    }
}
